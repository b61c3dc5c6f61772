use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accumulated traffic of one client, keyed by its source IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUsageEntry {
    #[serde(rename = "sourceIP")]
    pub source_ip: String,

    /// MAC address, when something outside the engine knows it
    #[serde(rename = "macAddress", default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,

    pub upload: u64,

    pub download: u64,

    /// Always `upload + download`
    pub total: u64,

    /// Epoch milliseconds
    #[serde(rename = "firstSeen")]
    pub first_seen: i64,

    /// Epoch milliseconds
    #[serde(rename = "lastSeen")]
    pub last_seen: i64,
}

impl DataUsageEntry {
    pub fn new(source_ip: String, upload: u64, download: u64, now_ms: i64) -> Self {
        Self {
            source_ip,
            mac_address: None,
            upload,
            download,
            total: upload.saturating_add(download),
            first_seen: now_ms,
            last_seen: now_ms,
        }
    }

    /// Add a cycle's traffic and mark the entry as seen at `now_ms`
    pub fn record(&mut self, upload: u64, download: u64, now_ms: i64) {
        self.upload = self.upload.saturating_add(upload);
        self.download = self.download.saturating_add(download);
        self.total = self.upload.saturating_add(self.download);
        self.last_seen = now_ms;
    }
}

/// Persisted usage map, ordered by source IP so the stored JSON is stable
pub type DataUsageMap = BTreeMap<String, DataUsageEntry>;

/// Upload/download pair, used for the per-epoch baseline and per-connection tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteCounters {
    pub upload: u64,
    pub download: u64,
}

impl ByteCounters {
    pub fn new(upload: u64, download: u64) -> Self {
        Self { upload, download }
    }

    pub fn is_zero(&self) -> bool {
        self.upload == 0 && self.download == 0
    }
}
