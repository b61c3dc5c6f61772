use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::connection::Connection;
use crate::models::usage::{ByteCounters, DataUsageEntry, DataUsageMap};
use crate::storage::{load_json, save_json, KeyValueStore};

/// Storage key of the per-client usage map
pub const DATA_USAGE_MAP_KEY: &str = "dataUsageMap";

/// Storage key of the current backend epoch's totals
pub const DATA_USAGE_BASELINE_KEY: &str = "dataUsageBaseline";

/// Last cumulative counters seen per connection id
#[derive(Debug, Clone, Default)]
pub struct DeltaTracker {
    counters: HashMap<String, ByteCounters>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `current` for `id` and return the traffic to credit.
    ///
    /// A known id yields the growth since last time, floored at zero. An id
    /// seen for the first time yields its whole cumulative value, since those
    /// bytes have never been counted.
    pub fn observe(&mut self, id: &str, current: ByteCounters) -> ByteCounters {
        let delta = match self.counters.get(id) {
            Some(prior) => ByteCounters::new(
                current.upload.saturating_sub(prior.upload),
                current.download.saturating_sub(prior.download),
            ),
            None => current,
        };
        self.counters.insert(id.to_string(), current);
        delta
    }

    /// Keep only the ids for which `keep` returns true; returns how many went away
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.counters.len();
        self.counters.retain(|id, _| keep(id));
        before - self.counters.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.counters.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }
}

/// Per source IP traffic accounting, written through to storage on every change
pub struct DataUsageAccumulator {
    storage: Arc<dyn KeyValueStore>,
    entries: DataUsageMap,
    baseline: ByteCounters,
    tracker: DeltaTracker,
}

impl DataUsageAccumulator {
    /// Restore the persisted map and baseline; anything unreadable starts empty
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let entries: DataUsageMap =
            load_json(storage.as_ref(), DATA_USAGE_MAP_KEY).unwrap_or_default();
        let baseline: ByteCounters =
            load_json(storage.as_ref(), DATA_USAGE_BASELINE_KEY).unwrap_or_default();

        info!(
            "Loaded data usage for {} clients (epoch upload {}, download {})",
            entries.len(),
            baseline.upload,
            baseline.download
        );

        Self {
            storage,
            entries,
            baseline,
            tracker: DeltaTracker::new(),
        }
    }

    /// Credit one cycle of active connections to their source IPs
    pub fn accumulate(&mut self, active: &[Connection], now_ms: i64) {
        let mut per_ip: HashMap<&str, ByteCounters> = HashMap::new();

        for conn in active {
            let ip = conn.source_ip();
            if ip.is_empty() {
                continue;
            }

            let current = ByteCounters::new(conn.snapshot.upload, conn.snapshot.download);
            let delta = self.tracker.observe(conn.id(), current);

            let sum = per_ip.entry(ip).or_default();
            sum.upload = sum.upload.saturating_add(delta.upload);
            sum.download = sum.download.saturating_add(delta.download);
        }

        for (ip, delta) in per_ip {
            match self.entries.get_mut(ip) {
                Some(entry) => entry.record(delta.upload, delta.download, now_ms),
                None if !delta.is_zero() => {
                    debug!("New client {} ({} up, {} down)", ip, delta.upload, delta.download);
                    self.entries.insert(
                        ip.to_string(),
                        DataUsageEntry::new(ip.to_string(), delta.upload, delta.download, now_ms),
                    );
                }
                None => {}
            }

            self.baseline.upload = self.baseline.upload.saturating_add(delta.upload);
            self.baseline.download = self.baseline.download.saturating_add(delta.download);
        }

        self.persist();
    }

    /// Forget everything after a backend restart
    pub fn reset(&mut self) {
        self.tracker.clear();
        self.entries.clear();
        self.baseline = ByteCounters::default();
        self.persist();
    }

    /// User-requested wipe of the usage map.
    ///
    /// Connection tracking is kept so bytes already counted are not credited
    /// again on the next cycle.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.baseline = ByteCounters::default();
        self.persist();
    }

    /// Drop a single client; returns false when it was not tracked
    pub fn remove(&mut self, source_ip: &str) -> bool {
        let removed = self.entries.remove(source_ip).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    /// Attach an externally known MAC address to a client
    pub fn set_mac_address(&mut self, source_ip: &str, mac: Option<String>) -> bool {
        match self.entries.get_mut(source_ip) {
            Some(entry) => {
                entry.mac_address = mac.filter(|m| !m.is_empty());
                self.persist();
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &DataUsageMap {
        &self.entries
    }

    pub fn baseline(&self) -> ByteCounters {
        self.baseline
    }

    pub fn tracker(&self) -> &DeltaTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut DeltaTracker {
        &mut self.tracker
    }

    fn persist(&self) {
        if let Err(e) = save_json(self.storage.as_ref(), DATA_USAGE_MAP_KEY, &self.entries) {
            warn!("Failed to persist data usage: {}", e);
        }
        if let Err(e) = save_json(self.storage.as_ref(), DATA_USAGE_BASELINE_KEY, &self.baseline) {
            warn!("Failed to persist data usage baseline: {}", e);
        }
    }
}
