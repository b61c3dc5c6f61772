use serde::{Deserialize, Serialize};

/// One point of the global traffic chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSample {
    /// Epoch milliseconds
    pub timestamp: i64,

    /// Bytes uploaded since the previous sample
    pub up: u64,

    /// Bytes downloaded since the previous sample
    pub down: u64,
}

/// Counters describing the current state of the connection store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Number of currently open connections
    pub active: usize,

    /// Number of recently closed connections kept for display
    pub closed: usize,

    /// Size of the bounded "all seen" history
    pub all: usize,

    /// Number of tracked source IPs
    pub clients: usize,

    /// Backend totals from the last message
    pub upload_total: u64,
    pub download_total: u64,

    /// Restarts detected since this process started
    pub restarts: u64,

    pub paused: bool,
}
