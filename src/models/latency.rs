use serde::{Deserialize, Serialize};

/// Result of probing one proxy node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDelay {
    pub name: String,

    /// Round trip in milliseconds, `None` when the probe failed or timed out
    pub delay: Option<u32>,
}

/// Progress of a running batch test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyProgress {
    pub completed: usize,
    pub total: usize,
    pub running: bool,
    pub aborted: bool,
}

/// Body of the backend's `/proxies/{name}/delay` answer
#[derive(Debug, Clone, Deserialize)]
pub struct DelayResponse {
    pub delay: u32,
}
