use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_LATENCY_TEST_URL: &str = "https://www.gstatic.com/generate_204";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the proxy backend's REST API
    pub backend_url: String,

    /// Bearer secret of the backend API, if one is set
    #[serde(skip_serializing)]
    pub secret: Option<String>,

    /// Port for the REST API server
    pub port: u16,

    /// How often the backend's connection list is fetched
    pub poll_interval_ms: u64,

    /// Directory holding persisted data usage
    pub data_dir: PathBuf,

    /// Keep data usage in memory only
    pub ephemeral: bool,

    /// URL probed by latency tests
    pub latency_test_url: String,

    /// Per-node latency test timeout
    pub latency_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:9090".to_string(),
            secret: None,
            port: 3000,
            poll_interval_ms: 1000,
            data_dir: PathBuf::from("data"),
            ephemeral: false,
            latency_test_url: DEFAULT_LATENCY_TEST_URL.to_string(),
            latency_timeout_ms: 5000,
        }
    }
}
