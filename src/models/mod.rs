pub mod config;
pub mod connection;
pub mod latency;
pub mod stats;
pub mod usage;
