pub mod connections;
pub mod latency;
pub mod usage;
