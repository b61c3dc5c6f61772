//! Connection tracking and per-client data usage for Clash/Mihomo style proxy
//! backends.
//!
//! The [`engine::ConnectionStore`] turns the backend's periodic connection
//! snapshots into speeds, active/closed views and persisted per-client usage.
//! The remaining modules wire it to the backend API and expose it over HTTP.

pub mod api;
pub mod backend;
pub mod engine;
pub mod latency;
pub mod models;
pub mod storage;
pub mod utils;
