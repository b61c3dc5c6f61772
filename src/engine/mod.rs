//! Connection ingestion and derived statistics.
//!
//! Per message the [`ConnectionStore`] runs: restart detection, normalization,
//! data usage accounting, reaping of stale tracking, then reconciliation of the
//! connection views.

pub mod normalizer;
pub mod reaper;
pub mod reconciler;
pub mod restart;
pub mod store;
pub mod traffic;
pub mod usage;

pub use normalizer::{normalize, restruct_raw_msg_to_connection};
pub use reconciler::MAX_CLOSED_ROWS;
pub use store::{ConnectionStore, StoreEvent};
