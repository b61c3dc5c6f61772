//! Durable key-value persistence for engine state.
//!
//! The engine only ever stores a handful of JSON documents, so the interface is
//! plain string get/set keyed by name.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::utils::error::AppResult;

/// Minimal persistent key-value storage
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> AppResult<()>;

    /// Delete `key`; deleting a missing key is not an error
    fn remove(&self, key: &str) -> AppResult<()>;
}

/// Load and decode a JSON value, falling back to `None` on any failure.
///
/// A corrupted document is logged and ignored; the next successful write
/// replaces it.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read {} from storage: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring corrupted {} in storage: {}", key, e);
            None
        }
    }
}

/// Encode and store a JSON value
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> AppResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}
