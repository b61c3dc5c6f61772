pub mod handlers;
pub mod routes;
pub mod websocket;

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::ConnectionStore;

/// Store handle shared between the poller and the HTTP handlers
pub type SharedStore = Arc<RwLock<ConnectionStore>>;
