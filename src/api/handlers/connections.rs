use actix_web::{web, HttpResponse, Responder};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::api::SharedStore;
use crate::backend::BackendClient;
use crate::models::connection::Connection;
use crate::models::stats::StoreSummary;

/// Which connection view to return
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Active,
    Closed,
    All,
}

/// Query for listing connections
#[derive(Debug, Deserialize)]
pub struct ConnectionsQuery {
    #[serde(default)]
    pub state: ConnectionState,

    /// Only connections whose chain contains this proxy
    pub chain: Option<String>,
}

/// Query for closing connections in bulk
#[derive(Debug, Deserialize)]
pub struct CloseQuery {
    /// Proxy whose connections should be closed
    pub chain: String,
}

/// Response for listing connections
#[derive(Serialize)]
struct ConnectionsResponse {
    paused: bool,
    count: usize,
    connections: Vec<Connection>,
}

/// List connections
pub async fn get_connections(
    store: web::Data<SharedStore>,
    query: web::Query<ConnectionsQuery>,
) -> impl Responder {
    let store = store.read().await;

    let view = match query.state {
        ConnectionState::Active => store.active_connections(),
        ConnectionState::Closed => store.closed_connections(),
        ConnectionState::All => store.all_connections(),
    };

    let connections: Vec<Connection> = match &query.chain {
        Some(chain) => view.iter().filter(|c| c.uses_proxy(chain)).cloned().collect(),
        None => view.to_vec(),
    };

    HttpResponse::Ok().json(ConnectionsResponse {
        paused: store.paused(),
        count: connections.len(),
        connections,
    })
}

/// Store counters
pub async fn get_status(store: web::Data<SharedStore>) -> impl Responder {
    let summary: StoreSummary = store.read().await.summary();
    HttpResponse::Ok().json(summary)
}

/// Close a single connection on the backend
pub async fn close_connection(
    backend: web::Data<BackendClient>,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();

    match backend.close_connection(&id).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("Connection {} closed", id)
        })),
        Err(e) => {
            error!("Failed to close connection {}: {}", id, e);
            HttpResponse::BadGateway().json(serde_json::json!({
                "status": "error",
                "message": format!("Failed to close connection: {}", e)
            }))
        }
    }
}

/// Close every live connection routed through a proxy, e.g. after switching
/// the selected node of a group
pub async fn close_connections(
    store: web::Data<SharedStore>,
    backend: web::Data<BackendClient>,
    query: web::Query<CloseQuery>,
) -> impl Responder {
    // Collect ids first so the store lock is not held across backend calls
    let ids: Vec<String> = store
        .read()
        .await
        .connections_through(&query.chain)
        .into_iter()
        .map(|c| c.snapshot.id)
        .collect();

    let mut closed = 0;
    let mut failed = 0;
    for id in &ids {
        match backend.close_connection(id).await {
            Ok(()) => closed += 1,
            Err(e) => {
                warn!("Failed to close connection {}: {}", id, e);
                failed += 1;
            }
        }
    }

    info!(
        "Closed {} connections through {} ({} failed)",
        closed, query.chain, failed
    );

    HttpResponse::Ok().json(serde_json::json!({
        "status": if failed == 0 { "success" } else { "partial" },
        "closed": closed,
        "failed": failed
    }))
}
