use actix_web::{web, HttpResponse, Responder};
use log::info;
use serde::{Deserialize, Serialize};

use crate::api::SharedStore;
use crate::models::stats::TrafficSample;
use crate::models::usage::{ByteCounters, DataUsageEntry};

/// Request for toggling the pause gate
#[derive(Deserialize)]
pub struct PauseRequest {
    pub paused: bool,
}

/// Request for annotating a client with its MAC address
#[derive(Deserialize)]
pub struct MacRequest {
    #[serde(rename = "macAddress")]
    pub mac_address: Option<String>,
}

/// Response for the data usage listing
#[derive(Serialize)]
struct DataUsageResponse {
    /// Entries sorted by total, biggest first
    entries: Vec<DataUsageEntry>,
    baseline: ByteCounters,
}

/// Response for the traffic chart
#[derive(Serialize)]
struct TrafficResponse {
    samples: Vec<TrafficSample>,
    /// Highest per-sample rates in the window
    peak: ByteCounters,
}

/// Get per-client data usage
pub async fn get_data_usage(store: web::Data<SharedStore>) -> impl Responder {
    let store = store.read().await;

    let mut entries: Vec<DataUsageEntry> = store.data_usage_map().values().cloned().collect();
    entries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.source_ip.cmp(&b.source_ip)));

    HttpResponse::Ok().json(DataUsageResponse {
        entries,
        baseline: store.baseline_totals(),
    })
}

/// Clear all data usage
pub async fn clear_data_usage(store: web::Data<SharedStore>) -> impl Responder {
    store.write().await.clear_data_usage();

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": "Data usage cleared"
    }))
}

/// Remove one client's data usage
pub async fn remove_data_usage_entry(
    store: web::Data<SharedStore>,
    path: web::Path<String>,
) -> impl Responder {
    let source_ip = path.into_inner();

    if store.write().await.remove_data_usage_entry(&source_ip) {
        HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("Removed data usage for {}", source_ip)
        }))
    } else {
        HttpResponse::NotFound().json(serde_json::json!({
            "status": "error",
            "message": format!("No data usage recorded for {}", source_ip)
        }))
    }
}

/// Attach a MAC address to a client
pub async fn set_mac_address(
    store: web::Data<SharedStore>,
    path: web::Path<String>,
    request: web::Json<MacRequest>,
) -> impl Responder {
    let source_ip = path.into_inner();
    let mac = request.into_inner().mac_address;

    if store.write().await.set_mac_address(&source_ip, mac) {
        HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("Updated MAC address of {}", source_ip)
        }))
    } else {
        HttpResponse::NotFound().json(serde_json::json!({
            "status": "error",
            "message": format!("No data usage recorded for {}", source_ip)
        }))
    }
}

/// Get the pause gate
pub async fn get_pause(store: web::Data<SharedStore>) -> impl Responder {
    let paused = store.read().await.paused();
    HttpResponse::Ok().json(serde_json::json!({ "paused": paused }))
}

/// Set the pause gate
pub async fn set_pause(
    store: web::Data<SharedStore>,
    request: web::Json<PauseRequest>,
) -> impl Responder {
    info!("Setting paused to {}", request.paused);
    store.write().await.set_paused(request.paused);
    HttpResponse::Ok().json(serde_json::json!({ "paused": request.paused }))
}

/// Global traffic chart samples
pub async fn get_traffic(store: web::Data<SharedStore>) -> impl Responder {
    let store = store.read().await;
    HttpResponse::Ok().json(TrafficResponse {
        samples: store.traffic_history(),
        peak: store.traffic_peaks(),
    })
}
