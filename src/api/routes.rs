use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use crate::api::handlers::{
    connections::{
        get_connections,
        get_status,
        close_connection,
        close_connections,
    },
    latency::{
        test_nodes,
        test_groups,
        abort_test,
        get_progress,
    },
    usage::{
        get_data_usage,
        clear_data_usage,
        remove_data_usage_entry,
        set_mac_address,
        get_pause,
        set_pause,
        get_traffic,
    },
};
use crate::api::websocket::ws_index;

/// Root endpoint to provide information about the API
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "clashtrack API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Real-time connection tracking and per-client data usage for Clash/Mihomo backends",
        "endpoints": [
            {
                "path": "/api/status",
                "method": "GET",
                "description": "Connection and data usage counters"
            },
            {
                "path": "/api/connections?state=active|closed|all&chain=NAME",
                "method": "GET",
                "description": "List connections"
            },
            {
                "path": "/api/connections/{id}",
                "method": "DELETE",
                "description": "Close a connection on the backend"
            },
            {
                "path": "/api/connections?chain=NAME",
                "method": "DELETE",
                "description": "Close every connection routed through a proxy"
            },
            {
                "path": "/api/data-usage",
                "method": "GET",
                "description": "Per-client data usage"
            },
            {
                "path": "/api/data-usage",
                "method": "DELETE",
                "description": "Clear all data usage"
            },
            {
                "path": "/api/data-usage/{ip}",
                "method": "DELETE",
                "description": "Remove one client's data usage"
            },
            {
                "path": "/api/data-usage/{ip}/mac",
                "method": "PUT",
                "description": "Set the MAC address of a client"
            },
            {
                "path": "/api/pause",
                "method": "GET/POST",
                "description": "Read or set the connection view pause"
            },
            {
                "path": "/api/traffic",
                "method": "GET",
                "description": "Global traffic chart samples"
            },
            {
                "path": "/api/latency/nodes",
                "method": "POST",
                "description": "Batch latency test of proxy nodes"
            },
            {
                "path": "/api/latency/groups",
                "method": "POST",
                "description": "Latency test of proxy groups"
            },
            {
                "path": "/api/latency/abort",
                "method": "POST",
                "description": "Abort the running latency test"
            },
            {
                "path": "/api/latency/progress",
                "method": "GET",
                "description": "Progress of the latency test"
            },
            {
                "path": "/api/ws",
                "method": "GET",
                "description": "WebSocket endpoint for real-time updates"
            }
        ]
    }))
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint
        .route("/", web::get().to(index))
        .service(
            web::scope("/api")
                // WebSocket route for real-time updates
                .route("/ws", web::get().to(ws_index))
                .route("/status", web::get().to(get_status))
                .route("/traffic", web::get().to(get_traffic))
                .service(
                    web::resource("/pause")
                        .route(web::get().to(get_pause))
                        .route(web::post().to(set_pause))
                )
                // Connection views
                .service(
                    web::scope("/connections")
                        .route("", web::get().to(get_connections))
                        .route("", web::delete().to(close_connections))
                        .route("/{id}", web::delete().to(close_connection))
                )
                // Per-client data usage
                .service(
                    web::scope("/data-usage")
                        .route("", web::get().to(get_data_usage))
                        .route("", web::delete().to(clear_data_usage))
                        .route("/{ip}", web::delete().to(remove_data_usage_entry))
                        .route("/{ip}/mac", web::put().to(set_mac_address))
                )
                // Latency tests
                .service(
                    web::scope("/latency")
                        .route("/nodes", web::post().to(test_nodes))
                        .route("/groups", web::post().to(test_groups))
                        .route("/abort", web::post().to(abort_test))
                        .route("/progress", web::get().to(get_progress))
                )
        );
}
