//! HTTP surface over a store fed directly by the tests

use actix_web::{test, web, App};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use clashtrack::api::{routes, SharedStore};
use clashtrack::backend::BackendClient;
use clashtrack::engine::ConnectionStore;
use clashtrack::latency::LatencyTester;
use clashtrack::models::config::AppConfig;
use clashtrack::models::connection::{ConnectionsMessage, RawConnectionSnapshot};
use clashtrack::storage::MemoryStore;

fn raw(id: &str, ip: &str, upload: u64, download: u64, chain: &str) -> RawConnectionSnapshot {
    let mut snapshot = RawConnectionSnapshot {
        id: id.to_string(),
        upload,
        download,
        chains: vec![chain.to_string()],
        ..Default::default()
    };
    snapshot.metadata.source_ip = ip.to_string();
    snapshot
}

async fn seeded_store() -> SharedStore {
    let store: SharedStore = Arc::new(RwLock::new(ConnectionStore::new(Arc::new(MemoryStore::new()))));
    {
        let mut guard = store.write().await;
        guard.update_from_ws_msg(&ConnectionsMessage {
            connections: Some(vec![
                raw("a", "192.168.1.2", 100, 900, "HK-01"),
                raw("b", "192.168.1.3", 50, 50, "DIRECT"),
            ]),
            upload_total: 150,
            download_total: 950,
            memory: None,
        });
        guard.update_from_ws_msg(&ConnectionsMessage {
            connections: Some(vec![raw("a", "192.168.1.2", 120, 1000, "HK-01")]),
            upload_total: 170,
            download_total: 1050,
            memory: None,
        });
    }
    store
}

macro_rules! app {
    ($store:expr) => {{
        let client = BackendClient::new("http://127.0.0.1:9", None).unwrap();
        let tester = LatencyTester::new(Arc::new(client.clone()));
        test::init_service(
            App::new()
                .app_data(web::Data::new($store))
                .app_data(web::Data::new(client))
                .app_data(web::Data::new(tester))
                .app_data(web::Data::new(AppConfig::default()))
                .configure(routes::configure),
        )
        .await
    }};
}

#[actix_rt::test]
async fn test_index_lists_endpoints() {
    let app = app!(seeded_store().await);

    let req = test::TestRequest::get().uri("/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["endpoints"].as_array().unwrap().len() > 5);
}

#[actix_rt::test]
async fn test_connection_views() {
    let app = app!(seeded_store().await);

    let req = test::TestRequest::get().uri("/api/connections").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["connections"][0]["id"], "a");
    assert_eq!(body["connections"][0]["downloadSpeed"], 100);
    assert_eq!(body["connections"][0]["uploadSpeed"], 20);

    let req = test::TestRequest::get().uri("/api/connections?state=closed").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["connections"][0]["id"], "b");

    let req = test::TestRequest::get()
        .uri("/api/connections?state=all&chain=HK-01")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], 1);
}

#[actix_rt::test]
async fn test_data_usage_endpoints() {
    let store = seeded_store().await;
    let app = app!(store.clone());

    let req = test::TestRequest::get().uri("/api/data-usage").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["sourceIP"], "192.168.1.2");
    assert_eq!(entries[0]["total"], 1120);

    let req = test::TestRequest::put()
        .uri("/api/data-usage/192.168.1.2/mac")
        .set_json(serde_json::json!({ "macAddress": "aa:bb:cc:dd:ee:ff" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(
        store.read().await.data_usage_map()["192.168.1.2"].mac_address.as_deref(),
        Some("aa:bb:cc:dd:ee:ff")
    );

    let req = test::TestRequest::delete().uri("/api/data-usage/192.168.1.3").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::delete().uri("/api/data-usage/192.168.1.3").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);

    let req = test::TestRequest::delete().uri("/api/data-usage").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(store.read().await.data_usage_map().is_empty());
}

#[actix_rt::test]
async fn test_pause_gate() {
    let store = seeded_store().await;
    let app = app!(store.clone());

    let req = test::TestRequest::post()
        .uri("/api/pause")
        .set_json(serde_json::json!({ "paused": true }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["paused"], true);
    assert!(store.read().await.paused());

    let req = test::TestRequest::get().uri("/api/pause").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["paused"], true);

    let req = test::TestRequest::get().uri("/api/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["paused"], true);
    assert_eq!(body["active"], 1);
    assert_eq!(body["clients"], 2);
}

#[actix_rt::test]
async fn test_traffic_and_latency_progress() {
    let app = app!(seeded_store().await);

    let req = test::TestRequest::get().uri("/api/traffic").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let samples = body["samples"].as_array().unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0]["up"], 20);
    assert_eq!(samples[0]["down"], 100);
    assert_eq!(body["peak"]["upload"], 20);
    assert_eq!(body["peak"]["download"], 100);

    let req = test::TestRequest::get().uri("/api/latency/progress").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["running"], false);
}
