use actix_web::{web, HttpResponse, Responder};
use log::{debug, info};
use serde::Deserialize;
use std::time::Duration;

use crate::latency::LatencyTester;
use crate::models::config::AppConfig;

/// Request for testing a list of nodes
#[derive(Deserialize)]
pub struct NodesTestRequest {
    pub nodes: Vec<String>,

    /// Probe URL, defaults to the configured one
    pub url: Option<String>,

    /// Per-node timeout in milliseconds
    pub timeout: Option<u64>,
}

/// Request for testing groups through the backend
#[derive(Deserialize)]
pub struct GroupsTestRequest {
    pub groups: Vec<String>,
    pub url: Option<String>,
    pub timeout: Option<u64>,
}

fn probe_settings(config: &AppConfig, url: Option<String>, timeout: Option<u64>) -> (String, Duration) {
    let url = url
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| config.latency_test_url.clone());
    let timeout = Duration::from_millis(timeout.unwrap_or(config.latency_timeout_ms));
    (url, timeout)
}

/// Test nodes in batches
pub async fn test_nodes(
    tester: web::Data<LatencyTester>,
    config: web::Data<AppConfig>,
    request: web::Json<NodesTestRequest>,
) -> impl Responder {
    let request = request.into_inner();
    let (url, timeout) = probe_settings(&config, request.url, request.timeout);

    info!("Testing {} nodes against {}", request.nodes.len(), url);
    let results = tester
        .batch_test_nodes(&request.nodes, &url, timeout, |progress| {
            debug!("Latency test progress: {}/{}", progress.completed, progress.total);
        })
        .await;

    HttpResponse::Ok().json(serde_json::json!({
        "aborted": tester.progress().aborted,
        "results": results
    }))
}

/// Test groups one after another
pub async fn test_groups(
    tester: web::Data<LatencyTester>,
    config: web::Data<AppConfig>,
    request: web::Json<GroupsTestRequest>,
) -> impl Responder {
    let request = request.into_inner();
    let (url, timeout) = probe_settings(&config, request.url, request.timeout);

    info!("Testing {} groups against {}", request.groups.len(), url);
    let results = tester.test_multiple_groups(&request.groups, &url, timeout).await;

    HttpResponse::Ok().json(serde_json::json!({
        "aborted": tester.progress().aborted,
        "results": results
    }))
}

/// Abort the running test
pub async fn abort_test(tester: web::Data<LatencyTester>) -> impl Responder {
    tester.abort_test();
    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": "Abort requested"
    }))
}

/// Progress of the current or last test
pub async fn get_progress(tester: web::Data<LatencyTester>) -> impl Responder {
    HttpResponse::Ok().json(tester.progress())
}
