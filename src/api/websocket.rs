use actix_web::{web, Error, HttpRequest, Responder};
use actix_ws::{self, Message};
use futures_util::StreamExt;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;

use crate::api::SharedStore;
use crate::engine::StoreEvent;
use crate::models::connection::Connection;
use crate::models::stats::StoreSummary;
use crate::models::usage::DataUsageEntry;

// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

// Send at most one connection snapshot per second
const SNAPSHOT_THROTTLE: Duration = Duration::from_millis(1000);

/// WebSocket message types that can be sent to clients
#[derive(Serialize)]
#[serde(tag = "type")]
enum WsOutMessage {
    #[serde(rename = "connections")]
    Connections {
        paused: bool,
        active: Vec<Connection>,
        closed: Vec<Connection>,
    },

    #[serde(rename = "dataUsage")]
    DataUsage { entries: Vec<DataUsageEntry> },

    #[serde(rename = "status")]
    Status { summary: StoreSummary },

    #[serde(rename = "restart")]
    Restart,

    #[serde(rename = "ping")]
    Ping { timestamp: u64 },
}

/// Handle WebSocket connections
pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    store: web::Data<SharedStore>,
) -> Result<impl Responder, Error> {
    let addr = req
        .peer_addr()
        .map(|peer| peer.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!("WebSocket connection from: {}", addr);

    let (response, session, mut msg_stream) = actix_ws::handle(&req, body)?;
    let store: SharedStore = store.get_ref().clone();

    let session_for_handler = session.clone();
    let session_for_updates = session.clone();
    let session_for_heartbeat = session;

    actix_web::rt::spawn(async move {
        let started = Instant::now();
        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        let last_heartbeat = Arc::new(AtomicI64::new(0));
        let last_heartbeat_for_handler = last_heartbeat.clone();
        let last_heartbeat_for_heartbeat = last_heartbeat;

        let mut events = store.read().await.subscribe();

        // Send initial snapshot
        let mut initial = session_for_handler.clone();
        if let Err(e) = send_full_state(&mut initial, &store).await {
            warn!("Failed to send initial state: {}", e);
            return;
        }

        // Client commands and close handling
        let ws_msg_task = {
            let mut session = session_for_handler;
            let store = store.clone();

            async move {
                while let Some(Ok(msg)) = msg_stream.next().await {
                    match msg {
                        Message::Ping(bytes) => {
                            last_heartbeat_for_handler
                                .store(started.elapsed().as_secs() as i64, Ordering::SeqCst);
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Pong(_) => {
                            last_heartbeat_for_handler
                                .store(started.elapsed().as_secs() as i64, Ordering::SeqCst);
                        }
                        Message::Text(text) => {
                            debug!("Received text message: {}", text);
                            last_heartbeat_for_handler
                                .store(started.elapsed().as_secs() as i64, Ordering::SeqCst);

                            let result = match text.trim() {
                                "pause" => {
                                    store.write().await.set_paused(true);
                                    Ok(())
                                }
                                "resume" => {
                                    store.write().await.set_paused(false);
                                    Ok(())
                                }
                                "snapshot" => send_full_state(&mut session, &store).await,
                                _ => Ok(()),
                            };
                            if let Err(e) = result {
                                warn!("Failed to answer client command: {}", e);
                                break;
                            }
                        }
                        Message::Close(_) => {
                            info!("Client requested close");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        };

        // Forward store changes
        let updates_task = {
            let mut session = session_for_updates;
            let store = store.clone();

            async move {
                let mut last_snapshot = Instant::now() - SNAPSHOT_THROTTLE;

                loop {
                    let event = match events.recv().await {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("WebSocket client lagged, skipped {} events", skipped);
                            StoreEvent::Updated
                        }
                        Err(RecvError::Closed) => break,
                    };

                    let result = match event {
                        StoreEvent::Updated => {
                            let now = Instant::now();
                            if now.duration_since(last_snapshot) < SNAPSHOT_THROTTLE {
                                debug!("Skipping connection snapshot due to throttling");
                                continue;
                            }
                            last_snapshot = now;
                            send_connections(&mut session, &store).await
                        }
                        StoreEvent::Restarted => {
                            match send_json(&mut session, &WsOutMessage::Restart).await {
                                Ok(()) => send_data_usage(&mut session, &store).await,
                                Err(e) => Err(e),
                            }
                        }
                        StoreEvent::DataUsageChanged => send_data_usage(&mut session, &store).await,
                        StoreEvent::PauseChanged(_) => send_connections(&mut session, &store).await,
                    };

                    if result.is_err() {
                        break;
                    }
                }
            }
        };

        let heartbeat_task = {
            let mut session = session_for_heartbeat;

            async move {
                loop {
                    heartbeat.tick().await;

                    let now = started.elapsed().as_secs() as i64;
                    let last = last_heartbeat_for_heartbeat.load(Ordering::SeqCst);
                    if now - last > HEARTBEAT_INTERVAL.as_secs() as i64 * 3 {
                        warn!("WebSocket client heartbeat timed out");
                        let _ = session.close(None).await;
                        break;
                    }

                    let ping_msg = WsOutMessage::Ping {
                        timestamp: chrono::Utc::now().timestamp() as u64,
                    };
                    if send_json(&mut session, &ping_msg).await.is_err() {
                        break;
                    }
                    if session.ping(b"").await.is_err() {
                        break;
                    }
                }
            }
        };

        // Wait for any task to complete
        tokio::select! {
            _ = ws_msg_task => {},
            _ = updates_task => {},
            _ = heartbeat_task => {},
        }

        info!("WebSocket connection from {} closed", addr);
    });

    Ok(response)
}

async fn send_json(
    session: &mut actix_ws::Session,
    msg: &WsOutMessage,
) -> Result<(), actix_ws::Closed> {
    match serde_json::to_string(msg) {
        Ok(json) => session.text(json).await,
        Err(e) => {
            warn!("Failed to serialize WebSocket message: {}", e);
            Ok(())
        }
    }
}

/// Send the active/closed views
async fn send_connections(
    session: &mut actix_ws::Session,
    store: &SharedStore,
) -> Result<(), actix_ws::Closed> {
    let msg = {
        let store = store.read().await;
        WsOutMessage::Connections {
            paused: store.paused(),
            active: store.active_connections().to_vec(),
            closed: store.closed_connections().to_vec(),
        }
    };
    send_json(session, &msg).await
}

/// Send the data usage map
async fn send_data_usage(
    session: &mut actix_ws::Session,
    store: &SharedStore,
) -> Result<(), actix_ws::Closed> {
    let msg = {
        let store = store.read().await;
        WsOutMessage::DataUsage {
            entries: store.data_usage_map().values().cloned().collect(),
        }
    };
    send_json(session, &msg).await
}

/// Send status, connections and data usage
async fn send_full_state(
    session: &mut actix_ws::Session,
    store: &SharedStore,
) -> Result<(), actix_ws::Closed> {
    let summary = store.read().await.summary();
    send_json(session, &WsOutMessage::Status { summary }).await?;
    send_connections(session, store).await?;
    send_data_usage(session, store).await
}
