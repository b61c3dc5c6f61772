use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};

use super::client::BackendClient;
use crate::engine::ConnectionStore;

/// Feeds the store with the backend's connection list at a fixed rate.
///
/// Messages are applied one at a time in fetch order; a slow fetch delays the
/// next tick instead of overlapping with it.
pub struct ConnectionPoller {
    client: BackendClient,
    store: Arc<RwLock<ConnectionStore>>,
    period: Duration,
    running: Arc<AtomicBool>,
}

impl ConnectionPoller {
    pub fn new(client: BackendClient, store: Arc<RwLock<ConnectionStore>>, period: Duration) -> Self {
        Self {
            client,
            store,
            period,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the loop when cleared
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Poll until the running flag is cleared
    pub async fn run(self) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            "Polling {} every {}ms",
            self.client.base_url(),
            self.period.as_millis()
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Counters for logging
        let mut failures: u32 = 0;
        let mut messages: u64 = 0;
        let mut next_log_time = Instant::now() + Duration::from_secs(60);

        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;

            match self.client.fetch_connections().await {
                Ok(msg) => {
                    if failures > 0 {
                        info!("Backend reachable again after {} failed polls", failures);
                        failures = 0;
                    }
                    messages += 1;
                    self.store.write().await.update_from_ws_msg(&msg);
                }
                Err(e) => {
                    failures += 1;
                    // Log the first failure loudly, then only occasionally
                    if failures == 1 {
                        error!("Failed to fetch connections: {}", e);
                    } else if failures % 30 == 0 {
                        warn!("Still unable to fetch connections ({} attempts): {}", failures, e);
                    } else {
                        debug!("Fetch attempt {} failed: {}", failures, e);
                    }
                }
            }

            let now = Instant::now();
            if now >= next_log_time {
                let summary = self.store.read().await.summary();
                info!(
                    "Poller stats: messages={}, active={}, closed={}, clients={}",
                    messages, summary.active, summary.closed, summary.clients
                );
                next_log_time = now + Duration::from_secs(60);
            }
        }

        info!("Connection poller stopped");
    }
}
