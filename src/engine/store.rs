use chrono::Utc;
use log::{info, trace};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::normalizer::normalize;
use super::reaper::reap;
use super::reconciler::ConnectionRegistry;
use super::restart::RestartDetector;
use super::traffic::TrafficHistory;
use super::usage::DataUsageAccumulator;
use crate::models::connection::{Connection, ConnectionsMessage};
use crate::models::stats::{StoreSummary, TrafficSample};
use crate::models::usage::{ByteCounters, DataUsageMap};
use crate::storage::KeyValueStore;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications published after the store changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// A message with connections was processed
    Updated,
    /// The backend restarted and derived state was reset
    Restarted,
    /// Data usage was changed outside the regular pipeline
    DataUsageChanged,
    /// The pause gate was toggled
    PauseChanged(bool),
}

/// Owner of all connection-derived state for one application session.
///
/// Every backend message goes through [`update_from_ws_msg`](Self::update_from_ws_msg)
/// in delivery order. Consumers only read the views.
pub struct ConnectionStore {
    registry: ConnectionRegistry,
    detector: RestartDetector,
    usage: DataUsageAccumulator,
    traffic: TrafficHistory,
    paused: bool,
    events: broadcast::Sender<StoreEvent>,
}

impl ConnectionStore {
    /// Create a store, restoring persisted data usage from `storage`
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry: ConnectionRegistry::new(),
            detector: RestartDetector::new(),
            usage: DataUsageAccumulator::load(storage),
            traffic: TrafficHistory::new(),
            paused: false,
            events,
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Process one backend message
    pub fn update_from_ws_msg(&mut self, msg: &ConnectionsMessage) {
        self.update_at(msg, Utc::now().timestamp_millis());
    }

    pub(crate) fn update_at(&mut self, msg: &ConnectionsMessage, now_ms: i64) {
        let totals = ByteCounters::new(msg.upload_total, msg.download_total);

        if self.detector.detect(totals.upload, totals.download) {
            info!("Resetting data usage after backend restart");
            self.usage.reset();
            self.traffic.clear();
            self.emit(StoreEvent::Restarted);
        }
        self.traffic.record(totals, now_ms);

        let Some(raw) = msg.active() else {
            trace!("Message without connections, keeping current state");
            return;
        };

        let active = normalize(raw, self.registry.latest());
        self.usage.accumulate(&active, now_ms);
        reap(self.usage.tracker_mut(), &active);
        self.registry.reconcile(active, self.paused);

        trace!(
            "Cycle done: {} active, {} in history, {} clients",
            self.registry.latest().len(),
            self.registry.all().len(),
            self.usage.entries().len()
        );
        self.emit(StoreEvent::Updated);
    }

    /// Wipe the data usage map
    pub fn clear_data_usage(&mut self) {
        info!("Clearing data usage for {} clients", self.usage.entries().len());
        self.usage.clear();
        self.emit(StoreEvent::DataUsageChanged);
    }

    /// Remove one client from the data usage map
    pub fn remove_data_usage_entry(&mut self, source_ip: &str) -> bool {
        let removed = self.usage.remove(source_ip);
        if removed {
            info!("Removed data usage entry for {}", source_ip);
            self.emit(StoreEvent::DataUsageChanged);
        }
        removed
    }

    /// Attach or clear the MAC address of a known client
    pub fn set_mac_address(&mut self, source_ip: &str, mac: Option<String>) -> bool {
        let updated = self.usage.set_mac_address(source_ip, mac);
        if updated {
            self.emit(StoreEvent::DataUsageChanged);
        }
        updated
    }

    /// Freeze or unfreeze the active/closed views
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            info!("Connection view {}", if paused { "paused" } else { "resumed" });
            self.paused = paused;
            self.emit(StoreEvent::PauseChanged(paused));
        }
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn all_connections(&self) -> &[Connection] {
        self.registry.all()
    }

    pub fn active_connections(&self) -> &[Connection] {
        self.registry.active()
    }

    pub fn closed_connections(&self) -> &[Connection] {
        self.registry.closed()
    }

    /// Live connections whose proxy chain contains `proxy`, ignoring the pause gate
    pub fn connections_through(&self, proxy: &str) -> Vec<Connection> {
        self.registry
            .latest()
            .iter()
            .filter(|c| c.uses_proxy(proxy))
            .cloned()
            .collect()
    }

    pub fn data_usage_map(&self) -> &DataUsageMap {
        self.usage.entries()
    }

    /// Traffic credited during the current backend epoch
    pub fn baseline_totals(&self) -> ByteCounters {
        self.usage.baseline()
    }

    pub fn traffic_history(&self) -> Vec<TrafficSample> {
        self.traffic.samples()
    }

    /// Highest upload and download rates in the chart window
    pub fn traffic_peaks(&self) -> ByteCounters {
        ByteCounters::new(self.traffic.max_up(), self.traffic.max_down())
    }

    pub fn summary(&self) -> StoreSummary {
        let totals = self.detector.last_totals();
        StoreSummary {
            active: self.registry.active().len(),
            closed: self.registry.closed().len(),
            all: self.registry.all().len(),
            clients: self.usage.entries().len(),
            upload_total: totals.upload,
            download_total: totals.download,
            restarts: self.detector.restarts(),
            paused: self.paused,
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_connections(&self) -> usize {
        self.usage.tracker().len()
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
