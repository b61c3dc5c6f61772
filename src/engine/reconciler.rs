use std::collections::{HashMap, HashSet};

use crate::models::connection::Connection;

/// Closed connections kept for display, and the slack the "all" history gets
/// on top of the active set
pub const MAX_CLOSED_ROWS: usize = 200;

/// Merge the new active list into the history.
///
/// Existing order is kept and entries still active are refreshed with their
/// latest version; ids not seen before are appended. Once the result exceeds
/// `active.len() + MAX_CLOSED_ROWS`, the oldest entries that are no longer
/// active are dropped. Active entries are never evicted.
pub fn merge_connections(all: &[Connection], active: &[Connection]) -> Vec<Connection> {
    let latest: HashMap<&str, &Connection> = active.iter().map(|c| (c.id(), c)).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(all.len() + active.len());
    let mut merged = Vec::with_capacity(all.len() + active.len());

    for conn in all {
        if !seen.insert(conn.id()) {
            continue;
        }
        let current = latest.get(conn.id()).copied().unwrap_or(conn);
        merged.push(current.clone());
    }

    for conn in active {
        if seen.insert(conn.id()) {
            merged.push(conn.clone());
        }
    }

    let cap = active.len() + MAX_CLOSED_ROWS;
    if merged.len() > cap {
        let mut excess = merged.len() - cap;
        merged.retain(|conn| {
            if excess > 0 && !latest.contains_key(conn.id()) {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
    merged
}

/// Entries of `all` that are not in `active`, newest `MAX_CLOSED_ROWS` only
pub fn closed_connections(all: &[Connection], active: &[Connection]) -> Vec<Connection> {
    let active_ids: HashSet<&str> = active.iter().map(|c| c.id()).collect();
    let mut closed: Vec<Connection> = all
        .iter()
        .filter(|c| !active_ids.contains(c.id()))
        .cloned()
        .collect();

    if closed.len() > MAX_CLOSED_ROWS {
        closed.drain(..closed.len() - MAX_CLOSED_ROWS);
    }
    closed
}

/// The three connection views plus the unfrozen latest cycle.
///
/// `active` and `closed` are what consumers see and stop moving while the
/// view is paused. `latest` always tracks the backend so that speeds stay
/// correct across a pause.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    all: Vec<Connection>,
    latest: Vec<Connection>,
    active: Vec<Connection>,
    closed: Vec<Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a freshly normalized active set into the registry
    pub fn reconcile(&mut self, active: Vec<Connection>, paused: bool) {
        self.all = merge_connections(&self.all, &active);

        if !paused {
            self.closed = closed_connections(&self.all, &active);
            self.active = active.clone();
        }
        self.latest = active;
    }

    /// Last cycle as reported by the backend, regardless of pause
    pub fn latest(&self) -> &[Connection] {
        &self.latest
    }

    pub fn all(&self) -> &[Connection] {
        &self.all
    }

    pub fn active(&self) -> &[Connection] {
        &self.active
    }

    pub fn closed(&self) -> &[Connection] {
        &self.closed
    }
}
