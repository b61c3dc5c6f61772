use log::trace;
use std::collections::HashSet;

use super::usage::DeltaTracker;
use crate::models::connection::Connection;

/// Drop tracking state of connections that are no longer active.
///
/// Must run after the cycle's usage has been credited, otherwise the last
/// delta of a closing connection would be lost. Ids are never reused, so
/// without this the tracker grows for the lifetime of the process.
pub fn reap(tracker: &mut DeltaTracker, active: &[Connection]) -> usize {
    let active_ids: HashSet<&str> = active.iter().map(|c| c.id()).collect();
    let removed = tracker.retain(|id| active_ids.contains(id));
    if removed > 0 {
        trace!("Reaped {} closed connections from usage tracking", removed);
    }
    removed
}
