use log::warn;

use crate::models::usage::ByteCounters;

/// Infers backend restarts from its cumulative global totals.
///
/// The backend's totals only go down when the process restarted and started
/// counting from zero again.
#[derive(Debug, Clone, Default)]
pub struct RestartDetector {
    last: ByteCounters,
    restarts: u64,
}

impl RestartDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the totals of a new message and report whether either regressed
    pub fn detect(&mut self, upload_total: u64, download_total: u64) -> bool {
        let restarted = upload_total < self.last.upload || download_total < self.last.download;
        if restarted {
            warn!(
                "Backend totals went backwards (upload {} -> {}, download {} -> {}), assuming restart",
                self.last.upload, upload_total, self.last.download, download_total
            );
            self.restarts += 1;
        }

        self.last = ByteCounters::new(upload_total, download_total);
        restarted
    }

    /// Totals seen in the most recent message
    pub fn last_totals(&self) -> ByteCounters {
        self.last
    }

    /// Number of restarts detected so far
    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}
