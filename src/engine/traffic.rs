// Global traffic history for the dashboard chart

use std::collections::VecDeque;

use crate::models::stats::TrafficSample;
use crate::models::usage::ByteCounters;

/// Maximum number of samples to keep (60 samples = 1 minute at 1Hz)
pub const MAX_TRAFFIC_SAMPLES: usize = 60;

#[derive(Debug, Clone, Default)]
pub struct TrafficHistory {
    samples: VecDeque<TrafficSample>,
    last_totals: Option<ByteCounters>,
}

impl TrafficHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_TRAFFIC_SAMPLES),
            last_totals: None,
        }
    }

    /// Add a sample derived from the backend's global totals.
    ///
    /// The first call after construction or [`clear`](Self::clear) only
    /// establishes the reference point.
    pub fn record(&mut self, totals: ByteCounters, now_ms: i64) {
        if let Some(last) = self.last_totals {
            self.samples.push_back(TrafficSample {
                timestamp: now_ms,
                up: totals.upload.saturating_sub(last.upload),
                down: totals.download.saturating_sub(last.download),
            });

            while self.samples.len() > MAX_TRAFFIC_SAMPLES {
                self.samples.pop_front();
            }
        }
        self.last_totals = Some(totals);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.last_totals = None;
    }

    pub fn samples(&self) -> Vec<TrafficSample> {
        self.samples.iter().copied().collect()
    }

    /// Highest download rate in the window
    pub fn max_down(&self) -> u64 {
        self.samples.iter().map(|s| s.down).max().unwrap_or(0)
    }

    /// Highest upload rate in the window
    pub fn max_up(&self) -> u64 {
        self.samples.iter().map(|s| s.up).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_total_deltas() {
        let mut history = TrafficHistory::new();
        history.record(ByteCounters::new(100, 1000), 1);
        assert!(history.samples().is_empty());

        history.record(ByteCounters::new(150, 1800), 2);
        history.record(ByteCounters::new(150, 1900), 3);

        let samples = history.samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], TrafficSample { timestamp: 2, up: 50, down: 800 });
        assert_eq!(history.max_down(), 800);
        assert_eq!(history.max_up(), 50);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut history = TrafficHistory::new();
        for i in 0..(MAX_TRAFFIC_SAMPLES as u64 + 20) {
            history.record(ByteCounters::new(i, i), i as i64);
        }
        assert_eq!(history.samples().len(), MAX_TRAFFIC_SAMPLES);
    }

    #[test]
    fn test_clear_resets_reference() {
        let mut history = TrafficHistory::new();
        history.record(ByteCounters::new(100, 100), 1);
        history.record(ByteCounters::new(200, 200), 2);

        history.clear();
        history.record(ByteCounters::new(5, 5), 3);
        assert!(history.samples().is_empty());
    }
}
