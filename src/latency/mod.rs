//! Batch latency testing of proxy nodes.
//!
//! Nodes are probed in fixed-size batches with a short pause in between.
//! Cancellation is checked between batches; probes already dispatched in a
//! batch always run to completion.
//!
//! Every run gets its own abort flag. An abort marks all running tests; with
//! nothing running it is kept for the next test to start.

use futures::future::{join_all, BoxFuture, FutureExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::BackendClient;
use crate::models::latency::{LatencyProgress, NodeDelay};
use crate::utils::error::AppResult;

/// Nodes probed concurrently
pub const BATCH_SIZE: usize = 10;

/// Pause between two batches
pub const BATCH_DELAY: Duration = Duration::from_millis(200);

/// Slack on top of the per-node timeout before a probe is given up locally
const PROBE_GRACE: Duration = Duration::from_secs(1);

/// Something that can measure proxy delays
pub trait DelayProbe: Send + Sync {
    fn node_delay<'a>(
        &'a self,
        name: &'a str,
        test_url: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, AppResult<u32>>;

    fn group_delay<'a>(
        &'a self,
        group: &'a str,
        test_url: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, AppResult<HashMap<String, u32>>>;
}

impl DelayProbe for BackendClient {
    fn node_delay<'a>(
        &'a self,
        name: &'a str,
        test_url: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, AppResult<u32>> {
        self.proxy_delay(name, test_url, timeout).boxed()
    }

    fn group_delay<'a>(
        &'a self,
        group: &'a str,
        test_url: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, AppResult<HashMap<String, u32>>> {
        BackendClient::group_delay(self, group, test_url, timeout).boxed()
    }
}

/// Delays measured for one group
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GroupDelays {
    pub group: String,
    pub delays: Vec<NodeDelay>,
}

#[derive(Default)]
struct AbortState {
    running: Vec<Arc<AtomicBool>>,
    pending: bool,
}

/// Abort flag of one run, unregistered when the run ends
struct RunToken {
    flag: Arc<AtomicBool>,
    state: Arc<Mutex<AbortState>>,
}

impl RunToken {
    fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Drop for RunToken {
    fn drop(&mut self) {
        self.state
            .lock()
            .running
            .retain(|flag| !Arc::ptr_eq(flag, &self.flag));
    }
}

/// Runs latency tests and tracks their progress
#[derive(Clone)]
pub struct LatencyTester {
    probe: Arc<dyn DelayProbe>,
    aborts: Arc<Mutex<AbortState>>,
    progress: Arc<Mutex<LatencyProgress>>,
}

impl LatencyTester {
    pub fn new(probe: Arc<dyn DelayProbe>) -> Self {
        Self {
            probe,
            aborts: Arc::new(Mutex::new(AbortState::default())),
            progress: Arc::new(Mutex::new(LatencyProgress::default())),
        }
    }

    /// Stop running tests before their next batch, or the next test if none runs
    pub fn abort_test(&self) {
        let mut state = self.aborts.lock();
        if state.running.is_empty() {
            info!("Latency test abort requested, applies to the next test");
            state.pending = true;
        } else {
            info!("Latency test abort requested for {} running tests", state.running.len());
            for flag in &state.running {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Progress of the current or last test
    pub fn progress(&self) -> LatencyProgress {
        self.progress.lock().clone()
    }

    /// Probe every node, `BATCH_SIZE` at a time.
    ///
    /// A failed probe yields `delay: None` and does not stop the batch. When
    /// aborted, the results gathered so far are returned.
    pub async fn batch_test_nodes<F>(
        &self,
        nodes: &[String],
        test_url: &str,
        timeout: Duration,
        mut on_progress: F,
    ) -> Vec<NodeDelay>
    where
        F: FnMut(&LatencyProgress),
    {
        let run = self.begin_run();
        self.set_progress(LatencyProgress {
            completed: 0,
            total: nodes.len(),
            running: true,
            aborted: false,
        });

        let mut results = Vec::with_capacity(nodes.len());
        for (index, batch) in nodes.chunks(BATCH_SIZE).enumerate() {
            if index > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }
            if run.is_aborted() {
                warn!(
                    "Latency test aborted after {}/{} nodes",
                    results.len(),
                    nodes.len()
                );
                self.finish(results.len(), nodes.len(), true);
                return results;
            }

            let probes = batch.iter().map(|name| self.probe_node(name, test_url, timeout));
            results.extend(join_all(probes).await);

            let progress = LatencyProgress {
                completed: results.len(),
                total: nodes.len(),
                running: results.len() < nodes.len(),
                aborted: false,
            };
            self.set_progress(progress.clone());
            on_progress(&progress);
        }

        self.finish(results.len(), nodes.len(), false);
        results
    }

    /// Let the backend test a whole group in one request
    pub async fn test_group_nodes(
        &self,
        group: &str,
        test_url: &str,
        timeout: Duration,
    ) -> AppResult<GroupDelays> {
        debug!("Testing group {}", group);
        let delays = self.probe.group_delay(group, test_url, timeout).await?;

        let mut delays: Vec<NodeDelay> = delays
            .into_iter()
            .map(|(name, delay)| NodeDelay {
                name,
                delay: Some(delay).filter(|d| *d > 0),
            })
            .collect();
        delays.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(GroupDelays {
            group: group.to_string(),
            delays,
        })
    }

    /// Test groups one after another.
    ///
    /// A failing group is logged and reported with no delays. When aborted,
    /// the groups tested so far are returned.
    pub async fn test_multiple_groups(
        &self,
        groups: &[String],
        test_url: &str,
        timeout: Duration,
    ) -> Vec<GroupDelays> {
        let run = self.begin_run();
        self.set_progress(LatencyProgress {
            completed: 0,
            total: groups.len(),
            running: true,
            aborted: false,
        });

        let mut results = Vec::with_capacity(groups.len());
        for group in groups {
            if run.is_aborted() {
                warn!(
                    "Latency test aborted after {}/{} groups",
                    results.len(),
                    groups.len()
                );
                self.finish(results.len(), groups.len(), true);
                return results;
            }

            let delays = match self.test_group_nodes(group, test_url, timeout).await {
                Ok(delays) => delays,
                Err(e) => {
                    warn!("Latency test of group {} failed: {}", group, e);
                    GroupDelays {
                        group: group.clone(),
                        delays: Vec::new(),
                    }
                }
            };
            results.push(delays);
            self.progress.lock().completed = results.len();
        }

        self.finish(results.len(), groups.len(), false);
        results
    }

    fn begin_run(&self) -> RunToken {
        let mut state = self.aborts.lock();
        let flag = Arc::new(AtomicBool::new(std::mem::take(&mut state.pending)));
        state.running.push(flag.clone());
        RunToken {
            flag,
            state: self.aborts.clone(),
        }
    }

    async fn probe_node(&self, name: &str, test_url: &str, timeout: Duration) -> NodeDelay {
        let probe = self.probe.node_delay(name, test_url, timeout);
        let delay = match tokio::time::timeout(timeout + PROBE_GRACE, probe).await {
            Ok(Ok(delay)) if delay > 0 => Some(delay),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                debug!("Probe of {} failed: {}", name, e);
                None
            }
            Err(_) => {
                debug!("Probe of {} timed out", name);
                None
            }
        };

        NodeDelay {
            name: name.to_string(),
            delay,
        }
    }

    fn set_progress(&self, progress: LatencyProgress) {
        *self.progress.lock() = progress;
    }

    fn finish(&self, completed: usize, total: usize, aborted: bool) {
        self.set_progress(LatencyProgress {
            completed,
            total,
            running: false,
            aborted,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::AppError;
    use std::sync::atomic::AtomicUsize;

    /// Answers `name.len()` ms; names starting with "bad" fail
    struct FakeProbe {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeProbe {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    impl DelayProbe for FakeProbe {
        fn node_delay<'a>(
            &'a self,
            name: &'a str,
            _test_url: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, AppResult<u32>> {
            async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);

                if name.starts_with("bad") {
                    Err(AppError::BackendError("503".to_string()))
                } else {
                    Ok(name.len() as u32)
                }
            }
            .boxed()
        }

        fn group_delay<'a>(
            &'a self,
            group: &'a str,
            _test_url: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, AppResult<HashMap<String, u32>>> {
            async move {
                if group == "broken" {
                    return Err(AppError::BackendError("404".to_string()));
                }
                let mut map = HashMap::new();
                map.insert(format!("{}-b", group), 120);
                map.insert(format!("{}-a", group), 80);
                Ok(map)
            }
            .boxed()
        }
    }

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("node-{}", i)).collect()
    }

    #[tokio::test]
    async fn test_batches_are_bounded() {
        let probe = Arc::new(FakeProbe::new());
        let tester = LatencyTester::new(probe.clone());

        let mut updates = Vec::new();
        let results = tester
            .batch_test_nodes(&names(25), "http://probe", Duration::from_secs(1), |p| {
                updates.push(p.completed)
            })
            .await;

        assert_eq!(results.len(), 25);
        assert_eq!(updates, vec![10, 20, 25]);
        assert!(probe.max_in_flight.load(Ordering::SeqCst) <= BATCH_SIZE);
        assert_eq!(results[0], NodeDelay { name: "node-0".to_string(), delay: Some(6) });

        let progress = tester.progress();
        assert!(!progress.running);
        assert_eq!(progress.completed, 25);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_batch() {
        let tester = LatencyTester::new(Arc::new(FakeProbe::new()));
        let nodes = vec!["good".to_string(), "bad-node".to_string(), "fine".to_string()];

        let results = tester
            .batch_test_nodes(&nodes, "http://probe", Duration::from_secs(1), |_| {})
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].delay, None);
        assert_eq!(results[2].delay, Some(4));
    }

    #[tokio::test]
    async fn test_abort_between_batches() {
        let tester = LatencyTester::new(Arc::new(FakeProbe::new()));
        let handle = tester.clone();

        let results = tester
            .batch_test_nodes(&names(35), "http://probe", Duration::from_secs(1), |p| {
                if p.completed == 10 {
                    handle.abort_test();
                }
            })
            .await;

        assert_eq!(results.len(), 10);
        let progress = tester.progress();
        assert!(progress.aborted);
        assert!(!progress.running);
    }

    #[tokio::test]
    async fn test_group_delegation_and_sequence() {
        let tester = LatencyTester::new(Arc::new(FakeProbe::new()));

        let single = tester
            .test_group_nodes("Proxy", "http://probe", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(single.delays[0].name, "Proxy-a");
        assert_eq!(single.delays[0].delay, Some(80));

        let groups = vec!["Proxy".to_string(), "broken".to_string(), "Auto".to_string()];
        let all = tester
            .test_multiple_groups(&groups, "http://probe", Duration::from_secs(1))
            .await;
        assert_eq!(all.len(), 3);
        assert!(all[1].delays.is_empty());
        assert_eq!(all[2].group, "Auto");
    }

    /// Aborts its tester while the `trigger` group is being tested
    struct AbortingProbe {
        trigger: &'static str,
        tester: Mutex<Option<LatencyTester>>,
    }

    impl DelayProbe for AbortingProbe {
        fn node_delay<'a>(
            &'a self,
            _name: &'a str,
            _test_url: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, AppResult<u32>> {
            async { Ok::<u32, AppError>(1) }.boxed()
        }

        fn group_delay<'a>(
            &'a self,
            group: &'a str,
            _test_url: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, AppResult<HashMap<String, u32>>> {
            async move {
                if group == self.trigger {
                    let tester = self.tester.lock().clone();
                    if let Some(tester) = tester {
                        tester.abort_test();
                    }
                }
                let mut map = HashMap::new();
                map.insert(format!("{}-a", group), 50);
                Ok(map)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_group_abort_keeps_tested_groups() {
        let probe = Arc::new(AbortingProbe {
            trigger: "Auto",
            tester: Mutex::new(None),
        });
        let tester = LatencyTester::new(probe.clone());
        *probe.tester.lock() = Some(tester.clone());

        let groups = vec!["Proxy".to_string(), "Auto".to_string(), "Fallback".to_string()];
        let results = tester
            .test_multiple_groups(&groups, "http://probe", Duration::from_secs(1))
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].group, "Proxy");
        assert_eq!(results[1].delays[0].delay, Some(50));

        let progress = tester.progress();
        assert!(progress.aborted);
        assert!(!progress.running);
        assert_eq!(progress.completed, 2);
    }

    #[tokio::test]
    async fn test_abort_before_start_is_kept() {
        let tester = LatencyTester::new(Arc::new(FakeProbe::new()));
        tester.abort_test();

        let results = tester
            .batch_test_nodes(&names(5), "http://probe", Duration::from_secs(1), |_| {})
            .await;
        assert!(results.is_empty());
        assert!(tester.progress().aborted);

        // Consumed by that run
        let results = tester
            .batch_test_nodes(&names(5), "http://probe", Duration::from_secs(1), |_| {})
            .await;
        assert_eq!(results.len(), 5);
        assert!(tester.aborts.lock().running.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_runs_keep_their_abort() {
        let tester = LatencyTester::new(Arc::new(FakeProbe::new()));
        let first = tester.begin_run();
        let second = tester.begin_run();

        tester.abort_test();
        assert!(first.is_aborted());
        assert!(second.is_aborted());

        // A run started afterwards neither inherits nor clears those aborts
        let groups = vec!["Proxy".to_string()];
        let results = tester
            .test_multiple_groups(&groups, "http://probe", Duration::from_secs(1))
            .await;
        assert_eq!(results.len(), 1);
        assert!(first.is_aborted());
        assert!(second.is_aborted());

        drop(first);
        drop(second);
        assert!(tester.aborts.lock().running.is_empty());
    }
}
