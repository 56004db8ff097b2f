//! Leadership monitor
//!
//! Periodically re-evaluates the server status snapshot and publishes the
//! result into the shared [`LeadershipFlag`]. The monitor is the only writer
//! of the flag.

use ovn_exporter_core::prelude::*;
use ovn_exporter_core::{evaluate, LeaderDecision};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Schedules leadership checks against a [`StatusSource`]
pub struct LeadershipMonitor {
    source: Arc<dyn StatusSource>,
    selector: StatusSelector,
    flag: LeadershipFlag,
    interval: Duration,
}

impl LeadershipMonitor {
    pub fn new(
        source: Arc<dyn StatusSource>,
        selector: StatusSelector,
        flag: LeadershipFlag,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            selector,
            flag,
            interval,
        }
    }

    /// Run one check now and store the result. Never fails: any fault
    /// reads as not-leader.
    pub async fn check(&self) -> bool {
        let source = self.source.clone();
        let selector = self.selector.clone();

        // A panic inside the check surfaces here as a JoinError.
        let decision = match tokio::spawn(async move { check_once(source.as_ref(), &selector).await }).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(error = %e, "Leadership check aborted");
                None
            }
        };

        let leader = decision.is_some_and(|d| d.is_leader());
        let previous = self.flag.get();
        self.flag.set(leader);

        if leader != previous {
            info!(leader, decision = ?decision, "Leadership changed");
        } else {
            debug!(leader, decision = ?decision, "Leadership unchanged");
        }
        leader
    }

    /// Check immediately, then every `interval` until cancelled.
    pub fn spawn(self) -> MonitorHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check().await;
            }
        });
        MonitorHandle { task }
    }
}

/// `None` when the snapshot could not be read
async fn check_once(source: &dyn StatusSource, selector: &StatusSelector) -> Option<LeaderDecision> {
    match source.database_status().await {
        Ok(rows) => Some(evaluate(&rows, selector, source.database_name())),
        Err(e) => {
            info!(
                error = %e,
                database = source.database_name(),
                "Cannot read server status, treating as not leader"
            );
            None
        }
    }
}

/// Cancellation handle for a running [`LeadershipMonitor`]
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop future checks. A check in progress is dropped.
    pub fn cancel(self) {
        self.task.abort();
        debug!("Leadership monitor cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ovn_exporter_core::DatabaseModel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Status source fed by the test; `panic_on` makes the n-th read panic
    struct FakeStatus {
        rows: Mutex<Option<Vec<DatabaseStatus>>>,
        reads: AtomicUsize,
        panic_on: Option<usize>,
    }

    impl FakeStatus {
        fn new(rows: Option<Vec<DatabaseStatus>>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
                reads: AtomicUsize::new(0),
                panic_on: None,
            })
        }

        fn set(&self, rows: Option<Vec<DatabaseStatus>>) {
            *self.rows.lock().unwrap() = rows;
        }
    }

    #[async_trait]
    impl StatusSource for FakeStatus {
        async fn database_status(&self) -> Result<Vec<DatabaseStatus>> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if self.panic_on == Some(n) {
                panic!("status table exploded");
            }
            self.rows
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ExporterError::status_unavailable("no rows yet"))
        }

        fn database_name(&self) -> &str {
            "OVN_Southbound"
        }
    }

    fn clustered(leader: bool) -> Vec<DatabaseStatus> {
        vec![DatabaseStatus {
            name: "OVN_Southbound".to_string(),
            model: DatabaseModel::Clustered,
            schema_present: true,
            connected: true,
            leader,
            cluster_ids: vec![],
        }]
    }

    fn monitor(source: Arc<FakeStatus>, flag: LeadershipFlag) -> LeadershipMonitor {
        LeadershipMonitor::new(
            source,
            StatusSelector::new(None, "OVN_Southbound"),
            flag,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_clustered_follower_is_not_leader() {
        let flag = LeadershipFlag::new();
        flag.set(true);
        let m = monitor(FakeStatus::new(Some(clustered(false))), flag.clone());

        assert!(!m.check().await);
        assert!(!flag.get());
    }

    #[tokio::test]
    async fn test_unavailable_status_fails_closed() {
        let flag = LeadershipFlag::new();
        let m = monitor(FakeStatus::new(None), flag.clone());
        assert!(!m.check().await);
    }

    #[tokio::test]
    async fn test_panicking_check_fails_closed() {
        let source = Arc::new(FakeStatus {
            rows: Mutex::new(Some(clustered(true))),
            reads: AtomicUsize::new(0),
            panic_on: Some(0),
        });
        let flag = LeadershipFlag::new();
        let m = monitor(source, flag.clone());

        assert!(!m.check().await);
        assert!(m.check().await);
        assert!(flag.get());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearms_every_interval_until_cancelled() {
        let source = FakeStatus::new(None);
        let flag = LeadershipFlag::new();
        let handle = monitor(source.clone(), flag.clone()).spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
        assert!(!flag.get());

        source.set(Some(clustered(true)));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
        assert!(flag.get());

        source.set(Some(clustered(false)));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!flag.get());

        handle.cancel();
        let reads = source.reads.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.reads.load(Ordering::SeqCst), reads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_rearming_after_panic() {
        let source = Arc::new(FakeStatus {
            rows: Mutex::new(Some(clustered(true))),
            reads: AtomicUsize::new(0),
            panic_on: Some(0),
        });
        let flag = LeadershipFlag::new();
        let handle = monitor(source.clone(), flag.clone()).spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!flag.get());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(flag.get());
        handle.cancel();
    }
}
