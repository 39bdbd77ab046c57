//! Periodic and manually triggered reconciliation

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{error, info, warn};

use crate::engine::cycle::{CycleError, Reconciler};
use crate::store::Store;

/// Runs reconciliation cycles on a fixed interval until stopped
pub struct Scheduler;

impl Scheduler {
    /// Spawn the scheduling loop. The first scheduled cycle runs one
    /// `interval` after start; use [`SchedulerHandle::trigger`] to run earlier.
    pub fn start<S: Store>(
        reconciler: Arc<Reconciler<S>>,
        interval: Duration,
    ) -> SchedulerHandle<S> {
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle_reconciler = reconciler.clone();

        let task = tokio::spawn(async move {
            info!("Scheduler started, interval {:?}", interval);

            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("Scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => run_cycle(&reconciler, "scheduled").await,
                    Some(()) = trigger_rx.recv() => run_cycle(&reconciler, "manual").await,
                }
            }
        });

        SchedulerHandle {
            trigger_tx,
            shutdown_tx,
            task,
            reconciler: handle_reconciler,
        }
    }
}

async fn run_cycle<S: Store>(reconciler: &Reconciler<S>, reason: &str) {
    info!("Running {} reconciliation", reason);
    match reconciler.reconcile_all().await {
        Ok(summary) => info!("Reconciliation summary:\n{}", summary),
        Err(CycleError::AlreadyRunning) => {
            warn!("Skipping {} reconciliation: a cycle is already running", reason)
        }
        Err(e) => error!("{} reconciliation failed: {}", reason, e),
    }
}

/// Owner of a running [`Scheduler`] loop
pub struct SchedulerHandle<S: Store> {
    reconciler: Arc<Reconciler<S>>,
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<S: Store> SchedulerHandle<S> {
    /// Request an immediate cycle.
    ///
    /// Returns false when a cycle is running or another request is already queued.
    pub fn trigger(&self) -> bool {
        if self.reconciler.is_running() {
            return false;
        }
        self.trigger_tx.try_send(()).is_ok()
    }

    /// Stop the loop, letting an in-flight cycle finish first
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!("Scheduler task ended abnormally: {}", e);
        }
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Candidates, FetchError, SourceAdapter, SourceKind};
    use crate::store::SqliteStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::time::sleep;

    struct CountingAdapter {
        fetches: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for CountingAdapter {
        fn kind(&self) -> SourceKind {
            SourceKind::Kaspersky
        }

        async fn fetch(&self) -> Result<Candidates, FetchError> {
            sleep(self.delay).await;
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Candidates::new())
        }
    }

    fn create_reconciler(
        delay: Duration,
    ) -> (TempDir, Arc<AtomicUsize>, Arc<Reconciler<SqliteStore>>) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::new(&temp_dir.path().join("test.db")).unwrap();
        let fetches = Arc::new(AtomicUsize::new(0));
        let adapter: Arc<dyn SourceAdapter> = Arc::new(CountingAdapter {
            fetches: fetches.clone(),
            delay,
        });
        let reconciler = Reconciler::new(
            Arc::new(store),
            vec![adapter],
            Duration::from_secs(5),
        );
        (temp_dir, fetches, Arc::new(reconciler))
    }

    async fn wait_for(fetches: &AtomicUsize, expected: usize) {
        for _ in 0..100 {
            if fetches.load(Ordering::SeqCst) >= expected {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} fetches, got {}", fetches.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn runs_cycles_on_interval() {
        let (_temp_dir, fetches, reconciler) = create_reconciler(Duration::ZERO);

        let handle = Scheduler::start(reconciler, Duration::from_millis(30));
        assert_eq!(fetches.load(Ordering::SeqCst), 0);

        wait_for(&fetches, 2).await;
        handle.stop().await;
    }

    #[tokio::test]
    async fn trigger_runs_a_cycle_immediately() {
        let (_temp_dir, fetches, reconciler) = create_reconciler(Duration::ZERO);
        let handle = Scheduler::start(reconciler, Duration::from_secs(3600));

        assert!(handle.trigger());
        wait_for(&fetches, 1).await;

        handle.stop().await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trigger_is_rejected_while_a_cycle_runs() {
        let (_temp_dir, fetches, reconciler) = create_reconciler(Duration::from_millis(200));
        let handle = Scheduler::start(reconciler.clone(), Duration::from_secs(3600));

        assert!(handle.trigger());
        for _ in 0..100 {
            if reconciler.is_running() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }

        assert!(!handle.trigger());

        wait_for(&fetches, 1).await;
        handle.stop().await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_ends_the_loop_without_running_a_cycle() {
        let (_temp_dir, fetches, reconciler) = create_reconciler(Duration::ZERO);
        let handle = Scheduler::start(reconciler, Duration::from_secs(3600));

        handle.stop().await;

        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }
}
