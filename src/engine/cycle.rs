//! One reconciliation cycle across vendor sources
//!
//! Adapters are fetched concurrently with staggered start times, each bounded by
//! the fetch timeout. Their candidates are then reconciled one source at a time.
//! At most one cycle runs at once across every process sharing the database;
//! overlapping triggers are rejected.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::config::FETCH_STAGGER_DELAY_MS;
use crate::engine::update::UpdateEngine;
use crate::source::{Candidates, FetchError, SourceAdapter, SourceKind};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("A reconciliation cycle is already running")]
    AlreadyRunning,

    #[error("Source {0} is not enabled")]
    UnknownSource(SourceKind),

    #[error("Failed to claim the reconciliation lock: {0}")]
    Lock(StoreError),

    #[error("Storage failure while reconciling {kind}: {source}")]
    Persistence {
        kind: SourceKind,
        source: StoreError,
        /// Sources reconciled before the failure
        completed: CycleSummary,
    },
}

/// Per-source result of a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorOutcome {
    /// Number of newly observed versions
    Updated(usize),
    NoNewVersions,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub outcomes: Vec<(SourceKind, VendorOutcome)>,
}

impl CycleSummary {
    pub fn outcome(&self, kind: SourceKind) -> Option<&VendorOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| outcome)
    }

    /// Total number of newly observed versions across sources
    pub fn updated_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                VendorOutcome::Updated(n) => *n,
                _ => 0,
            })
            .sum()
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, outcome) in &self.outcomes {
            match outcome {
                VendorOutcome::Updated(n) => writeln!(f, "{kind}: {n} new version(s)")?,
                VendorOutcome::NoNewVersions => writeln!(f, "{kind}: no new versions")?,
                VendorOutcome::Failed(e) => writeln!(f, "{kind}: failed: {e}")?,
            }
        }
        Ok(())
    }
}

static NEXT_OWNER: AtomicU64 = AtomicU64::new(0);

pub struct Reconciler<S: Store> {
    engine: UpdateEngine<S>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    fetch_timeout: Duration,
    running: Mutex<()>,
    /// Name this reconciler claims the database cycle lock under
    owner: String,
}

impl<S: Store> Reconciler<S> {
    pub fn new(
        store: Arc<S>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            engine: UpdateEngine::new(store),
            adapters,
            fetch_timeout,
            running: Mutex::new(()),
            owner: format!(
                "pid {} #{}",
                std::process::id(),
                NEXT_OWNER.fetch_add(1, Ordering::Relaxed)
            ),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        self.engine.store()
    }

    /// Kinds of the configured adapters, in reconciliation order
    pub fn sources(&self) -> Vec<SourceKind> {
        self.adapters.iter().map(|adapter| adapter.kind()).collect()
    }

    /// Whether a cycle of this reconciler currently holds the guard
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Fetch every source and reconcile the results
    pub async fn reconcile_all(&self) -> Result<CycleSummary, CycleError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| CycleError::AlreadyRunning)?;

        info!("Starting reconciliation of {} sources", self.adapters.len());
        self.run_claimed(&self.adapters).await
    }

    /// Fetch and reconcile a single source
    pub async fn reconcile_one(&self, kind: SourceKind) -> Result<CycleSummary, CycleError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| CycleError::AlreadyRunning)?;

        let adapter = self
            .adapters
            .iter()
            .find(|adapter| adapter.kind() == kind)
            .cloned()
            .ok_or(CycleError::UnknownSource(kind))?;

        info!("Starting reconciliation of {}", kind);
        self.run_claimed(&[adapter]).await
    }

    /// Run a cycle while holding the database cycle lock
    async fn run_claimed(
        &self,
        adapters: &[Arc<dyn SourceAdapter>],
    ) -> Result<CycleSummary, CycleError> {
        let store = self.store();
        if !store.try_start_cycle(&self.owner).map_err(CycleError::Lock)? {
            warn!("Another process is reconciling, skipping this cycle");
            return Err(CycleError::AlreadyRunning);
        }

        let result = self.run(adapters).await;

        if let Err(e) = store.finish_cycle(&self.owner) {
            error!("Failed to release the cycle lock held by {}: {}", self.owner, e);
        }
        result
    }

    async fn run(&self, adapters: &[Arc<dyn SourceAdapter>]) -> Result<CycleSummary, CycleError> {
        let fetched = self.fetch_all(adapters).await;

        let mut summary = CycleSummary::default();
        for (kind, result) in fetched {
            let outcome = match result {
                Ok(candidates) => match self.engine.reconcile(kind, &candidates) {
                    Ok(report) if report.new_versions.is_empty() => VendorOutcome::NoNewVersions,
                    Ok(report) => VendorOutcome::Updated(report.new_versions.len()),
                    Err(source) => {
                        error!("Aborting cycle: {} failed to persist: {}", kind, source);
                        return Err(CycleError::Persistence {
                            kind,
                            source,
                            completed: summary,
                        });
                    }
                },
                Err(e) => {
                    warn!("Failed to fetch {}: {}", kind, e);
                    VendorOutcome::Failed(e.to_string())
                }
            };
            summary.outcomes.push((kind, outcome));
        }

        info!(
            "Reconciliation finished: {} new versions",
            summary.updated_count()
        );
        Ok(summary)
    }

    /// Fetch adapters in parallel with staggered start times
    async fn fetch_all(
        &self,
        adapters: &[Arc<dyn SourceAdapter>],
    ) -> Vec<(SourceKind, Result<Candidates, FetchError>)> {
        let futures = adapters.iter().enumerate().map(|(i, adapter)| {
            let delay = Duration::from_millis(FETCH_STAGGER_DELAY_MS * i as u64);
            async move {
                sleep(delay).await;
                let result = fetch_with_timeout(adapter.as_ref(), self.fetch_timeout).await;
                (adapter.kind(), result)
            }
        });

        join_all(futures).await
    }
}

async fn fetch_with_timeout(
    adapter: &dyn SourceAdapter,
    limit: Duration,
) -> Result<Candidates, FetchError> {
    match timeout(limit, adapter.fetch()).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(limit)),
    }
}
