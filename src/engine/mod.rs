//! Reconciliation of vendor candidates into products, history and notifications
//!
//! - [`update`]: per-source reconciliation inside one store transaction
//! - [`notify`]: per-user notification decision
//! - [`cycle`]: concurrent fetch plus sequential reconcile, guarded against overlap
//! - [`scheduler`]: periodic loop with manual triggers and graceful stop

pub mod cycle;
pub mod notify;
pub mod scheduler;
pub mod update;

pub use cycle::{CycleError, CycleSummary, Reconciler, VendorOutcome};
pub use notify::{NotifyDecision, maybe_notify, notification_message};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use update::{NewVersion, SkippedCandidate, UpdateEngine, VendorReport};
