//! Per-user notification decisions for newly observed versions

use std::cmp::Ordering;

use tracing::{debug, info, warn};

use crate::store::{Product, Store, StoreError, User};
use crate::version::VersionScheme;

/// Outcome of [`maybe_notify`] for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyDecision {
    /// A notification was written
    Emitted,
    /// The user's accepted version is already at or above the new version
    Suppressed,
    /// The user's accepted version could not be parsed
    Skipped,
}

pub fn notification_message(product: &Product, version: &str) -> String {
    format!(
        "New version for {} {}: {}",
        product.vendor, product.name, version
    )
}

/// Notify `user` about `new_version` unless their accepted version already covers it.
///
/// The accepted-version record is created on first access, seeded with the
/// product's latest known version as passed in. Notifications never change the
/// accepted version; only an explicit apply does, so a user is told once per
/// newly observed version.
pub fn maybe_notify<S: Store + ?Sized>(
    store: &S,
    scheme: VersionScheme,
    user: &User,
    product: &Product,
    new_version: &str,
) -> Result<NotifyDecision, StoreError> {
    let state = store.get_or_create_user_product(user.id, product)?;

    match scheme.compare_optional(new_version, state.accepted_version.as_deref()) {
        Ok(Ordering::Greater) => {
            store.insert_notification(user.id, &notification_message(product, new_version))?;
            info!(
                "Notified {} about {} {} {}",
                user.username, product.vendor, product.name, new_version
            );
            Ok(NotifyDecision::Emitted)
        }
        Ok(_) => {
            debug!(
                "{} already accepted {:?} for {} {}",
                user.username, state.accepted_version, product.vendor, product.name
            );
            Ok(NotifyDecision::Suppressed)
        }
        Err(e) => {
            warn!(
                "Skipping notification for {} on {} {}: {}",
                user.username, product.vendor, product.name, e
            );
            Ok(NotifyDecision::Skipped)
        }
    }
}
