//! Reconciliation of one source's candidates against stored products

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::engine::notify::{NotifyDecision, maybe_notify};
use crate::source::{Candidate, Candidates, SourceKind};
use crate::store::{NewProductVersion, Product, Store, StoreError, User};
use crate::version::VersionScheme;

/// A version that was not in the product's history before this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVersion {
    pub product_id: i64,
    pub product_name: String,
    pub version: String,
}

/// A candidate left out of this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
    pub product_name: String,
    pub reason: String,
}

/// What one source's reconciliation changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorReport {
    pub kind: SourceKind,
    pub new_versions: Vec<NewVersion>,
    pub skipped: Vec<SkippedCandidate>,
    /// Products whose latest known version advanced
    pub advanced: usize,
    pub notifications: usize,
}

impl VendorReport {
    fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            new_versions: Vec::new(),
            skipped: Vec::new(),
            advanced: 0,
            notifications: 0,
        }
    }
}

/// Applies source candidates to the store and notifies subscribed users
pub struct UpdateEngine<S: Store> {
    store: Arc<S>,
}

impl<S: Store> UpdateEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Reconcile `candidates` from `kind` inside one transaction.
    ///
    /// A malformed candidate only skips that product. A storage error rolls
    /// back everything written for this source and is returned.
    pub fn reconcile(
        &self,
        kind: SourceKind,
        candidates: &Candidates,
    ) -> Result<VendorReport, StoreError> {
        self.store.begin()?;

        match self.reconcile_candidates(kind, candidates) {
            Ok(report) => {
                self.store.commit()?;
                info!(
                    "{}: {} new versions, {} notifications, {} skipped",
                    kind,
                    report.new_versions.len(),
                    report.notifications,
                    report.skipped.len()
                );
                Ok(report)
            }
            Err(e) => {
                error!("{}: reconciliation failed, rolling back: {}", kind, e);
                if let Err(rollback_err) = self.store.rollback() {
                    error!("{}: rollback failed: {}", kind, rollback_err);
                }
                Err(e)
            }
        }
    }

    fn reconcile_candidates(
        &self,
        kind: SourceKind,
        candidates: &Candidates,
    ) -> Result<VendorReport, StoreError> {
        let vendor = kind.vendor();
        let scheme = kind.scheme();
        let mut report = VendorReport::new(kind);
        // Loaded on the first newly observed version
        let mut eligible: Option<Vec<User>> = None;

        for (name, candidate) in candidates {
            let existing = self.store.find_product(vendor, name)?;

            if let Err(e) = scheme.parse(&candidate.version) {
                warn!("{} {}: {}", vendor, name, e);
                if let Some(product) = &existing {
                    self.store.set_product_error(product.id, Some(e.to_string()))?;
                }
                report.skipped.push(SkippedCandidate {
                    product_name: name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }

            let product = match existing {
                Some(product) => product,
                None => self.store.create_product(vendor, name, &candidate.version)?,
            };
            if product.error.is_some() {
                self.store.set_product_error(product.id, None)?;
            }

            let newly_observed = self.store.insert_product_version(
                product.id,
                &NewProductVersion {
                    version: candidate.version.clone(),
                    release_date: candidate.release_date.clone(),
                    full_title: Some(name.clone()),
                },
            )?;

            if newly_observed {
                debug!("{} {}: observed {}", vendor, name, candidate.version);
                report.new_versions.push(NewVersion {
                    product_id: product.id,
                    product_name: name.clone(),
                    version: candidate.version.clone(),
                });

                if eligible.is_none() {
                    eligible = Some(self.store.notify_eligible_users()?);
                }
                // Users touched for the first time are seeded with the version
                // known before this candidate, so notify before advancing
                for user in eligible.iter().flatten() {
                    let decision =
                        maybe_notify(&*self.store, scheme, user, &product, &candidate.version)?;
                    if decision == NotifyDecision::Emitted {
                        report.notifications += 1;
                    }
                }
            }

            if self.advance_latest(scheme, &product, candidate)? {
                report.advanced += 1;
            }
        }

        Ok(report)
    }

    /// Move the product's latest known version forward if the candidate is newer
    fn advance_latest(
        &self,
        scheme: VersionScheme,
        product: &Product,
        candidate: &Candidate,
    ) -> Result<bool, StoreError> {
        let stored = product.latest_version.as_deref();
        let newer = match scheme.compare_optional(&candidate.version, stored) {
            Ok(ordering) => ordering.is_gt(),
            Err(e) => {
                // The stored value is unusable; the parsed candidate replaces it
                warn!(
                    "{} {}: stored latest version is not comparable ({}), replacing with {}",
                    product.vendor, product.name, e, candidate.version
                );
                true
            }
        };

        if newer {
            self.store.update_latest_version(product.id, &candidate.version)?;
            info!(
                "{} {}: latest version {:?} -> {}",
                product.vendor, product.name, product.latest_version, candidate.version
            );
        }

        Ok(newer)
    }
}
