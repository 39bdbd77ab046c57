//! Audit report: declared installed versions against latest known versions

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::source::scheme_for_product;
use crate::store::{Store, StoreError};
use crate::version::{Comparison, Confidence, compare_lenient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    pub audit_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub user_version: String,
    pub latest_version: Option<String>,
    /// Declared version is older than the latest known version
    pub needs_update: bool,
    /// None when the product has no latest known version
    pub comparison: Option<Comparison>,
}

/// Audit rows grouped by vendor, in the order entries were added
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub vendors: IndexMap<String, Vec<AuditRow>>,
}

impl AuditReport {
    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }

    pub fn needs_update_count(&self) -> usize {
        self.vendors
            .values()
            .flatten()
            .filter(|row| row.needs_update)
            .count()
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (vendor, rows) in &self.vendors {
            writeln!(f, "{vendor}")?;
            for row in rows {
                let latest = row.latest_version.as_deref().unwrap_or("-");
                let status = match (row.needs_update, row.comparison) {
                    (true, Some(c)) if c.confidence == Confidence::Degraded => "needs update (?)",
                    (true, _) => "needs update",
                    (false, _) => "up to date",
                };
                writeln!(
                    f,
                    "  [{}] {}: {} -> {} {}",
                    row.audit_id, row.product_name, row.user_version, latest, status
                )?;
            }
        }
        Ok(())
    }
}

/// Build the audit report for `user_id`.
///
/// Declared versions are compared with the product's scheme. When either side
/// does not parse, raw text order is used and the row is marked degraded.
pub fn audit_report<S: Store + ?Sized>(store: &S, user_id: i64) -> Result<AuditReport, StoreError> {
    let entries = store.audit_entries(user_id)?;
    debug!("Building audit report from {} entries", entries.len());

    let mut report = AuditReport::default();
    for entry in entries {
        let product = store
            .get_product(entry.product_id)?
            .ok_or(StoreError::ProductNotFound(entry.product_id))?;

        let comparison = product
            .latest_version
            .as_deref()
            .filter(|latest| !latest.trim().is_empty())
            .map(|latest| {
                let scheme = scheme_for_product(&product.vendor, &product.name);
                compare_lenient(scheme, &entry.user_version, latest)
            });

        let row = AuditRow {
            audit_id: entry.id,
            product_id: product.id,
            product_name: product.name,
            user_version: entry.user_version,
            latest_version: product.latest_version,
            needs_update: comparison.is_some_and(|c| c.ordering == Ordering::Less),
            comparison,
        };
        report.vendors.entry(product.vendor).or_default().push(row);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::new(&temp_dir.path().join("test.db")).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn audit_report_groups_by_vendor_and_flags_outdated_entries() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("alice", false).unwrap();
        let kav = store.create_product("Kaspersky", "Antivirus", "12.10").unwrap();
        let ngfw = store
            .create_product("UserGate 7.x", "NGFW", "UserGate NGFW 7.1 build 7.1.0.1400")
            .unwrap();
        let ksc = store.create_product("Kaspersky", "KSC", "15.1").unwrap();

        store.add_audit_entry(user.id, kav.id, "12.9").unwrap();
        store.add_audit_entry(user.id, ngfw.id, "7.1.0.1400").unwrap();
        store.add_audit_entry(user.id, ksc.id, "15.1.0").unwrap();

        let report = audit_report(&store, user.id).unwrap();

        let vendors: Vec<_> = report.vendors.keys().cloned().collect();
        assert_eq!(vendors, vec!["Kaspersky", "UserGate 7.x"]);

        let kaspersky = &report.vendors["Kaspersky"];
        assert_eq!(kaspersky.len(), 2);
        assert!(kaspersky[0].needs_update);
        assert_eq!(
            kaspersky[0].comparison.map(|c| c.confidence),
            Some(Confidence::Exact)
        );
        assert!(!kaspersky[1].needs_update);

        assert!(!report.vendors["UserGate 7.x"][0].needs_update);
        assert_eq!(report.needs_update_count(), 1);
    }

    #[test]
    fn audit_report_marks_unparseable_versions_as_degraded() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("alice", false).unwrap();
        let product = store.create_product("Код Безопасности", "vGate", "4.11").unwrap();
        store.add_audit_entry(user.id, product.id, "current").unwrap();

        let report = audit_report(&store, user.id).unwrap();

        let row = &report.vendors["Код Безопасности"][0];
        assert_eq!(
            row.comparison.map(|c| c.confidence),
            Some(Confidence::Degraded)
        );
        assert!(report.to_string().contains("vGate: current -> 4.11"));
    }

    #[test]
    fn audit_report_without_latest_version_never_needs_update() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("alice", false).unwrap();
        let product = store.create_product("Kaspersky", "Antivirus", "").unwrap();
        store.add_audit_entry(user.id, product.id, "1.0").unwrap();

        let report = audit_report(&store, user.id).unwrap();

        let row = &report.vendors["Kaspersky"][0];
        assert_eq!(row.comparison, None);
        assert!(!row.needs_update);
    }

    #[test]
    fn audit_report_is_empty_for_user_without_entries() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("bob", true).unwrap();

        let report = audit_report(&store, user.id).unwrap();

        assert!(report.is_empty());
        assert_eq!(report.to_string(), "");
    }
}
