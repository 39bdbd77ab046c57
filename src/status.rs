//! Per-user view of every tracked product: accepted version against latest

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::source::scheme_for_product;
use crate::store::{Store, StoreError};
use crate::version::compare_lenient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStatus {
    pub product_id: i64,
    pub product_name: String,
    pub accepted_version: Option<String>,
    pub latest_version: Option<String>,
    /// A newer version than the accepted one is waiting to be applied
    pub pending: bool,
}

/// Product statuses grouped by vendor, in product order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserStatus {
    pub vendors: IndexMap<String, Vec<ProductStatus>>,
}

impl UserStatus {
    pub fn pending_count(&self) -> usize {
        self.vendors
            .values()
            .flatten()
            .filter(|status| status.pending)
            .count()
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (vendor, products) in &self.vendors {
            writeln!(f, "{vendor}")?;
            for status in products {
                let accepted = status.accepted_version.as_deref().unwrap_or("-");
                let latest = status.latest_version.as_deref().unwrap_or("-");
                let marker = if status.pending { " (pending)" } else { "" };
                writeln!(
                    f,
                    "  [{}] {}: {} -> {}{}",
                    status.product_id, status.product_name, accepted, latest, marker
                )?;
            }
        }
        Ok(())
    }
}

fn is_pending(vendor: &str, name: &str, accepted: Option<&str>, latest: Option<&str>) -> bool {
    let latest = latest.filter(|v| !v.trim().is_empty());
    match (accepted.filter(|v| !v.trim().is_empty()), latest) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(accepted), Some(latest)) => {
            let scheme = scheme_for_product(vendor, name);
            compare_lenient(scheme, accepted, latest).ordering == Ordering::Less
        }
    }
}

/// Build the status of every product for `user_id`.
///
/// A product the user has never seen gets its accepted version seeded from
/// the current latest version, the same way the notification policy does.
pub fn user_status<S: Store + ?Sized>(store: &S, user_id: i64) -> Result<UserStatus, StoreError> {
    let products = store.list_products()?;
    debug!("Building status of {} products for user {}", products.len(), user_id);

    let mut status = UserStatus::default();
    for product in products {
        let state = store.get_or_create_user_product(user_id, &product)?;
        let pending = is_pending(
            &product.vendor,
            &product.name,
            state.accepted_version.as_deref(),
            product.latest_version.as_deref(),
        );

        status
            .vendors
            .entry(product.vendor)
            .or_default()
            .push(ProductStatus {
                product_id: product.id,
                product_name: product.name,
                accepted_version: state.accepted_version,
                latest_version: product.latest_version,
                pending,
            });
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use rstest::rstest;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::new(&temp_dir.path().join("test.db")).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn user_status_flags_products_with_newer_latest_version() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("alice", true).unwrap();
        let kav = store.create_product("Kaspersky", "Antivirus", "12.9").unwrap();
        store.create_product("UserGate 7.x", "Management Center", "7.1.0").unwrap();
        let ksc = store.create_product("Kaspersky", "KSC", "15.1").unwrap();

        // First look seeds every accepted version from the latest one
        let status = user_status(&store, user.id).unwrap();
        assert_eq!(status.pending_count(), 0);

        store.update_latest_version(kav.id, "12.10").unwrap();
        let status = user_status(&store, user.id).unwrap();

        let vendors: Vec<_> = status.vendors.keys().cloned().collect();
        assert_eq!(vendors, vec!["Kaspersky", "UserGate 7.x"]);
        let kaspersky = &status.vendors["Kaspersky"];
        assert_eq!(kaspersky[0].accepted_version.as_deref(), Some("12.9"));
        assert_eq!(kaspersky[0].latest_version.as_deref(), Some("12.10"));
        assert!(kaspersky[0].pending);
        assert_eq!(kaspersky[1].product_id, ksc.id);
        assert!(!kaspersky[1].pending);
        assert_eq!(status.pending_count(), 1);
        assert!(
            status
                .to_string()
                .contains(&format!("[{}] Antivirus: 12.9 -> 12.10 (pending)", kav.id))
        );

        store.apply_latest(user.id, kav.id).unwrap();
        assert_eq!(user_status(&store, user.id).unwrap().pending_count(), 0);
    }

    #[test]
    fn user_status_compares_ngfw_by_build_number() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("alice", true).unwrap();
        let ngfw = store
            .create_product("UserGate 7.x", "NGFW", "UserGate NGFW 7.1.0 build 7.1.0.1399")
            .unwrap();
        user_status(&store, user.id).unwrap();

        store
            .update_latest_version(ngfw.id, "UserGate NGFW 7.1.0 build 7.1.0.1400")
            .unwrap();

        assert_eq!(user_status(&store, user.id).unwrap().pending_count(), 1);
    }

    #[rstest]
    #[case(Some("4.2"), Some("4.3"), true)]
    #[case(Some("4.3"), Some("4.3.0"), false)]
    #[case(Some("4.4"), Some("4.3"), false)]
    #[case(None, Some("4.3"), true)]
    #[case(Some("4.3"), None, false)]
    #[case(Some(""), Some("4.3"), true)]
    fn pending_follows_version_order(
        #[case] accepted: Option<&str>,
        #[case] latest: Option<&str>,
        #[case] expected: bool,
    ) {
        assert_eq!(is_pending("Kaspersky", "Antivirus", accepted, latest), expected);
    }
}
