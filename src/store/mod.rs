//! Persistence layer for products, version history, users and notifications
//!
//! - [`Store`]: storage seam used by the update engine and the CLI
//! - [`sqlite`]: SQLite implementation
//! - [`models`]: persisted records

#[cfg(test)]
use mockall::automock;

pub mod error;
pub mod models;
pub mod sqlite;

pub use error::StoreError;
pub use models::{
    AuditEntry, NewProductVersion, Notification, Product, ProductVersion, User, UserProduct,
};
pub use sqlite::SqliteStore;

/// Trait for storing and retrieving tracked products and their subscribers
#[cfg_attr(test, automock)]
pub trait Store: Send + Sync + 'static {
    /// Claim the single reconciliation slot shared by every process using
    /// this database. A claim older than `CYCLE_LOCK_TIMEOUT_MS` is taken over.
    ///
    /// Returns false if another owner holds it.
    fn try_start_cycle(&self, owner: &str) -> Result<bool, StoreError>;

    /// Release a claim taken by `owner`. Claims held by others are untouched.
    fn finish_cycle(&self, owner: &str) -> Result<(), StoreError>;

    /// Start a transaction covering every following call until commit/rollback
    fn begin(&self) -> Result<(), StoreError>;

    fn commit(&self) -> Result<(), StoreError>;

    fn rollback(&self) -> Result<(), StoreError>;

    fn find_product(&self, vendor: &str, name: &str) -> Result<Option<Product>, StoreError>;

    fn get_product(&self, product_id: i64) -> Result<Option<Product>, StoreError>;

    /// Create a product seeded with `latest_version`, or return the existing one
    fn create_product(
        &self,
        vendor: &str,
        name: &str,
        latest_version: &str,
    ) -> Result<Product, StoreError>;

    fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Set the latest known version and bump `last_updated`
    fn update_latest_version(&self, product_id: i64, version: &str) -> Result<(), StoreError>;

    fn set_product_error(&self, product_id: i64, error: Option<String>) -> Result<(), StoreError>;

    /// Append a history entry unless the exact raw version text already exists.
    ///
    /// Returns true if a new entry was written.
    fn insert_product_version(
        &self,
        product_id: i64,
        entry: &NewProductVersion,
    ) -> Result<bool, StoreError>;

    /// History of a product, oldest first
    fn product_versions(&self, product_id: i64) -> Result<Vec<ProductVersion>, StoreError>;

    fn create_user(&self, username: &str, notify: bool) -> Result<User, StoreError>;

    fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    fn set_notify(&self, user_id: i64, notify: bool) -> Result<(), StoreError>;

    fn notify_eligible_users(&self) -> Result<Vec<User>, StoreError>;

    /// Fetch the accepted-version record, creating it from the product's
    /// latest known version on first access
    fn get_or_create_user_product(
        &self,
        user_id: i64,
        product: &Product,
    ) -> Result<UserProduct, StoreError>;

    /// Accept the product's latest known version. Returns false if there was
    /// nothing new to accept.
    fn apply_latest(&self, user_id: i64, product_id: i64) -> Result<bool, StoreError>;

    fn insert_notification(&self, user_id: i64, message: &str) -> Result<(), StoreError>;

    fn notifications(&self, user_id: i64, unread_only: bool)
    -> Result<Vec<Notification>, StoreError>;

    /// Returns the number of notifications marked read
    fn mark_notifications_read(&self, user_id: i64) -> Result<usize, StoreError>;

    fn add_audit_entry(
        &self,
        user_id: i64,
        product_id: i64,
        user_version: &str,
    ) -> Result<AuditEntry, StoreError>;

    fn audit_entries(&self, user_id: i64) -> Result<Vec<AuditEntry>, StoreError>;

    fn clear_audit(&self, user_id: i64) -> Result<usize, StoreError>;
}
