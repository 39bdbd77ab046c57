//! Persisted records
//!
//! Timestamps are milliseconds since the UNIX epoch.

/// A tracked vendor product, unique per (vendor, name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    pub vendor: String,
    pub name: String,
    /// Raw text of the highest version observed so far
    pub latest_version: Option<String>,
    pub last_updated: i64,
    /// Set when the last observed candidate could not be parsed
    pub error: Option<String>,
}

/// Immutable history entry, unique per (product, raw version text)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductVersion {
    pub id: i64,
    pub product_id: i64,
    pub version: String,
    pub release_date: Option<String>,
    pub full_title: Option<String>,
    pub created_at: i64,
}

/// Input for a new [`ProductVersion`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProductVersion {
    pub version: String,
    pub release_date: Option<String>,
    pub full_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Whether the user receives new-version notifications
    pub notify: bool,
}

/// The version a user has accepted for a product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProduct {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub accepted_version: Option<String>,
    pub accepted_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub read: bool,
    pub created_at: i64,
}

/// A device a user declared as running `user_version` of a product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub user_version: String,
    pub added_at: i64,
}
