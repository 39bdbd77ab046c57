use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

use crate::config::CYCLE_LOCK_TIMEOUT_MS;

use crate::store::error::StoreError;
use crate::store::models::{
    AuditEntry, NewProductVersion, Notification, Product, ProductVersion, User, UserProduct,
};
use crate::store::Store;

/// Schema migrations
/// Each version contains a list of SQL statements to execute
const MIGRATIONS: &[&[&str]] = &[];

const PRODUCT_COLUMNS: &str = "id, vendor, name, latest_version, last_updated, error";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(db_path: &Path) -> Result<Self, StoreError> {
        info!("Initializing store database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        debug!("Database connection established");

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.create_schema()?;
        info!("Store initialized successfully");

        Ok(store)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Get current timestamp in milliseconds since UNIX epoch
    fn current_timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn create_schema(&self) -> Result<(), StoreError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;

        // Create base tables (later columns arrive through MIGRATIONS)
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                notify INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                vendor TEXT NOT NULL,
                name TEXT NOT NULL,
                latest_version TEXT,
                last_updated INTEGER NOT NULL,
                error TEXT,
                UNIQUE(vendor, name)
            );

            CREATE TABLE IF NOT EXISTS product_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL,
                version TEXT NOT NULL,
                release_date TEXT,
                full_title TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (product_id) REFERENCES products(id),
                UNIQUE(product_id, version)
            );

            CREATE INDEX IF NOT EXISTS idx_product_versions_product_id
                ON product_versions(product_id);

            CREATE TABLE IF NOT EXISTS user_products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                accepted_version TEXT,
                accepted_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (product_id) REFERENCES products(id),
                UNIQUE(user_id, product_id)
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                message TEXT NOT NULL,
                read INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id);

            CREATE TABLE IF NOT EXISTS audit_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                user_version TEXT NOT NULL,
                added_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (product_id) REFERENCES products(id)
            );

            CREATE TABLE IF NOT EXISTS cycle_lock (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                owner TEXT NOT NULL,
                started_at INTEGER NOT NULL
            );
            "#,
        )?;

        // Apply migrations
        Self::apply_migrations(&conn)?;

        debug!("Database schema created successfully");
        Ok(())
    }

    /// Apply pending migrations based on user_version pragma
    fn apply_migrations(conn: &Connection) -> Result<(), StoreError> {
        let current_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        for (i, statements) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                for sql in *statements {
                    conn.execute(sql, [])?;
                }
                debug!("Applied migration v{}", version);
            }
        }

        let target_version = MIGRATIONS.len() as i32;
        if target_version > current_version {
            conn.pragma_update(None, "user_version", target_version)?;
            debug!("Updated schema version to v{}", target_version);
        }

        Ok(())
    }

    fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
        Ok(Product {
            id: row.get(0)?,
            vendor: row.get(1)?,
            name: row.get(2)?,
            latest_version: row.get(3)?,
            last_updated: row.get(4)?,
            error: row.get(5)?,
        })
    }

    fn user_product_from_row(row: &Row<'_>) -> rusqlite::Result<UserProduct> {
        Ok(UserProduct {
            id: row.get(0)?,
            user_id: row.get(1)?,
            product_id: row.get(2)?,
            accepted_version: row.get(3)?,
            accepted_at: row.get(4)?,
        })
    }

    fn query_product(conn: &Connection, product_id: i64) -> Result<Option<Product>, StoreError> {
        let product = conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
                [product_id],
                Self::product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    fn ensure_user_product(
        conn: &Connection,
        user_id: i64,
        product: &Product,
    ) -> Result<UserProduct, StoreError> {
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO user_products (user_id, product_id, accepted_version, accepted_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            (
                user_id,
                product.id,
                &product.latest_version,
                Self::current_timestamp_ms(),
            ),
        )?;

        if inserted > 0 {
            debug!(
                "Seeded accepted version {:?} for user {} / {} {}",
                product.latest_version, user_id, product.vendor, product.name
            );
        }

        let user_product = conn.query_row(
            r#"
            SELECT id, user_id, product_id, accepted_version, accepted_at
            FROM user_products WHERE user_id = ?1 AND product_id = ?2
            "#,
            (user_id, product.id),
            Self::user_product_from_row,
        )?;

        Ok(user_product)
    }
}

/// Another connection holding the write lock means another cycle is active
fn is_busy(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

impl Store for SqliteStore {
    fn try_start_cycle(&self, owner: &str) -> Result<bool, StoreError> {
        let now = Self::current_timestamp_ms();
        let timeout_threshold = now - CYCLE_LOCK_TIMEOUT_MS;

        let conn = self.lock_conn()?;

        // Reads never wait on a writer in WAL mode, so a live claim is
        // rejected without touching the write lock
        let holder: Option<(String, i64)> = conn
            .query_row(
                "SELECT owner, started_at FROM cycle_lock WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((holder, started_at)) = &holder {
            if *started_at >= timeout_threshold {
                debug!("Cycle lock held by {} since {}", holder, started_at);
                return Ok(false);
            }
            info!("Taking over stale cycle lock from {}", holder);
        }

        // Claim the row if it is stale, or create it if nobody holds it.
        // Only one writer can win either statement.
        let claimed = conn
            .execute(
                "UPDATE cycle_lock SET owner = ?1, started_at = ?2 WHERE id = 1 AND started_at < ?3",
                (owner, now, timeout_threshold),
            )
            .and_then(|updated| {
                if updated > 0 {
                    return Ok(true);
                }
                conn.execute(
                    "INSERT OR IGNORE INTO cycle_lock (id, owner, started_at) VALUES (1, ?1, ?2)",
                    (owner, now),
                )
                .map(|inserted| inserted > 0)
            });

        match claimed {
            Ok(claimed) => Ok(claimed),
            Err(e) if is_busy(&e) => {
                debug!("Cycle lock contended: {}", e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn finish_cycle(&self, owner: &str) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;

        conn.execute(
            "DELETE FROM cycle_lock WHERE id = 1 AND owner = ?1",
            [owner],
        )?;

        Ok(())
    }

    fn begin(&self) -> Result<(), StoreError> {
        self.lock_conn()?.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        self.lock_conn()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<(), StoreError> {
        self.lock_conn()?.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn find_product(&self, vendor: &str, name: &str) -> Result<Option<Product>, StoreError> {
        let conn = self.lock_conn()?;
        let product = conn
            .query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE vendor = ?1 AND name = ?2"),
                (vendor, name),
                Self::product_from_row,
            )
            .optional()?;
        Ok(product)
    }

    fn get_product(&self, product_id: i64) -> Result<Option<Product>, StoreError> {
        let conn = self.lock_conn()?;
        Self::query_product(&conn, product_id)
    }

    fn create_product(
        &self,
        vendor: &str,
        name: &str,
        latest_version: &str,
    ) -> Result<Product, StoreError> {
        let conn = self.lock_conn()?;

        // The UNIQUE(vendor, name) constraint makes concurrent creators converge
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO products (vendor, name, latest_version, last_updated)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            (vendor, name, latest_version, Self::current_timestamp_ms()),
        )?;

        if inserted > 0 {
            info!("Created product {} {} at {}", vendor, name, latest_version);
        }

        let product = conn.query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE vendor = ?1 AND name = ?2"),
            (vendor, name),
            Self::product_from_row,
        )?;

        Ok(product)
    }

    fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY vendor, name"
        ))?;

        let products = stmt
            .query_map([], Self::product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(products)
    }

    fn update_latest_version(&self, product_id: i64, version: &str) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        let updated = conn.execute(
            "UPDATE products SET latest_version = ?1, last_updated = ?2 WHERE id = ?3",
            (version, Self::current_timestamp_ms(), product_id),
        )?;

        if updated == 0 {
            return Err(StoreError::ProductNotFound(product_id));
        }
        Ok(())
    }

    fn set_product_error(&self, product_id: i64, error: Option<String>) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE products SET error = ?1 WHERE id = ?2",
            (error, product_id),
        )?;
        Ok(())
    }

    fn insert_product_version(
        &self,
        product_id: i64,
        entry: &NewProductVersion,
    ) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;

        // Using INSERT OR IGNORE with UNIQUE constraint on (product_id, version)
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO product_versions
                (product_id, version, release_date, full_title, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            (
                product_id,
                &entry.version,
                &entry.release_date,
                &entry.full_title,
                Self::current_timestamp_ms(),
            ),
        )?;

        Ok(inserted > 0)
    }

    fn product_versions(&self, product_id: i64) -> Result<Vec<ProductVersion>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, product_id, version, release_date, full_title, created_at
            FROM product_versions WHERE product_id = ?1 ORDER BY id
            "#,
        )?;

        let versions = stmt
            .query_map([product_id], |row| {
                Ok(ProductVersion {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    version: row.get(2)?,
                    release_date: row.get(3)?,
                    full_title: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    fn create_user(&self, username: &str, notify: bool) -> Result<User, StoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO users (username, notify) VALUES (?1, ?2)",
            (username, notify),
        )?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            notify,
        })
    }

    fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock_conn()?;
        let user = conn
            .query_row(
                "SELECT id, username, notify FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        notify: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn set_notify(&self, user_id: i64, notify: bool) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE users SET notify = ?1 WHERE id = ?2",
            (notify, user_id),
        )?;
        Ok(())
    }

    fn notify_eligible_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, username, notify FROM users WHERE notify = 1 ORDER BY id")?;

        let users = stmt
            .query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    notify: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    fn get_or_create_user_product(
        &self,
        user_id: i64,
        product: &Product,
    ) -> Result<UserProduct, StoreError> {
        let conn = self.lock_conn()?;
        Self::ensure_user_product(&conn, user_id, product)
    }

    fn apply_latest(&self, user_id: i64, product_id: i64) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;

        let product =
            Self::query_product(&conn, product_id)?.ok_or(StoreError::ProductNotFound(product_id))?;
        let user_product = Self::ensure_user_product(&conn, user_id, &product)?;

        let Some(latest) = product.latest_version.filter(|v| !v.is_empty()) else {
            return Ok(false);
        };
        if user_product.accepted_version.as_deref() == Some(latest.as_str()) {
            return Ok(false);
        }

        conn.execute(
            "UPDATE user_products SET accepted_version = ?1, accepted_at = ?2 WHERE id = ?3",
            (&latest, Self::current_timestamp_ms(), user_product.id),
        )?;

        info!(
            "User {} accepted {} {} {}",
            user_id, product.vendor, product.name, latest
        );
        Ok(true)
    }

    fn insert_notification(&self, user_id: i64, message: &str) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO notifications (user_id, message, read, created_at) VALUES (?1, ?2, 0, ?3)",
            (user_id, message, Self::current_timestamp_ms()),
        )?;
        Ok(())
    }

    fn notifications(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, message, read, created_at FROM notifications
            WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
            ORDER BY id
            "#,
        )?;

        let notifications = stmt
            .query_map((user_id, unread_only), |row| {
                Ok(Notification {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    message: row.get(2)?,
                    read: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notifications)
    }

    fn mark_notifications_read(&self, user_id: i64) -> Result<usize, StoreError> {
        let conn = self.lock_conn()?;
        let updated = conn.execute(
            "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
            [user_id],
        )?;
        Ok(updated)
    }

    fn add_audit_entry(
        &self,
        user_id: i64,
        product_id: i64,
        user_version: &str,
    ) -> Result<AuditEntry, StoreError> {
        let conn = self.lock_conn()?;
        if Self::query_product(&conn, product_id)?.is_none() {
            return Err(StoreError::ProductNotFound(product_id));
        }

        let added_at = Self::current_timestamp_ms();
        conn.execute(
            r#"
            INSERT INTO audit_entries (user_id, product_id, user_version, added_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            (user_id, product_id, user_version, added_at),
        )?;

        Ok(AuditEntry {
            id: conn.last_insert_rowid(),
            user_id,
            product_id,
            user_version: user_version.to_string(),
            added_at,
        })
    }

    fn audit_entries(&self, user_id: i64) -> Result<Vec<AuditEntry>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, product_id, user_version, added_at
            FROM audit_entries WHERE user_id = ?1 ORDER BY id
            "#,
        )?;

        let entries = stmt
            .query_map([user_id], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    product_id: row.get(2)?,
                    user_version: row.get(3)?,
                    added_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn clear_audit(&self, user_id: i64) -> Result<usize, StoreError> {
        let conn = self.lock_conn()?;
        let deleted = conn.execute("DELETE FROM audit_entries WHERE user_id = ?1", [user_id])?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteStore) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let store = SqliteStore::new(&db_path).unwrap();
        (temp_dir, store)
    }

    fn new_version(version: &str) -> NewProductVersion {
        NewProductVersion {
            version: version.to_string(),
            release_date: Some("2024-01-01".to_string()),
            full_title: None,
        }
    }

    #[test]
    fn create_product_returns_existing_row_for_same_vendor_and_name() {
        let (_temp_dir, store) = create_test_store();

        let first = store.create_product("Kaspersky", "Antivirus", "4.2").unwrap();
        let second = store.create_product("Kaspersky", "Antivirus", "5.0").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.latest_version.as_deref(), Some("4.2"));
        assert_eq!(store.list_products().unwrap().len(), 1);
    }

    #[test]
    fn find_product_returns_none_for_unknown_product() {
        let (_temp_dir, store) = create_test_store();

        assert_eq!(store.find_product("Kaspersky", "Unknown").unwrap(), None);
    }

    #[test]
    fn insert_product_version_deduplicates_by_raw_text() {
        let (_temp_dir, store) = create_test_store();
        let product = store.create_product("Kaspersky", "Antivirus", "4.2").unwrap();

        assert!(store.insert_product_version(product.id, &new_version("4.2")).unwrap());
        assert!(!store.insert_product_version(product.id, &new_version("4.2")).unwrap());
        // Numerically equal but textually distinct strings are separate history rows
        assert!(store.insert_product_version(product.id, &new_version("4.2.0")).unwrap());

        let history: Vec<_> = store
            .product_versions(product.id)
            .unwrap()
            .into_iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(history, vec!["4.2", "4.2.0"]);
    }

    #[test]
    fn update_latest_version_fails_for_missing_product() {
        let (_temp_dir, store) = create_test_store();

        assert!(matches!(
            store.update_latest_version(42, "1.0"),
            Err(StoreError::ProductNotFound(42))
        ));
    }

    #[test]
    fn set_product_error_sets_and_clears_note() {
        let (_temp_dir, store) = create_test_store();
        let product = store.create_product("Код Безопасности", "Continent", "4.1").unwrap();

        store
            .set_product_error(product.id, Some("Malformed version".to_string()))
            .unwrap();
        let stored = store.get_product(product.id).unwrap().unwrap();
        assert_eq!(stored.error.as_deref(), Some("Malformed version"));

        store.set_product_error(product.id, None).unwrap();
        let stored = store.get_product(product.id).unwrap().unwrap();
        assert_eq!(stored.error, None);
    }

    #[test]
    fn notify_eligible_users_excludes_opted_out_users() {
        let (_temp_dir, store) = create_test_store();
        let alice = store.create_user("alice", true).unwrap();
        let bob = store.create_user("bob", false).unwrap();
        let carol = store.create_user("carol", true).unwrap();

        store.set_notify(carol.id, false).unwrap();
        store.set_notify(bob.id, true).unwrap();

        let names: Vec<_> = store
            .notify_eligible_users()
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(store.find_user("alice").unwrap(), Some(alice));
    }

    #[test]
    fn get_or_create_user_product_seeds_latest_version_once() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("alice", true).unwrap();
        let product = store.create_product("Kaspersky", "Antivirus", "4.2").unwrap();

        let first = store.get_or_create_user_product(user.id, &product).unwrap();
        assert_eq!(first.accepted_version.as_deref(), Some("4.2"));

        store.update_latest_version(product.id, "4.3").unwrap();
        let product = store.get_product(product.id).unwrap().unwrap();
        let second = store.get_or_create_user_product(user.id, &product).unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.accepted_version.as_deref(), Some("4.2"));
    }

    #[test]
    fn apply_latest_accepts_new_version_only_once() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("alice", true).unwrap();
        let product = store.create_product("Kaspersky", "Antivirus", "4.2").unwrap();
        store.get_or_create_user_product(user.id, &product).unwrap();
        store.update_latest_version(product.id, "4.3").unwrap();

        assert!(store.apply_latest(user.id, product.id).unwrap());
        assert!(!store.apply_latest(user.id, product.id).unwrap());

        let product = store.get_product(product.id).unwrap().unwrap();
        let state = store.get_or_create_user_product(user.id, &product).unwrap();
        assert_eq!(state.accepted_version.as_deref(), Some("4.3"));
    }

    #[test]
    fn notifications_can_be_marked_read() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("alice", true).unwrap();

        store.insert_notification(user.id, "first").unwrap();
        store.insert_notification(user.id, "second").unwrap();
        assert_eq!(store.notifications(user.id, true).unwrap().len(), 2);

        assert_eq!(store.mark_notifications_read(user.id).unwrap(), 2);
        assert!(store.notifications(user.id, true).unwrap().is_empty());

        let all = store.notifications(user.id, false).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|n| n.read));
    }

    #[test]
    fn rollback_discards_changes_made_inside_transaction() {
        let (_temp_dir, store) = create_test_store();

        store.begin().unwrap();
        store.create_product("Kaspersky", "Antivirus", "4.2").unwrap();
        store.rollback().unwrap();

        assert!(store.list_products().unwrap().is_empty());

        store.begin().unwrap();
        store.create_product("Kaspersky", "Antivirus", "4.2").unwrap();
        store.commit().unwrap();

        assert_eq!(store.list_products().unwrap().len(), 1);
    }

    #[test]
    fn audit_entries_require_existing_product() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("alice", true).unwrap();
        let product = store.create_product("UserGate 7.x", "NGFW", "7.1").unwrap();

        store.add_audit_entry(user.id, product.id, "7.0.3").unwrap();
        assert!(matches!(
            store.add_audit_entry(user.id, 999, "1.0"),
            Err(StoreError::ProductNotFound(999))
        ));

        assert_eq!(store.audit_entries(user.id).unwrap().len(), 1);
        assert_eq!(store.clear_audit(user.id).unwrap(), 1);
        assert!(store.audit_entries(user.id).unwrap().is_empty());
    }

    #[test]
    fn cycle_lock_admits_one_owner_until_released() {
        let (_temp_dir, store) = create_test_store();

        assert!(store.try_start_cycle("scheduler").unwrap());
        assert!(!store.try_start_cycle("manual").unwrap());

        // Only the holder can release it
        store.finish_cycle("manual").unwrap();
        assert!(!store.try_start_cycle("manual").unwrap());

        store.finish_cycle("scheduler").unwrap();
        assert!(store.try_start_cycle("manual").unwrap());
    }

    #[test]
    fn cycle_lock_is_shared_between_connections_to_one_file() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let first = SqliteStore::new(&db_path).unwrap();
        let second = SqliteStore::new(&db_path).unwrap();

        assert!(first.try_start_cycle("first").unwrap());
        assert!(!second.try_start_cycle("second").unwrap());

        first.finish_cycle("first").unwrap();
        assert!(second.try_start_cycle("second").unwrap());
    }

    #[test]
    fn cycle_lock_is_rejected_while_another_connection_writes() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let writer = SqliteStore::new(&db_path).unwrap();
        let other = SqliteStore::new(&db_path).unwrap();
        other
            .lock_conn()
            .unwrap()
            .busy_timeout(std::time::Duration::from_millis(50))
            .unwrap();

        writer.begin().unwrap();
        assert!(!other.try_start_cycle("other").unwrap());
        writer.rollback().unwrap();

        assert!(other.try_start_cycle("other").unwrap());
    }

    #[test]
    fn stale_cycle_lock_is_taken_over() {
        let (_temp_dir, store) = create_test_store();
        assert!(store.try_start_cycle("crashed").unwrap());

        let stale = SqliteStore::current_timestamp_ms() - CYCLE_LOCK_TIMEOUT_MS - 1;
        store
            .lock_conn()
            .unwrap()
            .execute("UPDATE cycle_lock SET started_at = ?1", [stale])
            .unwrap();

        assert!(store.try_start_cycle("fresh").unwrap());
        assert!(!store.try_start_cycle("crashed").unwrap());

        // The crashed owner finishing late does not release the new claim
        store.finish_cycle("crashed").unwrap();
        assert!(!store.try_start_cycle("other").unwrap());
    }

    #[test]
    fn base_schema_carries_every_column() {
        let (_temp_dir, store) = create_test_store();
        let user = store.create_user("alice", true).unwrap();
        store.insert_notification(user.id, "hello").unwrap();

        let notification = &store.notifications(user.id, false).unwrap()[0];
        assert!(notification.created_at > 0);

        let product = store.create_product("Kaspersky", "Antivirus", "4.2").unwrap();
        assert_eq!(product.error, None);
    }

    #[test]
    fn reopening_database_keeps_schema_version() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let store = SqliteStore::new(&db_path).unwrap();
            store.create_product("Kaspersky", "Antivirus", "4.2").unwrap();
        }

        let store = SqliteStore::new(&db_path).unwrap();
        let conn = store.lock_conn().unwrap();
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i32);
    }
}
