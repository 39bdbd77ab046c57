//! Store and configuration builders

use std::sync::Arc;

use tempfile::TempDir;

use release_watch::config::{AppConfig, SourceConfig, SourcesConfig};
use release_watch::source::SourceKind;
use release_watch::store::SqliteStore;

/// Create an empty store in a temporary directory
pub fn create_test_store() -> (TempDir, Arc<SqliteStore>) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let store = SqliteStore::new(&db_path).unwrap();
    (temp_dir, Arc::new(store))
}

/// Mock server path serving `kind`'s page
pub fn source_path(kind: SourceKind) -> String {
    format!("/{}", kind.as_str())
}

/// Configuration pointing every source at `base_url`
pub fn config_for(base_url: &str) -> AppConfig {
    let source = |kind: SourceKind| SourceConfig {
        enabled: true,
        url: Some(format!("{}{}", base_url, source_path(kind))),
    };

    AppConfig {
        sources: SourcesConfig {
            kaspersky: source(SourceKind::Kaspersky),
            usergate_ngfw_7: source(SourceKind::UserGateNgfw7),
            usergate_mc_7: source(SourceKind::UserGateManagementCenter7),
            usergate_ngfw_6: source(SourceKind::UserGateNgfw6),
            usergate_mc_6: source(SourceKind::UserGateManagementCenter6),
            security_code: source(SourceKind::SecurityCode),
        },
        ..AppConfig::default()
    }
}
