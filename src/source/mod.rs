//! Vendor lifecycle sources
//!
//! Each [`SourceAdapter`] fetches one vendor page and returns at most one
//! candidate version per product name. Vendor-specific markup lives in the
//! adapter modules; the reduction to a single candidate is shared.
//!
//! - [`kaspersky`]: Kaspersky corporate lifecycle table
//! - [`usergate`]: UserGate NGFW / Management Center release notes (6.x and 7.x)
//! - [`securitycode`]: Security Code product lifecycle table
//! - [`http`]: shared HTTP page client

#[cfg(test)]
use mockall::automock;

use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::version::VersionScheme;

pub mod error;
pub mod html;
pub mod http;
pub mod kaspersky;
pub mod securitycode;
pub mod usergate;

pub use error::FetchError;
pub use http::PageClient;
pub use kaspersky::KasperskyAdapter;
pub use securitycode::SecurityCodeAdapter;
pub use usergate::UserGateAdapter;

/// Version markers vendors print when a product has no release
const PLACEHOLDER_VERSIONS: &[&str] = &["", "—", "–", "-"];

/// Vendor page tracked by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Kaspersky,
    UserGateNgfw7,
    UserGateManagementCenter7,
    UserGateNgfw6,
    UserGateManagementCenter6,
    SecurityCode,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Kaspersky,
        SourceKind::UserGateNgfw7,
        SourceKind::UserGateManagementCenter7,
        SourceKind::UserGateNgfw6,
        SourceKind::UserGateManagementCenter6,
        SourceKind::SecurityCode,
    ];

    /// Returns the stable identifier used in config and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Kaspersky => "kaspersky",
            SourceKind::UserGateNgfw7 => "usergate_ngfw_7",
            SourceKind::UserGateManagementCenter7 => "usergate_mc_7",
            SourceKind::UserGateNgfw6 => "usergate_ngfw_6",
            SourceKind::UserGateManagementCenter6 => "usergate_mc_6",
            SourceKind::SecurityCode => "securitycode",
        }
    }

    /// Vendor label stored on products
    pub fn vendor(&self) -> &'static str {
        match self {
            SourceKind::Kaspersky => "Kaspersky",
            SourceKind::UserGateNgfw7 | SourceKind::UserGateManagementCenter7 => "UserGate 7.x",
            SourceKind::UserGateNgfw6 | SourceKind::UserGateManagementCenter6 => "UserGate 6.x",
            SourceKind::SecurityCode => "Код Безопасности",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            SourceKind::Kaspersky => {
                "https://support.kaspersky.ru/corporate/lifecycle?type=limited,full&view=table"
            }
            SourceKind::UserGateNgfw7 => "https://docs.usergate.com/izmeneniya-v-ngfw-7-243/",
            SourceKind::UserGateManagementCenter7 => {
                "https://docs.usergate.com/izmeneniya-v-usergate-management-center-7-247/"
            }
            SourceKind::UserGateNgfw6 => "https://docs.usergate.com/izmeneniya-v-ngfw-6-240/",
            SourceKind::UserGateManagementCenter6 => {
                "https://docs.usergate.com/izmeneniya-v-usergate-management-center-6-241/"
            }
            SourceKind::SecurityCode => "https://www.securitycode.ru/products/lifecycle/",
        }
    }

    /// How this vendor's version text is compared
    pub fn scheme(&self) -> VersionScheme {
        match self {
            SourceKind::UserGateNgfw7 | SourceKind::UserGateNgfw6 => VersionScheme::BuildNumber,
            _ => VersionScheme::Dotted,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown source: {s}"))
    }
}

/// One (product, version, release date) row read from a vendor page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub product_name: String,
    pub version: String,
    pub release_date: Option<String>,
}

impl SourceEntry {
    pub fn new(product_name: &str, version: &str, release_date: Option<&str>) -> Self {
        Self {
            product_name: product_name.to_string(),
            version: version.to_string(),
            release_date: release_date.map(str::to_string),
        }
    }
}

/// The single version a source reports for a product in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub version: String,
    pub release_date: Option<String>,
}

/// Product name -> candidate, in page order
pub type Candidates = IndexMap<String, Candidate>;

/// Trait for fetching candidate versions from a vendor page
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Returns the source this adapter reads
    fn kind(&self) -> SourceKind;

    /// Fetches the page and returns the highest version per product name
    async fn fetch(&self) -> Result<Candidates, FetchError>;
}

/// Keep the highest entry per product name.
///
/// Placeholder versions are dropped. An entry that does not parse never
/// replaces one that does; a product whose entries are all malformed keeps its
/// first entry so the engine can record the failure.
pub fn reduce_to_latest<I>(entries: I, scheme: VersionScheme) -> Candidates
where
    I: IntoIterator<Item = SourceEntry>,
{
    let mut latest = Candidates::new();

    for entry in entries {
        let version = entry.version.trim();
        if PLACEHOLDER_VERSIONS.contains(&version) {
            debug!("Skipping placeholder version for {}", entry.product_name);
            continue;
        }

        let parsed = scheme.parse(version);
        if let Err(e) = &parsed {
            warn!("{} for {}", e, entry.product_name);
        }

        let candidate = Candidate {
            version: version.to_string(),
            release_date: entry
                .release_date
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        };

        match latest.entry(entry.product_name) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                let replace = match (parsed, scheme.parse(&slot.get().version)) {
                    (Ok(new), Ok(current)) => new.numeric > current.numeric,
                    (Ok(_), Err(_)) => true,
                    (Err(_), _) => false,
                };
                if replace {
                    slot.insert(candidate);
                }
            }
        }
    }

    latest
}

/// Scheme of the source that reports `vendor`/`name`, dotted when unknown
pub fn scheme_for_product(vendor: &str, name: &str) -> VersionScheme {
    SourceKind::ALL
        .into_iter()
        .find(|kind| {
            kind.vendor() == vendor && usergate::product_name(*kind).is_none_or(|p| p == name)
        })
        .map(|kind| kind.scheme())
        .unwrap_or(VersionScheme::Dotted)
}

/// Build the adapters enabled in `config`, sharing one HTTP client.
pub fn build_adapters(config: &AppConfig) -> Result<Vec<Arc<dyn SourceAdapter>>, FetchError> {
    let client = PageClient::new(&config.fetch)?;

    let adapters = SourceKind::ALL
        .into_iter()
        .filter(|kind| config.sources.get(*kind).enabled)
        .map(|kind| {
            let url = config
                .sources
                .get(kind)
                .url
                .clone()
                .unwrap_or_else(|| kind.default_url().to_string());
            let adapter: Arc<dyn SourceAdapter> = match kind {
                SourceKind::Kaspersky => Arc::new(KasperskyAdapter::new(client.clone(), &url)),
                SourceKind::SecurityCode => {
                    Arc::new(SecurityCodeAdapter::new(client.clone(), &url))
                }
                _ => Arc::new(UserGateAdapter::new(kind, client.clone(), &url)),
            };
            adapter
        })
        .collect();

    Ok(adapters)
}
