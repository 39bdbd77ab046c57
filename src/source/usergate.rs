//! UserGate release notes (NGFW and Management Center, 6.x and 7.x)
//!
//! Each release is a `<skip-glossary>` heading holding the full release title
//! (e.g. "UserGate NGFW 7.1.0 build 7.1.0.1400"), followed by a `textBlock`
//! with its status. Only stable ("Стабильно") releases are considered. The
//! full heading text is kept as the raw version.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;

use crate::source::error::FetchError;
use crate::source::html::{selector, stripped_text};
use crate::source::http::PageClient;
use crate::source::{Candidates, SourceAdapter, SourceEntry, SourceKind, reduce_to_latest};

const STABLE_MARKER: &str = "Стабильно";

static HEADING_OR_STATUS: LazyLock<Selector> =
    LazyLock::new(|| selector("skip-glossary, div.textBlock"));

pub struct UserGateAdapter {
    kind: SourceKind,
    client: PageClient,
    url: String,
}

impl UserGateAdapter {
    /// `kind` must be one of the four UserGate sources
    pub fn new(kind: SourceKind, client: PageClient, url: &str) -> Self {
        debug_assert!(product_name(kind).is_some(), "{kind} is not a UserGate source");
        Self {
            kind,
            client,
            url: url.to_string(),
        }
    }
}

/// Product name a UserGate source reports under
pub fn product_name(kind: SourceKind) -> Option<&'static str> {
    match kind {
        SourceKind::UserGateNgfw7 | SourceKind::UserGateNgfw6 => Some("NGFW"),
        SourceKind::UserGateManagementCenter7 | SourceKind::UserGateManagementCenter6 => {
            Some("Management Center")
        }
        _ => None,
    }
}

#[async_trait::async_trait]
impl SourceAdapter for UserGateAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self) -> Result<Candidates, FetchError> {
        let product = product_name(self.kind).ok_or_else(|| {
            FetchError::UnexpectedStructure(format!("{} has no UserGate product", self.kind))
        })?;

        let body = self.client.get_text(&self.url).await?;
        let entries = parse_stable_releases(&body, product);
        debug!("{}: {} stable releases", self.kind, entries.len());

        Ok(reduce_to_latest(entries, self.kind.scheme()))
    }
}

/// Collect stable releases, pairing each heading with the next status block
pub fn parse_stable_releases(body: &str, product: &str) -> Vec<SourceEntry> {
    let document = Html::parse_document(body);

    let mut pending: Vec<String> = Vec::new();
    let mut entries = Vec::new();

    for element in document.select(&HEADING_OR_STATUS) {
        if element.value().name() == "skip-glossary" {
            pending.push(stripped_text(element));
            continue;
        }

        let status = stripped_text(element);
        for title in pending.drain(..) {
            if status.contains(STABLE_MARKER) {
                entries.push(SourceEntry::new(product, &title, None));
            }
        }
    }

    entries
}
