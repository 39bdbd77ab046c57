//! Kaspersky corporate product lifecycle table
//!
//! The page renders a gantt list; each item carries a title, a version and a
//! set of extra-info rows, one of which is the release ("Релиз") date.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::source::error::FetchError;
use crate::source::html::{first_text, selector};
use crate::source::http::PageClient;
use crate::source::{Candidates, SourceAdapter, SourceEntry, SourceKind, reduce_to_latest};

const RELEASE_LABEL: &str = "Релиз";

static ITEM: LazyLock<Selector> = LazyLock::new(|| {
    selector("div.product-gantt__list-items > div.product-gantt__list-item")
});
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector("div.product-gantt__list-item-title"));
static VERSION: LazyLock<Selector> =
    LazyLock::new(|| selector("div.product-gantt__list-item-version"));
static INFO_ITEM: LazyLock<Selector> =
    LazyLock::new(|| selector("div.product-gantt__extra-info-item"));
static INFO_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector("div.product-gantt__extra-info-title"));
static INFO_VALUE: LazyLock<Selector> =
    LazyLock::new(|| selector("div.product-gantt__extra-info-value"));

pub struct KasperskyAdapter {
    client: PageClient,
    url: String,
}

impl KasperskyAdapter {
    pub fn new(client: PageClient, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for KasperskyAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Kaspersky
    }

    async fn fetch(&self) -> Result<Candidates, FetchError> {
        let body = self.client.get_text(&self.url).await?;
        let entries = parse_lifecycle_page(&body)?;
        Ok(reduce_to_latest(entries, self.kind().scheme()))
    }
}

/// Extract every (title, version, release date) item from the lifecycle page
pub fn parse_lifecycle_page(body: &str) -> Result<Vec<SourceEntry>, FetchError> {
    let document = Html::parse_document(body);

    let items: Vec<_> = document.select(&ITEM).collect();
    if items.is_empty() {
        return Err(FetchError::UnexpectedStructure(
            "no product-gantt list items".to_string(),
        ));
    }

    let entries = items
        .into_iter()
        .filter_map(|item| {
            let title = first_text(item, &TITLE)?;
            let version = first_text(item, &VERSION)?;

            let release_date = item.select(&INFO_ITEM).find_map(|info| {
                let label = first_text(info, &INFO_TITLE)?;
                if label.contains(RELEASE_LABEL) {
                    first_text(info, &INFO_VALUE)
                } else {
                    None
                }
            });

            Some(SourceEntry {
                product_name: title,
                version,
                release_date,
            })
        })
        .collect();

    Ok(entries)
}
