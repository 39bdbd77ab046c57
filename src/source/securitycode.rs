//! Security Code product lifecycle table

use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::source::error::FetchError;
use crate::source::html::{selector, stripped_text};
use crate::source::http::PageClient;
use crate::source::{Candidates, SourceAdapter, SourceEntry, SourceKind, reduce_to_latest};

static CONTAINER: LazyLock<Selector> = LazyLock::new(|| {
    selector("body > div.container > div.inside-container > div > div:nth-child(5)")
});
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr.common-table__row-non-rwd"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td.common-table__cell-non-rwd"));

pub struct SecurityCodeAdapter {
    client: PageClient,
    url: String,
}

impl SecurityCodeAdapter {
    pub fn new(client: PageClient, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for SecurityCodeAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::SecurityCode
    }

    async fn fetch(&self) -> Result<Candidates, FetchError> {
        let body = self.client.get_text(&self.url).await?;
        let entries = parse_lifecycle_page(&body)?;
        Ok(reduce_to_latest(entries, self.kind().scheme()))
    }
}

/// Read (product, version, release date) from each table row with three cells
pub fn parse_lifecycle_page(body: &str) -> Result<Vec<SourceEntry>, FetchError> {
    let document = Html::parse_document(body);

    let container = document.select(&CONTAINER).next().ok_or_else(|| {
        FetchError::UnexpectedStructure("lifecycle table container not found".to_string())
    })?;

    let entries = container
        .select(&ROW)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&CELL).map(stripped_text).collect();
            match cells.as_slice() {
                [name, version, date, ..] => Some(SourceEntry::new(name, version, Some(date))),
                _ => None,
            }
        })
        .collect();

    Ok(entries)
}
