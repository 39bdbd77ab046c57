//! Small helpers over `scraper` shared by the adapters

use scraper::{ElementRef, Selector};

/// Parse a selector that is known to be valid at compile time
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e}"))
}

/// Text content with every text node trimmed and concatenated
pub(crate) fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// Stripped text of the first descendant matching `selector`
pub(crate) fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().map(stripped_text)
}
