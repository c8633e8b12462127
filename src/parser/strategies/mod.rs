pub mod case_links;
pub mod containers;
pub mod document_links;
pub mod table;
pub mod text_scan;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::dates;
use super::record::{self, RawFields, RecordContext};
use crate::opinion::Opinion;

/// `SC####-#+` (Supreme Court) or `####-##..#####` (district courts).
pub static CASE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(SC\d{4}-\d+|\d{4}-\d{2,5})").unwrap());

static DATE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}/\d{1,2}/\d{2,4}|\w+ \d{1,2},? \d{4}|\d{4}-\d{2}-\d{2})").unwrap()
});

static DOCUMENT_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\.pdf|download)").unwrap());

pub(crate) static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// One parsed listing page plus what every candidate on it shares.
pub struct PageContext<'a> {
    pub doc: &'a Html,
    pub record: RecordContext<'a>,
}

impl PageContext<'_> {
    pub fn build(&self, raw: RawFields) -> Option<Opinion> {
        record::build(raw, &self.record)
    }
}

/// One extraction heuristic. An empty result means "try the next one".
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, page: &PageContext) -> Vec<Opinion>;
}

/// The cascade order: most structured first, text scan last.
pub fn standard() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(table::TableStrategy),
        Box::new(document_links::DocumentLinkStrategy),
        Box::new(containers::ContainerStrategy),
        Box::new(case_links::CaseLinkStrategy),
        Box::new(text_scan::TextScanStrategy),
    ]
}

pub fn case_number_in(text: &str) -> Option<String> {
    CASE_NUMBER_RE.find(text).map(|m| m.as_str().to_string())
}

/// First date-shaped token in `text` that actually parses.
pub fn find_date(text: &str) -> Option<String> {
    DATE_TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|s| dates::parse(s).is_some())
        .map(str::to_string)
}

pub fn is_document_href(href: &str) -> bool {
    DOCUMENT_HREF_RE.is_match(href)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All text under `el`, whitespace-collapsed.
pub fn element_text(el: ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

pub fn href<'a>(el: ElementRef<'a>) -> &'a str {
    el.value().attr("href").unwrap_or("")
}
