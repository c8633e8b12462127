use std::collections::BTreeSet;

use tracing::{info, warn};

use super::{collapse_whitespace, PageContext, Strategy, CASE_NUMBER_RE};
use crate::opinion::Opinion;

/// Last resort. Never yields candidates; only reports whether case numbers
/// were visible on a page none of the structured strategies understood.
pub struct TextScanStrategy;

impl Strategy for TextScanStrategy {
    fn name(&self) -> &'static str {
        "text_scan"
    }

    fn extract(&self, page: &PageContext) -> Vec<Opinion> {
        let found = case_tokens(&page.doc.root_element().text().collect::<Vec<_>>().join(" "));
        if found.is_empty() {
            warn!(page = page.record.page_url, "No case numbers found on page");
        } else {
            info!(
                page = page.record.page_url,
                "Found {} case numbers in page text but couldn't extract structured data",
                found.len()
            );
        }
        Vec::new()
    }
}

/// Distinct case-number tokens, sorted.
pub fn case_tokens(text: &str) -> BTreeSet<String> {
    CASE_NUMBER_RE
        .find_iter(&collapse_whitespace(text))
        .map(|m| m.as_str().to_string())
        .collect()
}
