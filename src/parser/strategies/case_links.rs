use super::{case_number_in, element_text, href, is_document_href, PageContext, Strategy, LINK};
use crate::opinion::Opinion;
use crate::parser::record::RawFields;

/// Any link whose visible text names a case.
pub struct CaseLinkStrategy;

impl Strategy for CaseLinkStrategy {
    fn name(&self) -> &'static str {
        "case_links"
    }

    fn extract(&self, page: &PageContext) -> Vec<Opinion> {
        page.doc
            .select(&LINK)
            .filter_map(|a| {
                let text = element_text(a);
                let case_number = case_number_in(&text)?;
                let target = href(a).to_string();
                let mut raw = RawFields {
                    case_number,
                    case_name: text,
                    ..Default::default()
                };
                if is_document_href(&target) {
                    raw.pdf_href = target;
                } else {
                    raw.page_href = target;
                }
                page.build(raw)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::strategies::fixture;

    #[test]
    fn links_naming_cases() {
        let html = r#"<nav><a href="/help">Help</a></nav>
            <a href="/docket/4D2024-0012">Jones v. State (4D2024-0012)</a>
            <a href="/get/2024-0013.PDF">2024-0013</a>"#;
        let out = fixture::run(&CaseLinkStrategy, html);
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].case_number, "2024-0012");
        assert_eq!(out[0].page_url, "https://1dca.flcourts.gov/docket/4D2024-0012");
        assert!(out[0].pdf_url.is_empty());
        assert_eq!(out[0].date, fixture::now());

        assert_eq!(out[1].pdf_url, "https://1dca.flcourts.gov/get/2024-0013.PDF");
        assert_eq!(out[1].page_url, fixture::PAGE_URL);
        assert_eq!(out[1].case_name, "2024-0013");
    }
}
