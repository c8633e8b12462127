use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;
use tracing::debug;

use super::{case_number_in, element_text, find_date, href, PageContext, Strategy, LINK};
use crate::opinion::{truncate_chars, Opinion};
use crate::parser::record::RawFields;

static OPINION_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\.pdf|/download/|opinion|download)").unwrap());

const NAME_ANCESTORS: usize = 3;
const DATE_ANCESTORS: usize = 6;
const NAME_CAP: usize = 300;

/// Links that point at opinion documents, dated from their surroundings.
pub struct DocumentLinkStrategy;

impl Strategy for DocumentLinkStrategy {
    fn name(&self) -> &'static str {
        "document_links"
    }

    fn extract(&self, page: &PageContext) -> Vec<Opinion> {
        page.doc
            .select(&LINK)
            .filter(|a| OPINION_HREF_RE.is_match(href(*a)))
            .filter_map(|a| parse_link(a, page))
            .collect()
    }
}

fn parse_link(link: ElementRef, page: &PageContext) -> Option<Opinion> {
    let target = href(link);
    let text = element_text(link);
    let Some(case_number) = case_number_in(target).or_else(|| case_number_in(&text)) else {
        debug!(href = target, "Document link without a case number");
        return None;
    };

    let case_name = if !text.is_empty() && text != case_number {
        text
    } else {
        context_name(link, &case_number).unwrap_or_default()
    };

    let date = link
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(DATE_ANCESTORS)
        .find_map(|el| find_date(&element_text(el)));

    page.build(RawFields {
        case_number,
        case_name,
        date,
        pdf_href: target.to_string(),
        ..Default::default()
    })
}

/// First close ancestor carrying noticeably more text than the bare case number.
fn context_name(link: ElementRef, case_number: &str) -> Option<String> {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .take(NAME_ANCESTORS)
        .map(element_text)
        .find(|t| t.chars().count() > case_number.chars().count() + 5)
        .map(|t| truncate_chars(&t, NAME_CAP))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::strategies::fixture::{self, day};

    #[test]
    fn pdf_links_with_nearby_dates() {
        let html = r#"<div>
            <p>Released 01/16/2024</p>
            <p><span>Smith v. State</span> <a href="/content/download/2024-0101.pdf">2024-0101</a></p>
        </div>
        <div>
            <p><a href="https://cdn.flcourts.gov/opinions/doe.pdf">Doe v. Roe, SC2024-0012</a> January 12, 2024</p>
        </div>"#;
        let out = fixture::run(&DocumentLinkStrategy, html);
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].case_number, "2024-0101");
        assert_eq!(out[0].case_name, "Smith v. State 2024-0101");
        assert_eq!(out[0].date, day(2024, 1, 16));
        assert_eq!(out[0].pdf_url, "https://1dca.flcourts.gov/content/download/2024-0101.pdf");

        assert_eq!(out[1].case_number, "SC2024-0012");
        assert_eq!(out[1].case_name, "Doe v. Roe, SC2024-0012");
        assert_eq!(out[1].date, day(2024, 1, 12));
    }

    #[test]
    fn links_without_case_numbers_are_dropped() {
        let html = r#"<a href="/opinions/archive.pdf">Opinion archive</a>
                      <a href="/about">About 2024-0001</a>"#;
        assert!(fixture::run(&DocumentLinkStrategy, html).is_empty());
    }

    #[test]
    fn undated_link_falls_back_to_now() {
        let html = r#"<p><a href="/download/3D2024-0077">Read opinion 3D2024-0077</a></p>"#;
        let out = fixture::run(&DocumentLinkStrategy, html);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].case_number, "2024-0077");
        assert_eq!(out[0].date, fixture::now());
    }
}
