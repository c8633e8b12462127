use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{case_number_in, element_text, find_date, href, is_document_href, PageContext, Strategy, LINK};
use crate::opinion::{truncate_chars, Opinion};
use crate::parser::record::RawFields;

static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[class], article[class], section[class], li[class]").unwrap());

const CLASS_KEYWORDS: &[&str] = &[
    "opinion", "case", "result", "item", "entry", "row", "record", "search", "view", "content",
    "field",
];

const NAME_CAP: usize = 300;

/// Cards and list items whose class names suggest an opinion listing.
pub struct ContainerStrategy;

impl Strategy for ContainerStrategy {
    fn name(&self) -> &'static str {
        "containers"
    }

    fn extract(&self, page: &PageContext) -> Vec<Opinion> {
        page.doc
            .select(&CONTAINER)
            .filter(|el| is_tagged(*el))
            .filter_map(|el| parse_container(el, page))
            .collect()
    }
}

fn is_tagged(el: ElementRef) -> bool {
    let class = el.value().attr("class").unwrap_or("").to_lowercase();
    CLASS_KEYWORDS.iter().any(|k| class.contains(k))
}

fn parse_container(el: ElementRef, page: &PageContext) -> Option<Opinion> {
    let text = element_text(el);
    let case_number = case_number_in(&text)?;
    let pdf_href = el
        .select(&LINK)
        .map(href)
        .find(|h| is_document_href(h))
        .unwrap_or("")
        .to_string();

    page.build(RawFields {
        case_number,
        case_name: truncate_chars(&text, NAME_CAP),
        date: find_date(&text),
        pdf_href,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::strategies::fixture::{self, day};

    #[test]
    fn tagged_cards_become_candidates() {
        let html = r#"
            <div class="views-row">
              <span>2D2024-0150</span> <span>Allen v. State</span> <span>01/17/2024</span>
              <a href="/files/2024-0150.pdf">Download</a>
            </div>
            <div class="sidebar">Contact the clerk about 2024-9999</div>
        "#;
        let out = fixture::run(&ContainerStrategy, html);
        assert_eq!(out.len(), 1);
        let o = &out[0];
        assert_eq!(o.case_number, "2024-0150");
        assert_eq!(o.case_name, "2D2024-0150 Allen v. State 01/17/2024 Download");
        assert_eq!(o.date, day(2024, 1, 17));
        assert_eq!(o.pdf_url, "https://1dca.flcourts.gov/files/2024-0150.pdf");
    }

    #[test]
    fn long_text_is_capped_and_caseless_cards_skipped() {
        let filler = "word ".repeat(200);
        let html = format!(
            r#"<article class="opinion">SC2024-0001 {filler}</article>
               <li class="search-result">Nothing to see here</li>"#
        );
        let out = fixture::run(&ContainerStrategy, &html);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].case_name.chars().count(), NAME_CAP);
        assert!(out[0].pdf_url.is_empty());
    }
}
