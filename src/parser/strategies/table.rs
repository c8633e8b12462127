use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use tracing::debug;

use super::{case_number_in, element_text, href, is_document_href, PageContext, Strategy, LINK};
use crate::opinion::Opinion;
use crate::parser::record::RawFields;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    CaseNumber,
    CaseName,
    Date,
    OpinionType,
    LowerTribunal,
}

/// Rows of `<table>` elements, with or without a header row.
pub struct TableStrategy;

impl Strategy for TableStrategy {
    fn name(&self) -> &'static str {
        "table"
    }

    fn extract(&self, page: &PageContext) -> Vec<Opinion> {
        let mut out = Vec::new();
        for table in page.doc.select(&TABLE) {
            let mut columns: Option<HashMap<Column, usize>> = None;
            for row in table.select(&ROW) {
                let cells: Vec<ElementRef> = row.select(&CELL).collect();
                if row.select(&HEADER_CELL).next().is_some() {
                    let headers: Vec<String> = cells.iter().map(|c| element_text(*c)).collect();
                    columns = Some(column_map(&headers));
                    continue;
                }
                if cells.len() < 2 {
                    continue;
                }
                match parse_row(&cells, columns.as_ref(), page) {
                    Some(o) => out.push(o),
                    None => debug!("Skipping table row without a case number"),
                }
            }
        }
        out
    }
}

fn classify(header: &str) -> Option<Column> {
    let h = header.to_lowercase();
    let has = |needle: &str| h.contains(needle);
    if (has("case") && (has("number") || has("no.") || h.ends_with(" no") || has("#"))) || has("docket") {
        Some(Column::CaseNumber)
    } else if (has("case") && has("name")) || has("style") || has("caption") || has("title") {
        Some(Column::CaseName)
    } else if ["date", "disposition", "filed", "released"].iter().any(|k| has(k)) {
        Some(Column::Date)
    } else if has("type") {
        Some(Column::OpinionType)
    } else if has("tribunal") || has("lower") {
        Some(Column::LowerTribunal)
    } else {
        None
    }
}

/// Header text → column index. The first header of each kind wins.
fn column_map(headers: &[String]) -> HashMap<Column, usize> {
    let mut map = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        if let Some(col) = classify(header) {
            map.entry(col).or_insert(idx);
        }
    }
    map
}

fn parse_row(
    cells: &[ElementRef],
    columns: Option<&HashMap<Column, usize>>,
    page: &PageContext,
) -> Option<Opinion> {
    let texts: Vec<String> = cells.iter().map(|c| element_text(*c)).collect();
    let at = |idx: usize| texts.get(idx).cloned().unwrap_or_default();
    let mut raw = RawFields::default();

    match columns {
        Some(map) => {
            let get = |col: Column| map.get(&col).map(|&i| at(i)).unwrap_or_default();
            raw.case_number = get(Column::CaseNumber);
            raw.case_name = get(Column::CaseName);
            raw.date = Some(get(Column::Date));
            raw.opinion_type = get(Column::OpinionType);
            raw.lower_tribunal = get(Column::LowerTribunal);
        }
        None => {
            let first = at(0);
            if case_number_in(&first).is_some() {
                raw.case_number = first;
            }
            raw.case_name = at(1);
            raw.date = Some(at(2));
            raw.opinion_type = at(3);
        }
    }
    raw.date = raw.date.filter(|d| !d.is_empty());

    for link in cells.iter().flat_map(|c| c.select(&LINK)) {
        let target = href(link);
        if raw.pdf_href.is_empty() && is_document_href(target) {
            raw.pdf_href = target.to_string();
        }
        let text = element_text(link);
        if raw.case_number.is_empty() {
            if let Some(number) = case_number_in(&text) {
                raw.case_number = number;
            }
        }
        if raw.case_name.is_empty() && !text.is_empty() {
            raw.case_name = text;
        }
    }

    if raw.case_number.is_empty() {
        raw.case_number = texts.iter().find_map(|t| case_number_in(t))?;
    }
    page.build(raw)
}
