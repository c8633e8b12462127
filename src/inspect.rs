use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::opinion::truncate_chars;
use crate::parser::strategies::{element_text, href, CASE_NUMBER_RE, LINK};

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());
static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[class], article[class], section[class]").unwrap());
static IFRAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("iframe").unwrap());
static SCRIPT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

static DOCUMENT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\.pdf|download|opinion)").unwrap());
static AJAX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(ajax|fetch|xmlhttp)").unwrap());

const CONTAINER_KEYWORDS: &[&str] = &[
    "opinion", "case", "result", "item", "entry", "row", "view", "content", "field",
];
const SHOWN: usize = 10;

pub struct TableSummary {
    pub rows: usize,
    pub first_row: Vec<String>,
}

pub struct ContainerSummary {
    pub tag: String,
    pub class: String,
    pub preview: String,
}

/// What a listing page looks like to the extractor, for diagnosing misses.
pub struct PageSummary {
    pub size: usize,
    pub tables: Vec<TableSummary>,
    pub document_links: Vec<(String, String)>,
    pub case_tokens: usize,
    pub case_numbers: BTreeSet<String>,
    pub containers: Vec<ContainerSummary>,
    pub iframes: usize,
    pub ajax_scripts: usize,
}

impl PageSummary {
    /// Case numbers or document links were seen.
    pub fn has_data(&self) -> bool {
        !self.case_numbers.is_empty() || !self.document_links.is_empty()
    }

    /// One line for the end-of-capture summary. Pages with no data are
    /// flagged, usually because the listing is rendered client-side.
    pub fn headline(&self) -> String {
        let line = format!(
            "Size={}, Tables={}, PDF links={}, Cases={}",
            self.size,
            self.tables.len(),
            self.document_links.len(),
            self.case_numbers.len()
        );
        if self.has_data() {
            line
        } else {
            format!("{} (no case data, try renderer = \"spider\")", line)
        }
    }
}

pub fn inspect(html: &str) -> PageSummary {
    let doc = Html::parse_document(html);

    let tables = doc
        .select(&TABLE)
        .map(|t| {
            let rows: Vec<_> = t.select(&ROW).collect();
            let first_row = rows
                .first()
                .map(|r| {
                    r.select(&CELL)
                        .map(|c| truncate_chars(&element_text(c), 50))
                        .collect()
                })
                .unwrap_or_default();
            TableSummary {
                rows: rows.len(),
                first_row,
            }
        })
        .collect();

    let document_links = doc
        .select(&LINK)
        .filter(|a| DOCUMENT_LINK_RE.is_match(href(*a)))
        .map(|a| (truncate_chars(href(a), 100), truncate_chars(&element_text(a), 80)))
        .collect();

    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    let tokens: Vec<&str> = CASE_NUMBER_RE.find_iter(&text).map(|m| m.as_str()).collect();

    let containers = doc
        .select(&CONTAINER)
        .filter_map(|el| {
            let class = el.value().attr("class").unwrap_or("").to_string();
            let lowered = class.to_lowercase();
            CONTAINER_KEYWORDS
                .iter()
                .any(|k| lowered.contains(k))
                .then(|| ContainerSummary {
                    tag: el.value().name().to_string(),
                    class,
                    preview: truncate_chars(&element_text(el), 100),
                })
        })
        .collect();

    let ajax_scripts = doc
        .select(&SCRIPT)
        .filter(|s| AJAX_RE.is_match(&s.text().collect::<String>()))
        .count();

    PageSummary {
        size: html.len(),
        tables,
        document_links,
        case_tokens: tokens.len(),
        case_numbers: tokens.into_iter().map(str::to_string).collect(),
        containers,
        iframes: doc.select(&IFRAME).count(),
        ajax_scripts,
    }
}

impl fmt::Display for PageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Content-Length: {} chars", self.size)?;
        writeln!(f, "  Tables found: {}", self.tables.len())?;
        for (i, t) in self.tables.iter().enumerate() {
            writeln!(f, "    Table {}: {} rows", i, t.rows)?;
            if !t.first_row.is_empty() {
                writeln!(f, "      First row cells: {:?}", t.first_row)?;
            }
        }
        writeln!(f, "  PDF/opinion links: {}", self.document_links.len())?;
        for (target, text) in self.document_links.iter().take(SHOWN) {
            writeln!(f, "    - href: {}", target)?;
            writeln!(f, "      text: {}", text)?;
        }
        writeln!(
            f,
            "  Case number patterns found: {} total, {} unique",
            self.case_tokens,
            self.case_numbers.len()
        )?;
        if !self.case_numbers.is_empty() {
            let examples: Vec<&String> = self.case_numbers.iter().take(SHOWN).collect();
            writeln!(f, "    Examples: {:?}", examples)?;
        }
        writeln!(f, "  Content containers with relevant classes: {}", self.containers.len())?;
        for c in self.containers.iter().take(SHOWN) {
            writeln!(f, "    - <{} class='{}'> {}", c.tag, c.class, c.preview)?;
        }
        writeln!(f, "  Iframes: {}", self.iframes)?;
        write!(f, "  Scripts with AJAX/fetch: {}", self.ajax_scripts)
    }
}
