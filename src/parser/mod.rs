pub mod court;
pub mod dates;
pub mod record;
pub mod strategies;

use scraper::Html;
use tracing::{debug, info};

use crate::opinion::{dedupe, Opinion, Window};
use crate::settings::CascadeMode;
use court::CourtIdentity;
use record::RecordContext;
use strategies::{PageContext, Strategy};

/// What one listing page produced, and which strategy produced it first.
#[derive(Debug, Default)]
pub struct Extraction {
    pub opinions: Vec<Opinion>,
    pub strategy: Option<&'static str>,
}

/// Runs the strategy cascade over rendered listing pages.
pub struct PageExtractor {
    strategies: Vec<Box<dyn Strategy>>,
    mode: CascadeMode,
}

impl PageExtractor {
    pub fn new(mode: CascadeMode) -> Self {
        Self::with_strategies(strategies::standard(), mode)
    }

    pub fn with_strategies(strategies: Vec<Box<dyn Strategy>>, mode: CascadeMode) -> Self {
        Self { strategies, mode }
    }

    /// Parse `html` once and try each strategy in order.
    ///
    /// A strategy wins when at least one of its candidates is inside the
    /// window. In `FirstHit` mode later strategies are never invoked.
    pub fn extract(
        &self,
        html: &str,
        court: &CourtIdentity,
        base_url: &str,
        page_url: &str,
        window: &Window,
    ) -> Extraction {
        let doc = Html::parse_document(html);
        let page = PageContext {
            doc: &doc,
            record: RecordContext {
                court,
                base_url,
                page_url,
                window,
            },
        };

        let mut result = Extraction::default();
        for strategy in &self.strategies {
            let found: Vec<Opinion> = strategy
                .extract(&page)
                .into_iter()
                .filter(|o| window.contains(&o.date))
                .collect();
            if found.is_empty() {
                debug!(strategy = strategy.name(), page = page_url, "No in-window candidates");
                continue;
            }

            let found = dedupe(found);
            info!("Parsed {} opinions from {} strategy", found.len(), strategy.name());
            result.strategy.get_or_insert(strategy.name());
            result.opinions.extend(found);
            if self.mode == CascadeMode::FirstHit {
                break;
            }
        }
        result.opinions = dedupe(result.opinions);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::parser::strategies::fixture::{self, day};

    /// Counts its invocations and returns nothing.
    struct Spy(Arc<AtomicUsize>);

    impl Strategy for Spy {
        fn name(&self) -> &'static str {
            "spy"
        }

        fn extract(&self, _page: &PageContext) -> Vec<Opinion> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
    }

    fn run(extractor: &PageExtractor, html: &str) -> Extraction {
        extractor.extract(
            html,
            &fixture::court(),
            fixture::BASE_URL,
            fixture::PAGE_URL,
            &fixture::window(),
        )
    }

    fn fixture_html(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    #[test]
    fn table_wins_and_later_strategies_never_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut strategies = strategies::standard();
        strategies.insert(1, Box::new(Spy(calls.clone())));
        let extractor = PageExtractor::with_strategies(strategies, CascadeMode::FirstHit);

        let out = run(&extractor, &fixture_html("table_and_links.html"));
        assert_eq!(out.strategy, Some("table"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(out.opinions.iter().all(|o| o.case_name != "Download"));
        let numbers: Vec<&str> = out.opinions.iter().map(|o| o.case_number.as_str()).collect();
        assert_eq!(numbers, ["1D2024-0101", "1D2024-0102"]);
    }

    #[test]
    fn stale_only_strategy_does_not_win() {
        // The table holds only an old opinion; the links below it are recent.
        let html = r#"
            <table><tr><th>Case Number</th><th>Case Name</th><th>Date</th></tr>
                   <tr><td>2023-0001</td><td>Old v. Case</td><td>06/01/2023</td></tr></table>
            <p>01/17/2024 <a href="/files/2024-0500.pdf">Fresh v. State</a></p>"#;
        let out = run(&PageExtractor::new(CascadeMode::FirstHit), html);
        assert_eq!(out.strategy, Some("document_links"));
        assert_eq!(out.opinions.len(), 1);
        assert_eq!(out.opinions[0].case_number, "2024-0500");
        assert_eq!(out.opinions[0].date, day(2024, 1, 17));
    }

    #[test]
    fn winning_output_is_deduplicated() {
        let html = r#"<table>
            <tr><td>SC2024-0001</td><td>A v. B</td><td>01/15/2024</td></tr>
            <tr><td>SC2024-0001</td><td>A v. B (corrected)</td><td>01/16/2024</td></tr>
        </table>"#;
        let out = run(&PageExtractor::new(CascadeMode::FirstHit), html);
        assert_eq!(out.opinions.len(), 1);
        assert_eq!(out.opinions[0].case_name, "A v. B");
    }

    #[test]
    fn merge_all_runs_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut strategies = strategies::standard();
        strategies.push(Box::new(Spy(calls.clone())));
        let extractor = PageExtractor::with_strategies(strategies, CascadeMode::MergeAll);

        let out = run(&extractor, &fixture_html("table_and_links.html"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.strategy, Some("table"));
        let ids: Vec<String> = out.opinions.iter().map(|o| o.unique_id()).collect();
        let distinct: HashSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), distinct.len());
        assert!(ids.contains(&"1dca:1D2024-0101".to_string()));
        assert!(ids.contains(&"1dca:2024-0101".to_string()));
    }

    #[test]
    fn unrecognised_page_yields_nothing() {
        let out = run(&PageExtractor::new(CascadeMode::FirstHit), &fixture_html("no_structure.html"));
        assert!(out.opinions.is_empty());
        assert_eq!(out.strategy, None);
    }
}
