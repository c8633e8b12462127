pub mod fields;

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::{FetchError, Fetcher};
use crate::opinion::{Opinion, Window};
use crate::parser::court::{CourtIdentity, CourtResolver};
use crate::parser::record::{self, RawFields, RecordContext};
use crate::settings::{CourtConfig, Settings};
use fields::ApiRecord;

/// Paginated opinion search against a CourtListener-style API.
pub struct ApiExtractor<'a> {
    fetcher: &'a dyn Fetcher,
    settings: &'a Settings,
    resolver: &'a CourtResolver,
}

impl<'a> ApiExtractor<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, settings: &'a Settings, resolver: &'a CourtResolver) -> Self {
        Self {
            fetcher,
            settings,
            resolver,
        }
    }

    /// First page of the search for `upstream`, newest first, filed on or after `cutoff`.
    pub fn search_url(&self, upstream: &str, cutoff: NaiveDateTime) -> Result<String, FetchError> {
        let base = self.settings.api.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/search/", base))?;
        url.query_pairs_mut()
            .append_pair("type", "o")
            .append_pair("court", upstream)
            .append_pair("filed_after", &cutoff.format("%Y-%m-%d").to_string())
            .append_pair("order_by", "dateFiled desc");
        Ok(url.to_string())
    }

    /// Follow `next` links until exhausted or the request cap is hit.
    ///
    /// 429 waits out the cooldown and retries the same page (the retry
    /// counts against the cap). 400 stops with what was collected. Any
    /// other failure is returned.
    pub async fn extract(
        &self,
        court: &CourtConfig,
        upstream: &str,
        window: &Window,
    ) -> Result<Vec<Opinion>, FetchError> {
        let configured = CourtIdentity::from_config(court);
        let mut next = Some(self.search_url(upstream, window.cutoff)?);
        let mut requests = 0usize;
        let mut rate_limited = false;
        let mut out = Vec::new();

        while let Some(url) = next.take() {
            if requests >= self.settings.max_api_pages {
                warn!(
                    "Stopping {} pagination after {} requests",
                    court.key, self.settings.max_api_pages
                );
                break;
            }
            if requests > 0 && !rate_limited {
                tokio::time::sleep(self.settings.page_delay()).await;
            }
            requests += 1;
            rate_limited = false;

            let fetched = self.fetcher.fetch(&url).await?;
            match fetched.status {
                429 => {
                    let cooldown = self.settings.rate_limit_cooldown();
                    warn!(
                        "Rate limited on {} (request {}/{}), backing off {:.1}s",
                        court.key,
                        requests,
                        self.settings.max_api_pages,
                        cooldown.as_secs_f64()
                    );
                    tokio::time::sleep(cooldown).await;
                    rate_limited = true;
                    next = Some(url);
                    continue;
                }
                400 => {
                    warn!("API rejected {} query: {}", court.key, fetched.text());
                    break;
                }
                _ => {}
            }

            let body = fetched.ensure_success()?.json()?;
            let results = body.get("results").and_then(Value::as_array);
            let mut kept = 0usize;
            for item in results.into_iter().flatten() {
                if let Some(o) = self.to_opinion(item, &configured, window) {
                    out.push(o);
                    kept += 1;
                }
            }
            debug!(
                "{} page {}: {} results, {} in window",
                court.key,
                requests,
                results.map_or(0, Vec::len),
                kept
            );

            next = body
                .get("next")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }

        info!("Fetched {} opinions for {} from API", out.len(), court.key);
        Ok(out)
    }

    fn to_opinion(&self, item: &Value, configured: &CourtIdentity, window: &Window) -> Option<Opinion> {
        let rec = ApiRecord::from_value(item);
        let identity = self.resolver.resolve_docket(&rec.docket_number, configured);
        let site = self.settings.api.site_url.as_str();
        let ctx = RecordContext {
            court: &identity,
            base_url: site,
            page_url: site,
            window,
        };
        let raw = RawFields {
            case_number: String::new(),
            docket_number: rec.docket_number,
            case_name: rec.case_name,
            date: rec.date,
            opinion_type: rec.opinion_type,
            lower_tribunal: rec.lower_tribunal,
            pdf_href: rec.download_url,
            page_href: rec.absolute_url,
            citation: rec.citation,
            judges: rec.judges,
            text_content: rec.text,
        };
        record::build(raw, &ctx).filter(|o| window.contains(&o.date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubFetcher;
    use crate::parser::strategies::fixture::{day, window};
    use crate::settings::default_prefixes;

    const PAGE_2: &str = "https://www.courtlistener.com/api/rest/v4/search/?cursor=cD0y&court=fladistctapp";

    fn settings() -> Settings {
        Settings {
            page_delay_ms: 0,
            rate_limit_cooldown_secs: 0,
            ..Default::default()
        }
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    fn aggregate(settings: &Settings) -> CourtConfig {
        settings.court("fldca").unwrap().clone()
    }

    #[test]
    fn search_url_carries_filters() {
        let settings = settings();
        let stub = StubFetcher::new();
        let resolver = CourtResolver::new(&default_prefixes());
        let api = ApiExtractor::new(&stub, &settings, &resolver);
        let url = api.search_url("fla", day(2024, 1, 11)).unwrap();
        assert_eq!(
            url,
            "https://www.courtlistener.com/api/rest/v4/search/?type=o&court=fla&filed_after=2024-01-11&order_by=dateFiled+desc"
        );
    }

    #[tokio::test]
    async fn follows_next_until_exhausted() {
        let settings = settings();
        let stub = StubFetcher::new();
        let resolver = CourtResolver::new(&default_prefixes());
        let api = ApiExtractor::new(&stub, &settings, &resolver);
        let first = api.search_url("fladistctapp", window().cutoff).unwrap();
        stub.respond(&first, 200, &fixture("api_page1.json"));
        stub.respond(PAGE_2, 200, &fixture("api_page2.json"));

        let court = aggregate(&settings);
        let out = api.extract(&court, "fladistctapp", &window()).await.unwrap();
        assert_eq!(stub.calls(), [first.as_str(), PAGE_2]);

        let ids: Vec<String> = out.iter().map(|o| o.unique_id()).collect();
        assert_eq!(ids, ["1dca:1D2024-0007", "3dca:3D2023-2210", "5dca:5D2024-0100"]);

        let first_dca = &out[0];
        assert_eq!(first_dca.court_name, "First District Court of Appeal");
        assert_eq!(first_dca.case_name, "Jones v. State");
        assert_eq!(first_dca.date, day(2024, 1, 16));
        assert_eq!(first_dca.pdf_url, "https://1dca.flcourts.gov/content/download/900/file.pdf");
        assert_eq!(first_dca.page_url, "https://www.courtlistener.com/opinion/9001/jones-v-state/");
        assert_eq!(first_dca.citation, "385 So. 3d 101");
        assert!(first_dca.case_number.is_empty());

        assert_eq!(out[2].case_name, "Acme Holdings, LLC v. Department of Revenue");
        assert_eq!(out[2].date, day(2024, 1, 17));
    }

    #[tokio::test]
    async fn unknown_prefix_keeps_aggregate_identity() {
        let settings = settings();
        let stub = StubFetcher::new();
        let resolver = CourtResolver::new(&default_prefixes());
        let api = ApiExtractor::new(&stub, &settings, &resolver);
        let first = api.search_url("fladistctapp", window().cutoff).unwrap();
        stub.respond(
            &first,
            200,
            r#"{"results": [{"caseName": "X v. Y", "docketNumber": "9D24-1", "dateFiled": "2024-01-15", "opinions": [{"snippet": "text"}]}], "next": null}"#,
        );
        let out = api.extract(&aggregate(&settings), "fladistctapp", &window()).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].court_id, "fldca");
        assert_eq!(out[0].court_name, "Florida District Courts of Appeal");
        assert_eq!(out[0].text_content, "text");
    }

    #[tokio::test]
    async fn rate_limit_retries_same_page() {
        let settings = settings();
        let stub = StubFetcher::new();
        let resolver = CourtResolver::new(&default_prefixes());
        let api = ApiExtractor::new(&stub, &settings, &resolver);
        let first = api.search_url("fladistctapp", window().cutoff).unwrap();
        stub.respond(&first, 429, "slow down")
            .respond(&first, 200, &fixture("api_page2.json"));

        let out = api.extract(&aggregate(&settings), "fladistctapp", &window()).await.unwrap();
        assert_eq!(stub.calls(), [first.as_str(), first.as_str()]);
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn bad_request_stops_without_failing() {
        let settings = settings();
        let stub = StubFetcher::new();
        let resolver = CourtResolver::new(&default_prefixes());
        let api = ApiExtractor::new(&stub, &settings, &resolver);
        let first = api.search_url("fladistctapp", window().cutoff).unwrap();
        stub.respond(&first, 200, &fixture("api_page1.json"));
        stub.respond(PAGE_2, 400, r#"{"detail": "Invalid cursor"}"#);

        let out = api.extract(&aggregate(&settings), "fladistctapp", &window()).await.unwrap();
        assert_eq!(stub.calls().len(), 2);
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn server_error_is_a_failure() {
        let settings = settings();
        let stub = StubFetcher::new();
        let resolver = CourtResolver::new(&default_prefixes());
        let api = ApiExtractor::new(&stub, &settings, &resolver);
        let first = api.search_url("fladistctapp", window().cutoff).unwrap();
        stub.respond(&first, 502, "bad gateway");

        let err = api.extract(&aggregate(&settings), "fladistctapp", &window()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn pagination_is_capped() {
        let settings = Settings {
            max_api_pages: 3,
            ..settings()
        };
        let stub = StubFetcher::new();
        let resolver = CourtResolver::new(&default_prefixes());
        let api = ApiExtractor::new(&stub, &settings, &resolver);
        let first = api.search_url("fladistctapp", window().cutoff).unwrap();
        // Every page points at itself.
        let looping = format!(r#"{{"results": [], "next": "{}"}}"#, first);
        stub.respond(&first, 200, &looping);

        let out = api.extract(&aggregate(&settings), "fladistctapp", &window()).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(stub.calls().len(), 3);
    }

    #[tokio::test]
    async fn endless_rate_limit_hits_the_cap() {
        let settings = settings();
        let stub = StubFetcher::new();
        let resolver = CourtResolver::new(&default_prefixes());
        let api = ApiExtractor::new(&stub, &settings, &resolver);
        let first = api.search_url("fladistctapp", window().cutoff).unwrap();
        stub.respond(&first, 429, "");

        let out = api.extract(&aggregate(&settings), "fladistctapp", &window()).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(stub.calls().len(), settings.max_api_pages);
    }
}
