use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::ApiExtractor;
use crate::fetch::{FetchError, Fetcher};
use crate::opinion::{dedupe, Opinion, Window};
use crate::parser::court::{CourtIdentity, CourtResolver};
use crate::parser::PageExtractor;
use crate::settings::{CascadeMode, CourtConfig, Settings, SourceConfig};

/// A court for which every configured source failed.
#[derive(Debug, Clone, Serialize)]
pub struct CourtFailure {
    pub court: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub opinions: Vec<Opinion>,
    pub per_court: Vec<(String, usize)>,
    pub failures: Vec<CourtFailure>,
}

/// Walks the selected courts one at a time and collects their opinions.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    pages: &'a dyn Fetcher,
    data: &'a dyn Fetcher,
    extractor: PageExtractor,
    resolver: CourtResolver,
}

impl<'a> Pipeline<'a> {
    /// `pages` loads listing pages (possibly rendered), `data` loads API JSON.
    pub fn new(settings: &'a Settings, pages: &'a dyn Fetcher, data: &'a dyn Fetcher) -> Self {
        Self {
            settings,
            pages,
            data,
            extractor: PageExtractor::new(settings.cascade),
            resolver: CourtResolver::new(&settings.prefixes),
        }
    }

    /// Enabled courts, or exactly the named ones (enabled or not) when a
    /// selection is given.
    pub fn selected_courts(&self, selection: &[String]) -> Vec<&'a CourtConfig> {
        if selection.is_empty() {
            return self.settings.courts.iter().filter(|c| c.enabled).collect();
        }
        selection
            .iter()
            .filter_map(|key| {
                let court = self.settings.court(key);
                if court.is_none() {
                    warn!("Unknown court {}, skipping", key);
                }
                court
            })
            .collect()
    }

    pub async fn run(&self, now: NaiveDateTime, selection: &[String]) -> RunReport {
        let window = Window::new(now, self.settings.lookback_days, self.settings.undated);
        let courts = self.selected_courts(selection);
        info!(
            "Scraping {} courts, cutoff {}",
            courts.len(),
            window.cutoff.format("%Y-%m-%d")
        );

        let mut report = RunReport::default();
        let mut collected = Vec::new();
        for (i, court) in courts.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.court_delay()).await;
            }
            info!("Scraping {}", court.name);
            match self.scrape_court(court, &window).await {
                Ok(found) => {
                    info!("Found {} opinions from {}", found.len(), court.name);
                    report.per_court.push((court.key.clone(), found.len()));
                    collected.extend(found);
                }
                Err(failure) => {
                    error!("Error scraping {}: {}", court.name, failure.errors.join("; "));
                    report.per_court.push((court.key.clone(), 0));
                    report.failures.push(failure);
                }
            }
        }

        report.opinions = dedupe(collected);
        info!(
            "Total: {} opinions from {} courts ({} failed)",
            report.opinions.len(),
            courts.len(),
            report.failures.len()
        );
        report
    }

    /// Try the court's sources in order. Errors only when every source errored.
    pub async fn scrape_court(
        &self,
        court: &CourtConfig,
        window: &Window,
    ) -> Result<Vec<Opinion>, CourtFailure> {
        if court.sources.is_empty() {
            warn!("{} has no sources configured", court.key);
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut errors = Vec::new();
        for (i, source) in court.sources.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.page_delay()).await;
            }
            match self.scrape_source(court, source, window).await {
                Ok(opinions) if opinions.is_empty() => {
                    info!("No opinions from {} {} source", court.key, source.label());
                }
                Ok(opinions) => {
                    info!(
                        "Got {} opinions from {} {} source",
                        opinions.len(),
                        court.key,
                        source.label()
                    );
                    found.extend(opinions);
                    if self.settings.cascade == CascadeMode::FirstHit {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{} {} source failed: {}", court.key, source.label(), e);
                    errors.push(format!("{}: {}", source.label(), e));
                }
            }
        }

        if found.is_empty() && errors.len() == court.sources.len() {
            return Err(CourtFailure {
                court: court.key.clone(),
                errors,
            });
        }
        Ok(dedupe(found))
    }

    async fn scrape_source(
        &self,
        court: &CourtConfig,
        source: &SourceConfig,
        window: &Window,
    ) -> Result<Vec<Opinion>, FetchError> {
        match source {
            SourceConfig::Api { upstream } => {
                ApiExtractor::new(self.data, self.settings, &self.resolver)
                    .extract(court, upstream, window)
                    .await
            }
            SourceConfig::Page { url, .. } => {
                let fetched = self.pages.fetch(url).await?.ensure_success()?;
                let identity = CourtIdentity::from_config(court);
                let extraction =
                    self.extractor
                        .extract(&fetched.text(), &identity, &court.base_url, url, window);
                if extraction.opinions.is_empty() {
                    warn!("No opinions parsed from {}", url);
                }
                Ok(extraction.opinions)
            }
        }
    }
}
