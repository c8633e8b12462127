use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "FLOPS";
const DEFAULT_CONFIG_FILE: &str = "fl_opinions";

/// Longest accepted lookback, in days.
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

/// What to do with a candidate whose date cannot be parsed.
///
/// `DefaultToNow` keeps undated items visible but they never age out of the
/// lookback window. `Discard` drops them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndatedPolicy {
    #[default]
    DefaultToNow,
    Discard,
}

/// How a page cascade (and a court's source list) decides it is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeMode {
    /// Stop at the first strategy/source with at least one in-window result.
    #[default]
    FirstHit,
    /// Run everything and merge, first-seen wins on duplicates.
    MergeAll,
}

/// Which fetcher loads court listing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Renderer {
    #[default]
    Http,
    /// spider.cloud rendering, for listing pages built client-side.
    Spider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A rendered listing page scraped with the strategy cascade.
    Page { label: String, url: String },
    /// A search API upstream court id (may aggregate several courts).
    Api { upstream: String },
}

impl SourceConfig {
    pub fn label(&self) -> &str {
        match self {
            SourceConfig::Page { label, .. } => label,
            SourceConfig::Api { .. } => "api",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourtConfig {
    pub key: String,
    pub name: String,
    pub short_name: String,
    pub base_url: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn enabled_by_default() -> bool {
    true
}

/// Docket-number prefix → the physical court it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixEntry {
    pub prefix: String,
    pub court_id: String,
    pub name: String,
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Base for `absolute_url` values in search results.
    pub site_url: String,
    pub token: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.courtlistener.com/api/rest/v4".to_string(),
            site_url: "https://www.courtlistener.com".to_string(),
            token: None,
        }
    }
}

/// Loaded once at startup and passed by reference everywhere after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub lookback_days: i64,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub document_timeout_secs: u64,
    /// Deadline for one `--summarize-with` program run.
    pub summarize_timeout_secs: u64,
    pub court_delay_ms: u64,
    pub page_delay_ms: u64,
    pub text_delay_ms: u64,
    pub rate_limit_cooldown_secs: u64,
    pub max_api_pages: usize,
    pub undated: UndatedPolicy,
    pub cascade: CascadeMode,
    pub renderer: Renderer,
    pub api: ApiSettings,
    pub courts: Vec<CourtConfig>,
    pub prefixes: Vec<PrefixEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            user_agent: "FloridaCourtOpinionScraper/1.0 (RSS Feed Generator)".to_string(),
            request_timeout_secs: 30,
            document_timeout_secs: 60,
            summarize_timeout_secs: 120,
            court_delay_ms: 1000,
            page_delay_ms: 1000,
            text_delay_ms: 1000,
            rate_limit_cooldown_secs: 30,
            max_api_pages: 10,
            undated: UndatedPolicy::default(),
            cascade: CascadeMode::default(),
            renderer: Renderer::default(),
            api: ApiSettings::default(),
            courts: default_courts(),
            prefixes: default_prefixes(),
        }
    }
}

impl Settings {
    pub fn court_delay(&self) -> Duration {
        Duration::from_millis(self.court_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn text_delay(&self) -> Duration {
        Duration::from_millis(self.text_delay_ms)
    }

    pub fn summarize_timeout(&self) -> Duration {
        Duration::from_secs(self.summarize_timeout_secs)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn court(&self, key: &str) -> Option<&CourtConfig> {
        self.courts.iter().find(|c| c.key == key)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=MAX_LOOKBACK_DAYS).contains(&self.lookback_days) {
            return Err(ConfigError::Message(format!(
                "lookback_days must be between 0 and {}, got {}",
                MAX_LOOKBACK_DAYS, self.lookback_days
            )));
        }
        Ok(())
    }
}

/// Build settings from defaults, an optional TOML file and `FLOPS_*` env vars.
///
/// Without an explicit path, `fl_opinions.toml` in the working directory is
/// read when present.
pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(p) => File::from(p).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };
    let settings: Settings = Config::builder()
        .add_source(file)
        .add_source(environment())
        .build()?
        .try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

/// `FLOPS_LOOKBACK_DAYS`, `FLOPS_API__TOKEN`: one underscore after the
/// prefix, two between nested keys.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn court(key: &str, name: &str, short_name: &str, host: &str, sources: Vec<SourceConfig>) -> CourtConfig {
    CourtConfig {
        key: key.to_string(),
        name: name.to_string(),
        short_name: short_name.to_string(),
        base_url: format!("https://{}", host),
        enabled: true,
        sources,
    }
}

fn page(label: &str, url: &str) -> SourceConfig {
    SourceConfig::Page {
        label: label.to_string(),
        url: url.to_string(),
    }
}

fn dca_pages(host: &str, recent_path: &str) -> Vec<SourceConfig> {
    vec![
        page("recent", &format!("https://{}/Opinions/{}", host, recent_path)),
        page("archive", &format!("https://{}/Opinions/Opinions-Archive", host)),
        page("main", &format!("https://{}/Opinions", host)),
    ]
}

/// The Supreme Court and the district courts as one aggregate API upstream.
///
/// The per-district page scrapers ship disabled: the aggregate upstream
/// already covers them and enabling both yields the same decision twice under
/// different keys.
pub fn default_courts() -> Vec<CourtConfig> {
    let mut courts = vec![
        court(
            "florida_supreme_court",
            "Supreme Court of Florida",
            "FLSC",
            "supremecourt.flcourts.gov",
            vec![
                SourceConfig::Api {
                    upstream: "fla".to_string(),
                },
                page(
                    "recent",
                    "https://supremecourt.flcourts.gov/case-information/opinions/most-recent-opinions",
                ),
                page(
                    "archive",
                    "https://supremecourt.flcourts.gov/Opinions/Archived-Opinions",
                ),
                page(
                    "main",
                    "https://supremecourt.flcourts.gov/content/download/opinion-search-results",
                ),
            ],
        ),
        court(
            "fldca",
            "Florida District Courts of Appeal",
            "DCA",
            "www.flcourts.gov",
            vec![SourceConfig::Api {
                upstream: "fladistctapp".to_string(),
            }],
        ),
    ];

    let districts = [
        ("1dca", "First District Court of Appeal", "1st DCA", "Most-Recent-Written-Opinions"),
        ("2dca", "Second District Court of Appeal", "2nd DCA", "Most-Recent-Written-Opinions"),
        ("3dca", "Third District Court of Appeal", "3rd DCA", "Most-Recent-Opinion-Release"),
        ("4dca", "Fourth District Court of Appeal", "4th DCA", "Most-Recent-Written-Opinions"),
        ("5dca", "Fifth District Court of Appeal", "5th DCA", "Most-Recent-Written-Opinions"),
        ("6dca", "Sixth District Court of Appeal", "6th DCA", "Most-Recent-Written-Opinions"),
    ];
    for (key, name, short_name, recent) in districts {
        let host = format!("{}.flcourts.gov", key);
        let mut c = court(key, name, short_name, &host, dca_pages(&host, recent));
        c.enabled = false;
        courts.push(c);
    }
    courts
}

pub fn default_prefixes() -> Vec<PrefixEntry> {
    let entries = [
        ("SC", "florida_supreme_court", "Supreme Court of Florida", "FLSC"),
        ("1D", "1dca", "First District Court of Appeal", "1st DCA"),
        ("2D", "2dca", "Second District Court of Appeal", "2nd DCA"),
        ("3D", "3dca", "Third District Court of Appeal", "3rd DCA"),
        ("4D", "4dca", "Fourth District Court of Appeal", "4th DCA"),
        ("5D", "5dca", "Fifth District Court of Appeal", "5th DCA"),
        ("6D", "6dca", "Sixth District Court of Appeal", "6th DCA"),
    ];
    entries
        .into_iter()
        .map(|(prefix, court_id, name, short_name)| PrefixEntry {
            prefix: prefix.to_string(),
            court_id: court_id.to_string(),
            name: name.to_string(),
            short_name: short_name.to_string(),
        })
        .collect()
}
