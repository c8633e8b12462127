use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::settings::{CourtConfig, PrefixEntry};

static DOCKET_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d?[A-Za-z]+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourtIdentity {
    pub id: String,
    pub name: String,
    pub short_name: String,
}

impl CourtIdentity {
    /// Direct mode: the configured court is the deciding court.
    pub fn from_config(court: &CourtConfig) -> Self {
        Self {
            id: court.key.clone(),
            name: court.name.clone(),
            short_name: court.short_name.clone(),
        }
    }
}

/// Maps docket-number prefixes ("1D", "SC", ...) to the court that issued them.
#[derive(Debug, Clone, Default)]
pub struct CourtResolver {
    prefixes: HashMap<String, CourtIdentity>,
}

impl CourtResolver {
    pub fn new(entries: &[PrefixEntry]) -> Self {
        let prefixes = entries
            .iter()
            .map(|e| {
                (
                    e.prefix.to_uppercase(),
                    CourtIdentity {
                        id: e.court_id.clone(),
                        name: e.name.clone(),
                        short_name: e.short_name.clone(),
                    },
                )
            })
            .collect();
        Self { prefixes }
    }

    /// Prefix mode. Unknown or missing prefixes keep `configured`.
    pub fn resolve_docket(&self, docket: &str, configured: &CourtIdentity) -> CourtIdentity {
        docket_prefix(docket)
            .and_then(|p| self.prefixes.get(&p))
            .cloned()
            .unwrap_or_else(|| configured.clone())
    }
}

/// Leading alphabetic token of a docket number, upper-cased: "1d24-1" → "1D".
pub fn docket_prefix(docket: &str) -> Option<String> {
    DOCKET_PREFIX_RE
        .captures(docket)
        .map(|c| c[1].to_uppercase())
}
