use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

static NUMERIC_SLASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})$").unwrap());

/// Month-name formats, long and abbreviated, then ISO and the dash forms.
/// chrono accepts either month spelling for `%B` and `%b` when parsing.
const NAMED_FORMATS: &[&str] = &[
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%Y-%m-%d",
    "%d-%b-%Y",
    "%m-%d-%Y",
];

/// Parse a date string from any of the known court formats.
///
/// Returns `None` when nothing matches; callers choose the fallback.
pub fn parse(raw: &str) -> Option<NaiveDateTime> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }

    parse_numeric(cleaned)
        .or_else(|| {
            NAMED_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
        })
        .or_else(|| DateTime::parse_from_rfc3339(cleaned).ok().map(|d| d.date_naive()))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `M/D/YYYY` or `M/D/YY`; two-digit years pivot at 69 like strptime.
fn parse_numeric(s: &str) -> Option<NaiveDate> {
    let caps = NUMERIC_SLASH_RE.captures(s)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year_raw = &caps[3];
    let mut year: i32 = year_raw.parse().ok()?;
    if year_raw.len() == 2 {
        year += if year < 69 { 2000 } else { 1900 };
    }
    NaiveDate::from_ymd_opt(year, month, day)
}
