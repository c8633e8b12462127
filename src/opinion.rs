use std::collections::HashSet;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::settings::{UndatedPolicy, MAX_LOOKBACK_DAYS};

/// Cap on stored opinion text, in characters.
pub const TEXT_CAP: usize = 15_000;

/// A single published decision, normalized across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub case_number: String,
    pub docket_number: String,
    pub case_name: String,
    pub court_id: String,
    pub court_name: String,
    pub date: NaiveDateTime,
    pub opinion_type: String,
    pub pdf_url: String,
    pub page_url: String,
    pub text_content: String,
    pub summary: String,
    pub lower_tribunal: String,
    pub citation: String,
    pub judges: String,
}

impl Opinion {
    /// `court_id:case_number`, or `court_id:docket_number` when there is no case number.
    pub fn unique_id(&self) -> String {
        let key = if self.case_number.is_empty() {
            &self.docket_number
        } else {
            &self.case_number
        };
        format!("{}:{}", self.court_id, key)
    }

    /// Case number if known, docket number otherwise.
    pub fn display_number(&self) -> &str {
        if self.case_number.is_empty() {
            &self.docket_number
        } else {
            &self.case_number
        }
    }
}

/// The lookback window a run filters against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub now: NaiveDateTime,
    pub cutoff: NaiveDateTime,
    pub undated: UndatedPolicy,
}

impl Window {
    /// The cutoff is the start of the day `lookback_days` before `now`, so
    /// anything filed that day is kept. Days are clamped to
    /// `0..=MAX_LOOKBACK_DAYS`.
    pub fn new(now: NaiveDateTime, lookback_days: i64, undated: UndatedPolicy) -> Self {
        let days = lookback_days.clamp(0, MAX_LOOKBACK_DAYS);
        let cutoff = (now - Duration::days(days)).date().and_time(NaiveTime::MIN);
        Self { now, cutoff, undated }
    }

    /// Inclusive at the cutoff.
    pub fn contains(&self, date: &NaiveDateTime) -> bool {
        *date >= self.cutoff
    }
}

/// Keep the first opinion seen for each unique id, preserving order.
pub fn dedupe(opinions: Vec<Opinion>) -> Vec<Opinion> {
    let mut seen = HashSet::new();
    opinions
        .into_iter()
        .filter(|o| seen.insert(o.unique_id()))
        .collect()
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
pub(crate) fn sample(court_id: &str, case_number: &str) -> Opinion {
    use chrono::NaiveDate;
    Opinion {
        case_number: case_number.to_string(),
        docket_number: String::new(),
        case_name: format!("{} v. State", case_number),
        court_id: court_id.to_string(),
        court_name: "Test Court".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        opinion_type: String::new(),
        pdf_url: String::new(),
        page_url: String::new(),
        text_content: String::new(),
        summary: String::new(),
        lower_tribunal: String::new(),
        citation: String::new(),
        judges: String::new(),
    }
}
