use url::Url;

use super::court::CourtIdentity;
use super::dates;
use crate::opinion::{truncate_chars, Opinion, Window, TEXT_CAP};
use crate::settings::UndatedPolicy;

/// Whatever a source managed to pull out for one candidate. Any field may be empty.
#[derive(Debug, Clone, Default)]
pub struct RawFields {
    pub case_number: String,
    pub docket_number: String,
    pub case_name: String,
    pub date: Option<String>,
    pub opinion_type: String,
    pub lower_tribunal: String,
    pub pdf_href: String,
    pub page_href: String,
    pub citation: String,
    pub judges: String,
    pub text_content: String,
}

/// Per-page context shared by every candidate built from that page.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub court: &'a CourtIdentity,
    pub base_url: &'a str,
    pub page_url: &'a str,
    pub window: &'a Window,
}

/// Assemble a normalized opinion, or `None` when the candidate is unusable.
///
/// Fallbacks: name from case/docket number, date from `window.now` (unless
/// the undated policy discards), relative links joined onto the base URL.
pub fn build(raw: RawFields, ctx: &RecordContext) -> Option<Opinion> {
    let case_number = raw.case_number.trim().to_string();
    let docket_number = raw.docket_number.trim().to_string();
    if case_number.is_empty() && docket_number.is_empty() {
        return None;
    }

    let case_name = [raw.case_name.trim(), case_number.as_str(), docket_number.as_str()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string();

    let date = match raw.date.as_deref().and_then(dates::parse) {
        Some(d) => d,
        None => match ctx.window.undated {
            UndatedPolicy::DefaultToNow => ctx.window.now,
            UndatedPolicy::Discard => return None,
        },
    };

    let page_url = if raw.page_href.trim().is_empty() {
        ctx.page_url.to_string()
    } else {
        absolutize(ctx.base_url, &raw.page_href)
    };

    Some(Opinion {
        case_number,
        docket_number,
        case_name,
        court_id: ctx.court.id.clone(),
        court_name: ctx.court.name.clone(),
        date,
        opinion_type: raw.opinion_type.trim().to_string(),
        pdf_url: absolutize(ctx.base_url, &raw.pdf_href),
        page_url,
        text_content: truncate_chars(raw.text_content.trim(), TEXT_CAP),
        summary: String::new(),
        lower_tribunal: raw.lower_tribunal.trim().to_string(),
        citation: raw.citation.trim().to_string(),
        judges: raw.judges.trim().to_string(),
    })
}

/// Join `href` onto `base`. Empty stays empty; unjoinable input is kept as-is.
pub fn absolutize(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn court() -> CourtIdentity {
        CourtIdentity {
            id: "1dca".to_string(),
            name: "First District Court of Appeal".to_string(),
            short_name: "1st DCA".to_string(),
        }
    }

    fn window(undated: UndatedPolicy) -> Window {
        let now = NaiveDate::from_ymd_opt(2024, 1, 18).unwrap().and_hms_opt(9, 0, 0).unwrap();
        Window::new(now, 7, undated)
    }

    fn build_with(raw: RawFields, undated: UndatedPolicy) -> Option<Opinion> {
        let court = court();
        let window = window(undated);
        let ctx = RecordContext {
            court: &court,
            base_url: "https://1dca.flcourts.gov",
            page_url: "https://1dca.flcourts.gov/Opinions",
            window: &window,
        };
        build(raw, &ctx)
    }

    #[test]
    fn missing_identifiers_discard() {
        let raw = RawFields {
            case_name: "Smith v. Jones".to_string(),
            ..Default::default()
        };
        assert!(build_with(raw, UndatedPolicy::DefaultToNow).is_none());
    }

    #[test]
    fn name_falls_back_to_number() {
        let raw = RawFields {
            case_number: " 1D2024-0001 ".to_string(),
            date: Some("01/16/2024".to_string()),
            ..Default::default()
        };
        let o = build_with(raw, UndatedPolicy::DefaultToNow).unwrap();
        assert_eq!(o.case_number, "1D2024-0001");
        assert_eq!(o.case_name, "1D2024-0001");

        let raw = RawFields {
            docket_number: "1D24-77".to_string(),
            ..Default::default()
        };
        let o = build_with(raw, UndatedPolicy::DefaultToNow).unwrap();
        assert_eq!(o.case_name, "1D24-77");
        assert_eq!(o.unique_id(), "1dca:1D24-77");
    }

    #[test]
    fn undated_defaults_to_now_or_discards() {
        let raw = RawFields {
            case_number: "2024-0001".to_string(),
            date: Some("sometime last week".to_string()),
            ..Default::default()
        };
        let o = build_with(raw.clone(), UndatedPolicy::DefaultToNow).unwrap();
        assert_eq!(o.date, window(UndatedPolicy::DefaultToNow).now);
        assert!(build_with(raw, UndatedPolicy::Discard).is_none());
    }

    #[test]
    fn links_become_absolute() {
        let raw = RawFields {
            case_number: "2024-0001".to_string(),
            pdf_href: "/content/download/123/file.pdf".to_string(),
            page_href: "case/2024-0001".to_string(),
            ..Default::default()
        };
        let o = build_with(raw, UndatedPolicy::DefaultToNow).unwrap();
        assert_eq!(o.pdf_url, "https://1dca.flcourts.gov/content/download/123/file.pdf");
        assert_eq!(o.page_url, "https://1dca.flcourts.gov/case/2024-0001");
    }

    #[test]
    fn page_url_defaults_to_listing() {
        let raw = RawFields {
            case_number: "2024-0001".to_string(),
            pdf_href: "https://cdn.example.com/a.pdf".to_string(),
            ..Default::default()
        };
        let o = build_with(raw, UndatedPolicy::DefaultToNow).unwrap();
        assert_eq!(o.pdf_url, "https://cdn.example.com/a.pdf");
        assert_eq!(o.page_url, "https://1dca.flcourts.gov/Opinions");
    }

    #[test]
    fn text_is_capped() {
        let raw = RawFields {
            case_number: "2024-0001".to_string(),
            text_content: "a".repeat(TEXT_CAP * 2),
            ..Default::default()
        };
        let o = build_with(raw, UndatedPolicy::DefaultToNow).unwrap();
        assert_eq!(o.text_content.chars().count(), TEXT_CAP);
    }
}
