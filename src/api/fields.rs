use serde_json::Value;

// Key spellings per field, in priority order. The first non-empty value wins.
const CASE_NAME: &[&str] = &["caseName", "case_name", "caseNameFull", "case_name_full", "caseNameShort"];
const DOCKET_NUMBER: &[&str] = &["docketNumber", "docket_number", "docket"];
const DATE: &[&str] = &["dateFiled", "date_filed", "dateDecided", "date_created"];
const CITATION: &[&str] = &["citation", "citations", "neutralCite", "neutral_cite"];
const JUDGES: &[&str] = &["judge", "judges", "panel_names"];
const OPINION_TYPE: &[&str] = &["type", "opinion_type", "precedentialStatus", "status"];
const LOWER_TRIBUNAL: &[&str] = &["lowerCourt", "lower_court", "appeal_from_str"];
const DOWNLOAD_URL: &[&str] = &["download_url", "downloadUrl", "local_path"];
const ABSOLUTE_URL: &[&str] = &["absolute_url", "absoluteUrl", "frontend_url"];
const TEXT: &[&str] = &["plain_text", "plainText", "text", "snippet"];

/// One search result with every field resolved from its aliases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiRecord {
    pub case_name: String,
    pub docket_number: String,
    pub date: Option<String>,
    pub citation: String,
    pub judges: String,
    pub opinion_type: String,
    pub lower_tribunal: String,
    pub download_url: String,
    pub absolute_url: String,
    pub text: String,
}

impl ApiRecord {
    /// Document URL, text and type fall back to the first nested opinion.
    pub fn from_value(item: &Value) -> Self {
        let nested = item
            .get("opinions")
            .and_then(Value::as_array)
            .and_then(|ops| ops.first());
        let with_nested = |keys: &[&str]| {
            let top = first_non_empty(item, keys);
            if top.is_empty() {
                nested.map(|n| first_non_empty(n, keys)).unwrap_or_default()
            } else {
                top
            }
        };

        let date = first_non_empty(item, DATE);
        Self {
            case_name: first_non_empty(item, CASE_NAME),
            docket_number: first_non_empty(item, DOCKET_NUMBER),
            date: (!date.is_empty()).then_some(date),
            citation: first_non_empty(item, CITATION),
            judges: first_non_empty(item, JUDGES),
            opinion_type: with_nested(OPINION_TYPE),
            lower_tribunal: first_non_empty(item, LOWER_TRIBUNAL),
            download_url: with_nested(DOWNLOAD_URL),
            absolute_url: first_non_empty(item, ABSOLUTE_URL),
            text: with_nested(TEXT),
        }
    }
}

fn first_non_empty(obj: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .map(scalar_text)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Strings as-is, numbers printed, arrays of scalars comma-joined.
fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(scalar_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}
