//! Text extraction for the language-tagged values the WHO API returns.
//!
//! A "text" field may arrive as a plain string, as `{"@language": "es",
//! "@value": "..."}`, as `{"label": {"@value": "..."}}` or as
//! `{"content": "..."}` depending on the endpoint that produced it.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Keys tried, in order, when a text value is an object.
const TEXT_KEYS: [&str; 5] = ["content", "@value", "label", "value", "title"];

/// Extract a non-empty, trimmed string from a text-ish JSON value.
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Object(map) => TEXT_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(text_of),
        _ => None,
    }
}

/// Remove HTML markup (search highlighting, scraped fragments) and collapse
/// whitespace.
pub fn strip_markup(input: &str) -> String {
    let without_tags = TAG_REGEX.replace_all(input, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    WHITESPACE_REGEX.replace_all(decoded.trim(), " ").into_owned()
}
