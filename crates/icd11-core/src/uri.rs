//! Helpers for WHO entity URIs such as
//! `http://id.who.int/icd/release/11/2024-01/mms/1581976053`.

use url::Url;

/// Trailing path segment of a URI or relative path, ignoring a trailing
/// slash, query and fragment.
pub fn last_segment(uri: &str) -> Option<String> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return None;
    }

    let path = match Url::parse(trimmed) {
        Ok(url) => url.path().to_string(),
        Err(_) => trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Trailing numeric identifier of a URI (`.../mms/1581976053` -> `1581976053`).
///
/// Linearization URIs sometimes end in a residual segment (`/other`,
/// `/unspecified`); the last all-digit segment is returned in that case.
pub fn numeric_id(uri: &str) -> Option<String> {
    let path = match Url::parse(uri.trim()) {
        Ok(url) => url.path().to_string(),
        Err(_) => uri.trim().to_string(),
    };

    path.split('/')
        .rev()
        .find(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

/// True when `value` already is an absolute http(s) URL.
pub fn is_absolute(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_segment() {
        assert_eq!(
            last_segment("http://id.who.int/icd/entity/12345"),
            Some("12345".to_string())
        );
        assert_eq!(
            last_segment("http://id.who.int/icd/entity/12345/"),
            Some("12345".to_string())
        );
        assert_eq!(
            last_segment("https://id.who.int/icd/entity/12345?include=ancestor"),
            Some("12345".to_string())
        );
        assert_eq!(last_segment("12345"), Some("12345".to_string()));
        assert_eq!(last_segment("   "), None);
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(
            numeric_id("http://id.who.int/icd/release/11/2024-01/mms/1581976053"),
            Some("1581976053".to_string())
        );
        assert_eq!(
            numeric_id("http://id.who.int/icd/release/11/2024-01/mms/1581976053/other"),
            Some("1581976053".to_string())
        );
        assert_eq!(numeric_id("http://id.who.int/icd/entity/abc"), None);
    }

    #[test]
    fn test_is_absolute() {
        assert!(is_absolute("http://id.who.int/icd/entity/1"));
        assert!(is_absolute("HTTPS://id.who.int"));
        assert!(!is_absolute("1234/children"));
    }
}
