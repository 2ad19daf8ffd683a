//! ICD-11 code matching.
//!
//! Codes are always strings (`MD12`, `1A00`, `XN6K4`, `MD12.0`, `5A11&XA1234`)
//! and compare case-insensitively. A prefix match is only accepted when the
//! candidate continues the query at a segment boundary, so `MD1` never
//! matches `MD12` while `MD12` may match `MD12.0`.

use serde_json::Value;

/// Characters that start a new segment inside a (post-coordinated) code.
const SEGMENT_BOUNDARIES: [char; 3] = ['.', '/', '&'];

/// How a search hit's code relates to the requested code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CodeMatch {
    Exact,
    Prefix,
}

/// Canonical form used for cache keys: trimmed and upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn matches_exact(candidate: &str, code: &str) -> bool {
    let code = code.trim();
    !code.is_empty() && candidate.trim().eq_ignore_ascii_case(code)
}

pub fn matches_prefix(candidate: &str, code: &str) -> bool {
    let candidate = normalize_code(candidate);
    let code = normalize_code(code);
    if code.is_empty() || candidate.len() <= code.len() {
        return false;
    }
    candidate.starts_with(&code)
        && candidate[code.len()..].starts_with(SEGMENT_BOUNDARIES.as_slice())
}

/// Classify `candidate` against `code`, `None` when unrelated.
pub fn classify(candidate: &str, code: &str) -> Option<CodeMatch> {
    if matches_exact(candidate, code) {
        Some(CodeMatch::Exact)
    } else if matches_prefix(candidate, code) {
        Some(CodeMatch::Prefix)
    } else {
        None
    }
}

/// Code carried by a search hit or entity payload (`code` or `theCode`).
pub fn code_of(item: &Value) -> Option<&str> {
    ["code", "theCode"]
        .iter()
        .filter_map(|key| item.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|code| !code.is_empty())
}
