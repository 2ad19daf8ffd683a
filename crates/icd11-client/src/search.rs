//! Release search and search-hit normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::Method;
use crate::service::Icd11Service;
use icd11_core::code::{CodeMatch, classify, code_of};
use icd11_core::{Entity, Result, fields, strip_markup};

/// Field names under which the WHO search endpoints return hit lists.
pub const RESULT_FIELDS: [&str; 5] = ["destinationEntities", "results", "entities", "items", "data"];

/// Nested hit list of a non-flat search result.
const DESCENDANTS: &str = "descendants";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default)]
    pub use_flexisearch: bool,
    #[serde(default = "default_true")]
    pub flat_results: bool,
    #[serde(default = "default_true")]
    pub highlighting_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtree_filter: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            use_flexisearch: false,
            flat_results: true,
            highlighting_enabled: true,
            chapter_filter: None,
            subtree_filter: None,
        }
    }
}

impl SearchOptions {
    /// Literal search used when looking a code up: no fuzzy matching, no
    /// highlight markup.
    pub fn exact() -> Self {
        Self {
            highlighting_enabled: false,
            ..Self::default()
        }
    }

    /// [`SearchOptions::exact`] with flexisearch turned on.
    pub fn fuzzy() -> Self {
        Self {
            use_flexisearch: true,
            ..Self::exact()
        }
    }

    pub fn to_params(&self, query: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.to_string()),
            ("useFlexisearch", self.use_flexisearch.to_string()),
            ("flatResults", self.flat_results.to_string()),
            ("highlightingEnabled", self.highlighting_enabled.to_string()),
        ];
        if let Some(chapter) = non_blank(&self.chapter_filter) {
            params.push(("chapterFilter", chapter.to_string()));
        }
        if let Some(subtree) = non_blank(&self.subtree_filter) {
            params.push(("subtreeFilter", subtree.to_string()));
        }
        params
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Raw search payload plus its primary hit list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub raw: Value,
    pub results: Vec<Value>,
}

impl SearchResponse {
    pub fn from_raw(raw: Value) -> Self {
        let results = RESULT_FIELDS
            .iter()
            .filter_map(|field| raw.get(*field).and_then(Value::as_array))
            .find(|items| !items.is_empty())
            .cloned()
            .unwrap_or_default();
        Self { raw, results }
    }

    /// Every hit in every known list, nested `descendants` included.
    pub fn hits(&self) -> Vec<&Value> {
        let mut hits = Vec::new();
        for field in RESULT_FIELDS {
            if let Some(items) = self.raw.get(field).and_then(Value::as_array) {
                collect_hits(items, &mut hits);
            }
        }
        hits
    }

    /// Best hit for `code`: the first exact match, otherwise (when allowed)
    /// the first segment-boundary prefix match.
    pub fn find_code(&self, code: &str, allow_prefix: bool) -> Option<&Value> {
        let mut prefix_hit = None;
        for hit in self.hits() {
            match code_of(hit).and_then(|candidate| classify(candidate, code)) {
                Some(CodeMatch::Exact) => return Some(hit),
                Some(CodeMatch::Prefix) if allow_prefix && prefix_hit.is_none() => {
                    prefix_hit = Some(hit)
                }
                _ => {}
            }
        }
        prefix_hit
    }
}

fn collect_hits<'a>(items: &'a [Value], into: &mut Vec<&'a Value>) {
    for item in items {
        into.push(item);
        if let Some(nested) = item.get(DESCENDANTS).and_then(Value::as_array) {
            collect_hits(nested, into);
        }
    }
}

/// Turn a search hit into an entity: `code` from `theCode`, `uri` (or
/// `foundationUri` for foundation hits) from `id`, and `title` without
/// highlight markup.
pub fn hit_to_entity(hit: &Value) -> Entity {
    let mut entity = Entity::from_value(hit.clone()).unwrap_or_default();

    if let Some(code) = code_of(hit) {
        entity.set_if_absent(fields::CODE, Value::String(code.to_string()));
    }

    if let Some(id) = hit.get("id").and_then(Value::as_str) {
        let target = if id.contains("/icd/entity/") {
            fields::FOUNDATION_URI
        } else {
            fields::URI
        };
        entity.set_if_absent(target, Value::String(id.to_string()));
    }

    if let Some(title) = entity.text(fields::TITLE) {
        entity.insert(fields::TITLE, Value::String(strip_markup(&title)));
    }

    entity.remove(DESCENDANTS);
    entity
}

impl Icd11Service {
    /// Search the configured release.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let url = self.config.search_url();
        self.search_at(&url, query, options).await
    }

    /// Search an explicit endpoint with the same parameters.
    pub async fn search_at(
        &self,
        url: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let raw = self
            .executor
            .request(url, &options.to_params(query), Method::Get)
            .await?;
        Ok(SearchResponse::from_raw(raw))
    }
}
