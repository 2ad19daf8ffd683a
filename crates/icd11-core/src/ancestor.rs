use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::code::code_of;
use crate::text::text_of;
use crate::uri::last_segment;

/// One step of the breadcrumb trail shown above an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestor {
    pub id: String,
    pub title: String,
    pub code: String,
}

impl Ancestor {
    /// Build an ancestor from a `/parents` item.
    ///
    /// Items are either objects (`id` or `@id`, a plain or language-tagged
    /// `title`, `code` or `theCode`) or bare entity URIs.
    pub fn from_parent(item: &Value, untitled: &str) -> Option<Self> {
        match item {
            Value::String(uri) => last_segment(uri).map(|id| Self {
                id,
                title: untitled.to_string(),
                code: String::new(),
            }),
            Value::Object(_) => {
                let id = ["id", "@id"]
                    .iter()
                    .filter_map(|key| item.get(*key))
                    .find_map(|v| v.as_str().and_then(last_segment))
                    .unwrap_or_default();
                Some(Self {
                    id,
                    title: item
                        .get("title")
                        .and_then(text_of)
                        .unwrap_or_else(|| untitled.to_string()),
                    code: code_of(item).unwrap_or_default().to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Items of a `/parents` payload: either a bare array, or an object holding
/// the list under `parents`, `parent` or `items`.
pub fn parent_items(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items.clone(),
        Value::Object(map) => ["parents", "parent", "items"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| v.as_array().cloned())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}
