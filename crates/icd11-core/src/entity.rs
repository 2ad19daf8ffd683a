//! Schemaless ICD-11 entity record with first-writer-wins merging.
//!
//! Entities are assembled from several upstream sources that each return a
//! different subset of fields. Sources are applied in priority order, and a
//! field holding a meaningful value is never overwritten by a later source.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::text::text_of;

/// Well-known entity field names.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const CODE: &str = "code";
    pub const URI: &str = "uri";
    pub const FOUNDATION_URI: &str = "foundationUri";
    pub const LINEARIZATION_URI: &str = "linearizationUri";
    pub const STEM_ID: &str = "stemId";
    pub const DESCRIPTION: &str = "description";
    pub const DEFINITION: &str = "definition";
    pub const LONG_DEFINITION: &str = "longDefinition";
    pub const FULLY_SPECIFIED_NAME: &str = "fullySpecifiedName";
    pub const BROWSER_DESCRIPTION: &str = "browserDescription";
    pub const INCLUSION: &str = "inclusion";
    pub const EXCLUSION: &str = "exclusion";
    pub const TITLE_NOT_FOUND: &str = "title_not_found";
    pub const ANCESTORS: &str = "ancestors";
}

/// A value counts as set unless it is null or an empty string/array/object.
pub fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object; any other JSON shape yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Build an entity from `(key, value)` pairs, skipping unset values.
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut entity = Self::new();
        for (key, value) in pairs {
            entity.set_if_absent(key, value);
        }
        entity
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Plain text of a field, unwrapping `{content}` / `{"@value"}` shapes.
    pub fn text(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(text_of)
    }

    /// True when the field holds a meaningful value.
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(is_meaningful)
    }

    /// True when every listed field holds a meaningful value.
    pub fn has_all(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| self.has(key))
    }

    /// Set `key` unless it already holds a meaningful value. Returns whether
    /// the value was written.
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if !is_meaningful(&value) || self.has(&key) {
            return false;
        }
        self.0.insert(key, value);
        true
    }

    /// Unconditionally set a field.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// First-writer-wins merge of every field in `other`. Returns the number
    /// of fields written.
    pub fn merge(&mut self, other: Entity) -> usize {
        other
            .0
            .into_iter()
            .filter(|(key, value)| self.set_if_absent(key.clone(), value.clone()))
            .count()
    }

    /// First-writer-wins merge restricted to `keys`.
    pub fn merge_fields(&mut self, other: &Entity, keys: &[&str]) -> usize {
        keys.iter()
            .filter_map(|key| other.get(key).map(|value| (*key, value)))
            .filter(|(key, value)| self.set_if_absent(*key, (*value).clone()))
            .count()
    }

    /// Copy of this entity limited to `keys`.
    pub fn select(&self, keys: &[&str]) -> Entity {
        let mut selected = Entity::new();
        selected.merge_fields(self, keys);
        selected
    }

    pub fn is_empty(&self) -> bool {
        !self.0.values().any(is_meaningful)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        entity.into_value()
    }
}

/// Caller-supplied references used to resolve an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foundation_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linearization_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl EntityRefs {
    pub fn uri(&self) -> Option<&str> {
        non_blank(&self.uri)
    }

    pub fn foundation_uri(&self) -> Option<&str> {
        non_blank(&self.foundation_uri)
    }

    pub fn linearization_uri(&self) -> Option<&str> {
        non_blank(&self.linearization_uri)
    }

    pub fn code(&self) -> Option<&str> {
        non_blank(&self.code)
    }

    /// True when no reference carries a usable value.
    pub fn is_empty(&self) -> bool {
        self.uri().is_none()
            && self.foundation_uri().is_none()
            && self.linearization_uri().is_none()
            && self.code().is_none()
    }

    /// The references as entity fields, blanks skipped.
    pub fn to_entity(&self) -> Entity {
        Entity::from_pairs([
            (fields::URI, self.uri()),
            (fields::FOUNDATION_URI, self.foundation_uri()),
            (fields::LINEARIZATION_URI, self.linearization_uri()),
            (fields::CODE, self.code()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, Value::String(v.to_string())))))
    }
}
