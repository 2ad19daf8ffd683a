//! Client-side configuration sections.
//!
//! These structs are embedded in the server's `AppConfig` and deserialized by
//! the `config` crate, so every field carries a serde default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// WHO API connection and localisation settings (`[icd11]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Icd11Config {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// OAuth2 token endpoint of the WHO identity provider
    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_scope")]
    pub scope: String,

    /// API root, e.g. `https://id.who.int/icd`
    #[serde(default = "default_api_root")]
    pub api_root: String,

    /// Release id used by every release-scoped path
    #[serde(default = "default_release")]
    pub release: String,

    #[serde(default = "default_linearization")]
    pub linearization: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Value of the `API-Version` header
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout for upstream calls
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Root of the public ICD-11 browser used by the scraper
    #[serde(default = "default_browser_base_url")]
    pub browser_base_url: String,

    /// Prefix of the synthetic title produced for unresolved codes
    #[serde(default = "default_placeholder_title_prefix")]
    pub placeholder_title_prefix: String,

    /// Title given to ancestors that carry none
    #[serde(default = "default_untitled_label")]
    pub untitled_label: String,

    /// Produce a placeholder record instead of failing when nothing resolves
    #[serde(default = "default_true")]
    pub placeholder_on_miss: bool,
}

fn default_token_url() -> String {
    "https://icdaccessmanagement.who.int/connect/token".to_string()
}

fn default_scope() -> String {
    "icdapi_access".to_string()
}

fn default_api_root() -> String {
    "https://id.who.int/icd".to_string()
}

fn default_release() -> String {
    "2024-01".to_string()
}

fn default_linearization() -> String {
    "mms".to_string()
}

fn default_language() -> String {
    "es".to_string()
}

fn default_api_version() -> String {
    "v2".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_browser_base_url() -> String {
    "https://icd.who.int/browse".to_string()
}

fn default_placeholder_title_prefix() -> String {
    "Código".to_string()
}

fn default_untitled_label() -> String {
    "Sin título".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Icd11Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: default_token_url(),
            scope: default_scope(),
            api_root: default_api_root(),
            release: default_release(),
            linearization: default_linearization(),
            language: default_language(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            browser_base_url: default_browser_base_url(),
            placeholder_title_prefix: default_placeholder_title_prefix(),
            untitled_label: default_untitled_label(),
            placeholder_on_miss: default_true(),
        }
    }
}

impl Icd11Config {
    fn root(&self) -> &str {
        self.api_root.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `{api_root}/entity`
    pub fn entity_base(&self) -> String {
        format!("{}/entity", self.root())
    }

    /// `{api_root}/release/11/{release}/{linearization}`
    pub fn release_base(&self) -> String {
        format!(
            "{}/release/11/{}/{}",
            self.root(),
            self.release,
            self.linearization
        )
    }

    /// `{api_root}/release/11/{linearization}` (latest release)
    pub fn latest_release_base(&self) -> String {
        format!("{}/release/11/{}", self.root(), self.linearization)
    }

    /// Primary search endpoint.
    pub fn search_url(&self) -> String {
        format!("{}/search", self.release_base())
    }

    /// Search endpoints tried by the disease pipeline, in order.
    pub fn search_urls(&self) -> Vec<String> {
        vec![
            self.search_url(),
            format!("{}/search", self.latest_release_base()),
            format!("{}/search", self.entity_base()),
        ]
    }

    /// Codeinfo lookups for `code`, in order.
    pub fn codeinfo_urls(&self, code: &str) -> Vec<String> {
        vec![
            format!("{}/codeinfo/{code}", self.release_base()),
            format!("{}/codeinfo/{code}", self.latest_release_base()),
            format!("{}/{code}", self.entity_base()),
        ]
    }

    /// Entity lookups for a numeric id, in order.
    pub fn component_urls(&self, id: &str) -> Vec<String> {
        vec![
            format!("{}/{id}", self.entity_base()),
            format!("{}/{id}", self.release_base()),
            format!("{}/{id}", self.latest_release_base()),
        ]
    }

    pub fn has_credentials(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

/// Which store backs the result and token caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Local,
    Redis,
}

/// Cache settings (`[cache]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,

    /// TTL of resolved codes, entities and disease records
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// TTL of ancestor trails
    #[serde(default = "default_ancestors_ttl_secs")]
    pub ancestors_ttl_secs: u64,

    /// How often the local store sweeps expired entries
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default)]
    pub redis: RedisConfig,
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_ancestors_ttl_secs() -> u64 {
    3600
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            ttl_hours: default_ttl_hours(),
            ancestors_ttl_secs: default_ancestors_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            redis: RedisConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Longest accepted TTL: one year.
    pub const MAX_TTL_HOURS: u64 = 24 * 365;

    pub fn entity_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }

    pub fn ancestors_ttl(&self) -> Duration {
        Duration::from_secs(self.ancestors_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Redis connection settings (`[cache.redis]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Public browser scraping (`[scraping]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

/// External enhanced-browser service (`[enhanced_browser]`).
///
/// Enabled by default; it only becomes active once `url` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedBrowserConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EnhancedBrowserConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            url: None,
        }
    }
}

impl EnhancedBrowserConfig {
    /// Base URL when the collaborator is enabled and configured.
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
