//! Client for the WHO ICD-11 API.
//!
//! [`Icd11Service`] owns the OAuth2 token, the authenticated request
//! executor, result caches and the disease enrichment pipeline. Everything
//! stateful is injected through its builder: the [`CacheStore`], the
//! [`Clock`], and the optional scraping collaborators.

pub mod browser;
pub mod cache;
pub mod clock;
pub mod config;
pub mod enrichment;
pub mod request;
pub mod resolver;
pub mod scrape;
pub mod search;
pub mod service;
pub mod token;

pub use browser::{EnhancedBrowser, HttpEnhancedBrowser};
pub use cache::{
    CacheStats, CacheStore, LocalCacheStore, RedisCacheStore, create_cache_store, start_cleanup_task,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CacheBackendKind, CacheConfig, EnhancedBrowserConfig, Icd11Config, RedisConfig,
    ScrapingConfig,
};
pub use enrichment::{EnrichmentContext, EnrichmentPipeline, EnrichmentStrategy};
pub use request::{Method, RequestExecutor};
pub use scrape::{BrowserScraper, HtmlBrowserScraper, ScrapedText};
pub use search::{SearchOptions, SearchResponse};
pub use service::{Icd11Service, Icd11ServiceBuilder};
pub use token::TokenManager;
