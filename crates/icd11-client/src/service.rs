//! Entry point tying the token manager, executor, caches and enrichment
//! collaborators together.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::browser::{EnhancedBrowser, HttpEnhancedBrowser};
use crate::cache::{CacheStore, LocalCacheStore};
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, EnhancedBrowserConfig, Icd11Config, ScrapingConfig};
use crate::enrichment::EnrichmentPipeline;
use crate::request::{Method, RequestExecutor};
use crate::scrape::{BrowserScraper, HtmlBrowserScraper};
use crate::token::TokenManager;
use icd11_core::{Icd11Error, Result};

pub struct Icd11Service {
    pub(crate) config: Arc<Icd11Config>,
    pub(crate) tokens: Arc<TokenManager>,
    pub(crate) executor: Arc<RequestExecutor>,
    pub(crate) cache: Arc<dyn CacheStore>,
    pub(crate) entity_ttl: Duration,
    pub(crate) ancestors_ttl: Duration,
    pub(crate) scraper: Option<Arc<dyn BrowserScraper>>,
    pub(crate) enhanced_browser: Option<Arc<dyn EnhancedBrowser>>,
    pub(crate) pipeline: EnrichmentPipeline,
}

impl Icd11Service {
    pub fn builder(config: Icd11Config) -> Icd11ServiceBuilder {
        Icd11ServiceBuilder::new(config)
    }

    pub fn config(&self) -> &Icd11Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Current bearer token (cached or freshly fetched).
    pub async fn get_token(&self) -> Result<String> {
        self.tokens.get_token().await
    }

    /// Generic authenticated call; see [`RequestExecutor::request`].
    pub async fn request(
        &self,
        path: &str,
        params: &[(&str, String)],
        method: Method,
    ) -> Result<Value> {
        self.executor.request(path, params, method).await
    }

    pub async fn get_entity(&self, id: &str) -> Result<Value> {
        self.request(id.trim(), &[], Method::Get).await
    }

    pub async fn get_children(&self, id: &str) -> Result<Value> {
        self.request(&format!("{}/children", id.trim()), &[], Method::Get)
            .await
    }

    pub async fn get_parents(&self, id: &str) -> Result<Value> {
        self.request(&format!("{}/parents", id.trim()), &[], Method::Get)
            .await
    }
}

/// Builder for [`Icd11Service`].
///
/// Unset collaborators fall back to defaults: system clock, local cache,
/// HTML scraper when scraping is enabled, HTTP enhanced browser when a URL is
/// configured.
pub struct Icd11ServiceBuilder {
    config: Icd11Config,
    cache_config: CacheConfig,
    scraping: ScrapingConfig,
    enhanced: EnhancedBrowserConfig,
    clock: Option<Arc<dyn Clock>>,
    cache: Option<Arc<dyn CacheStore>>,
    scraper: Option<Arc<dyn BrowserScraper>>,
    enhanced_browser: Option<Arc<dyn EnhancedBrowser>>,
    pipeline: Option<EnrichmentPipeline>,
}

impl Icd11ServiceBuilder {
    pub fn new(config: Icd11Config) -> Self {
        Self {
            config,
            cache_config: CacheConfig::default(),
            scraping: ScrapingConfig::default(),
            enhanced: EnhancedBrowserConfig::default(),
            clock: None,
            cache: None,
            scraper: None,
            enhanced_browser: None,
            pipeline: None,
        }
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn scraping(mut self, config: ScrapingConfig) -> Self {
        self.scraping = config;
        self
    }

    pub fn enhanced_browser_config(mut self, config: EnhancedBrowserConfig) -> Self {
        self.enhanced = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn scraper(mut self, scraper: Arc<dyn BrowserScraper>) -> Self {
        self.scraper = Some(scraper);
        self
    }

    pub fn enhanced_browser(mut self, browser: Arc<dyn EnhancedBrowser>) -> Self {
        self.enhanced_browser = Some(browser);
        self
    }

    pub fn pipeline(mut self, pipeline: EnrichmentPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn build(self) -> Result<Icd11Service> {
        if self.config.api_root.trim().is_empty() {
            return Err(Icd11Error::configuration("icd11.api_root must not be empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(self.config.timeout())
            .build()
            .map_err(|e| Icd11Error::configuration(format!("failed to build HTTP client: {e}")))?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(LocalCacheStore::with_clock(clock.clone())));
        let config = Arc::new(self.config);

        let tokens = Arc::new(TokenManager::new(
            http.clone(),
            &config,
            cache.clone(),
            clock,
        ));
        let executor = Arc::new(RequestExecutor::new(
            http.clone(),
            tokens.clone(),
            config.clone(),
        ));

        let scraper = match self.scraper {
            Some(scraper) => self.scraping.enabled.then_some(scraper),
            None if self.scraping.enabled => Some(
                Arc::new(HtmlBrowserScraper::new(http.clone(), &config)) as Arc<dyn BrowserScraper>
            ),
            None => None,
        };

        let enhanced_browser = match (self.enhanced_browser, self.enhanced.active_url()) {
            (Some(browser), _) => Some(browser),
            (None, Some(url)) => {
                Some(Arc::new(HttpEnhancedBrowser::new(http, url)) as Arc<dyn EnhancedBrowser>)
            }
            (None, None) => None,
        };

        tracing::debug!(
            release = %config.release,
            linearization = %config.linearization,
            scraping = scraper.is_some(),
            enhanced_browser = enhanced_browser.is_some(),
            "ICD-11 service configured"
        );

        Ok(Icd11Service {
            config,
            tokens,
            executor,
            cache,
            entity_ttl: self.cache_config.entity_ttl(),
            ancestors_ttl: self.cache_config.ancestors_ttl(),
            scraper,
            enhanced_browser,
            pipeline: self.pipeline.unwrap_or_else(EnrichmentPipeline::standard),
        })
    }
}
