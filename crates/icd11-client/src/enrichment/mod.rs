//! Detailed disease records assembled from every source the WHO exposes.
//!
//! ## Pipeline
//!
//! An [`EnrichmentPipeline`] is an ordered list of [`EnrichmentStrategy`]
//! values folded over a partial [`Entity`]:
//!
//! ```text
//! search -> codeinfo -> stem -> title search -> scrape title -> entity
//!   -> definition/inclusion/exclusion -> foundation -> normalize
//!   -> browserDescription -> components -> scrape -> enhanced -> placeholder
//! ```
//!
//! Each strategy sees the record built so far, decides whether it applies and
//! contributes a partial entity. Contributions merge first-writer-wins, so an
//! earlier source always beats a later one. Failures are logged and skipped.
//! The fold stops as soon as the record is complete.

mod strategies;

use async_trait::async_trait;

use crate::cache::{self, keys};
use crate::service::Icd11Service;
use icd11_core::uri::{last_segment, numeric_id};
use icd11_core::{Entity, Icd11Error, Result, fields};

pub use strategies::{
    BrowserScrape, CodeInfo, EnhancedBrowserLookup, FoundationComponents, FoundationEntity,
    FullEntity, NormalizeDescription, Placeholder, ScrapeTitle, SearchByCode, SearchTitle,
    StemEntity, SubResource,
};

/// Fields whose presence makes a record complete.
pub const COMPLETE_FIELDS: [&str; 5] = [
    fields::TITLE,
    fields::DESCRIPTION,
    fields::DEFINITION,
    fields::INCLUSION,
    fields::EXCLUSION,
];

/// What a strategy can see besides the record itself.
pub struct EnrichmentContext<'a> {
    pub service: &'a Icd11Service,
    pub code: &'a str,
}

impl EnrichmentContext<'_> {
    /// Numeric entity id of the record, taken from `uri`, `foundationUri` or
    /// `linearizationUri` in that order.
    pub fn entity_id(&self, record: &Entity) -> Option<String> {
        [
            fields::URI,
            fields::FOUNDATION_URI,
            fields::LINEARIZATION_URI,
        ]
        .iter()
        .filter_map(|key| record.get_str(key))
        .find_map(|uri| numeric_id(uri).or_else(|| last_segment(uri)))
    }
}

#[async_trait]
pub trait EnrichmentStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> bool;

    /// Fields this strategy can contribute. `Ok(None)` means "tried, nothing
    /// found".
    async fn enrich(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> Result<Option<Entity>>;
}

pub struct EnrichmentPipeline {
    strategies: Vec<Box<dyn EnrichmentStrategy>>,
}

impl EnrichmentPipeline {
    pub fn new(strategies: Vec<Box<dyn EnrichmentStrategy>>) -> Self {
        Self { strategies }
    }

    /// Full ordered pipeline.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(SearchByCode),
            Box::new(CodeInfo),
            Box::new(StemEntity),
            Box::new(SearchTitle),
            Box::new(ScrapeTitle),
            Box::new(FullEntity),
            Box::new(SubResource::definition()),
            Box::new(SubResource::inclusion()),
            Box::new(SubResource::exclusion()),
            Box::new(FoundationEntity),
            Box::new(NormalizeDescription),
            Box::new(SubResource::browser_description()),
            Box::new(FoundationComponents),
            Box::new(BrowserScrape),
            Box::new(EnhancedBrowserLookup),
            Box::new(Placeholder),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn is_complete(record: &Entity) -> bool {
        record.has_all(&COMPLETE_FIELDS)
    }

    pub async fn run(&self, ctx: &EnrichmentContext<'_>) -> Entity {
        let mut record = Entity::new();

        for strategy in &self.strategies {
            if Self::is_complete(&record) {
                tracing::debug!(code = ctx.code, strategy = strategy.name(), "record complete");
                break;
            }
            if !strategy.applies(ctx, &record) {
                continue;
            }

            match strategy.enrich(ctx, &record).await {
                Ok(Some(found)) => {
                    let written = record.merge(found);
                    tracing::debug!(code = ctx.code, strategy = strategy.name(), written, "merged");
                }
                Ok(None) => {
                    tracing::debug!(code = ctx.code, strategy = strategy.name(), "nothing found")
                }
                Err(e) => {
                    tracing::debug!(code = ctx.code, strategy = strategy.name(), error = %e, "failed")
                }
            }
        }

        if let Some(title) = record.text(fields::TITLE) {
            record.insert(fields::TITLE, title.into());
        }
        record
    }
}

impl Icd11Service {
    /// Most complete record obtainable for `code`.
    ///
    /// With the placeholder enabled this only fails on a blank code;
    /// otherwise a code nothing knows about is `NotFound`.
    pub async fn get_detailed_disease_by_code(&self, code: &str) -> Result<Entity> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Icd11Error::validation("code is required"));
        }

        let key = keys::disease(code);
        if let Some(record) = cache::get_json::<Entity>(self.cache.as_ref(), &key).await {
            tracing::debug!(code, "disease served from cache");
            return Ok(record);
        }

        let ctx = EnrichmentContext {
            service: self,
            code,
        };
        let mut record = self.pipeline.run(&ctx).await;

        if record.is_empty() {
            tracing::error!(code, "no source produced data for code");
            return Err(Icd11Error::not_found(format!("no data found for code {code}")));
        }

        record.set_if_absent(fields::CODE, code.into());
        cache::put_json(self.cache.as_ref(), &key, &record, self.entity_ttl).await;
        Ok(record)
    }
}
