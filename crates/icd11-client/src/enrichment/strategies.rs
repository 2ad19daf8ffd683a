use async_trait::async_trait;
use serde_json::Value;

use super::{EnrichmentContext, EnrichmentStrategy};
use crate::request::Method;
use crate::search::{SearchOptions, hit_to_entity};
use icd11_core::uri::numeric_id;
use icd11_core::{Entity, Result, fields};

/// Fields a stem entity may contribute.
const STEM_FIELDS: [&str; 6] = [
    fields::DEFINITION,
    fields::DESCRIPTION,
    fields::LONG_DEFINITION,
    fields::FULLY_SPECIFIED_NAME,
    fields::INCLUSION,
    fields::EXCLUSION,
];

/// Fields taken from a foundation entity.
const FOUNDATION_FIELDS: [&str; 5] = [
    fields::DESCRIPTION,
    fields::DEFINITION,
    fields::LONG_DEFINITION,
    fields::INCLUSION,
    fields::EXCLUSION,
];

/// Fields taken from each component lookup.
const COMPONENT_FIELDS: [&str; 6] = [
    fields::DESCRIPTION,
    fields::DEFINITION,
    fields::LONG_DEFINITION,
    fields::FULLY_SPECIFIED_NAME,
    fields::INCLUSION,
    fields::EXCLUSION,
];

/// Sources a description can be derived from, in order.
const DESCRIPTION_SOURCES: [&str; 4] = [
    fields::DEFINITION,
    fields::LONG_DEFINITION,
    fields::BROWSER_DESCRIPTION,
    fields::FULLY_SPECIFIED_NAME,
];

fn derived_description(record: &Entity) -> Option<String> {
    DESCRIPTION_SOURCES.iter().find_map(|key| record.text(key))
}

fn non_empty(value: Value) -> Option<Entity> {
    Entity::from_value(value).filter(|entity| !entity.is_empty())
}

/// Literal search of the code across every search endpoint.
pub struct SearchByCode;

#[async_trait]
impl EnrichmentStrategy for SearchByCode {
    fn name(&self) -> &'static str {
        "search_by_code"
    }

    fn applies(&self, _ctx: &EnrichmentContext<'_>, _record: &Entity) -> bool {
        true
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, _record: &Entity) -> Result<Option<Entity>> {
        let options = SearchOptions::exact();
        for url in ctx.service.config.search_urls() {
            match ctx.service.search_at(&url, ctx.code, &options).await {
                Ok(response) => {
                    if let Some(hit) = response.find_code(ctx.code, true) {
                        return Ok(Some(hit_to_entity(hit)));
                    }
                }
                Err(e) => tracing::debug!(url = %url, error = %e, "search endpoint failed"),
            }
        }
        Ok(None)
    }
}

/// Codeinfo endpoints; the first non-empty answer wins.
pub struct CodeInfo;

#[async_trait]
impl EnrichmentStrategy for CodeInfo {
    fn name(&self) -> &'static str {
        "code_info"
    }

    fn applies(&self, _ctx: &EnrichmentContext<'_>, _record: &Entity) -> bool {
        true
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, _record: &Entity) -> Result<Option<Entity>> {
        for url in ctx.service.config.codeinfo_urls(ctx.code) {
            match ctx.service.request(&url, &[], Method::Get).await {
                Ok(value) => {
                    if let Some(entity) = non_empty(value) {
                        return Ok(Some(entity));
                    }
                    tracing::warn!(url = %url, "codeinfo returned a non-object payload");
                }
                Err(e) => tracing::debug!(url = %url, error = %e, "codeinfo variant failed"),
            }
        }
        Ok(None)
    }
}

/// Textual fields of the entity named by `stemId`.
pub struct StemEntity;

#[async_trait]
impl EnrichmentStrategy for StemEntity {
    fn name(&self) -> &'static str {
        "stem_entity"
    }

    fn applies(&self, _ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        record.has(fields::STEM_ID)
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> Result<Option<Entity>> {
        let Some(id) = record.get_str(fields::STEM_ID).and_then(numeric_id) else {
            tracing::warn!(code = ctx.code, "stemId without a numeric id");
            return Ok(None);
        };
        let stem = ctx.service.get_entity(&id).await?;
        Ok(non_empty(stem).map(|entity| entity.select(&STEM_FIELDS)))
    }
}

/// Flexisearch across the search endpoints until a hit carries a title.
pub struct SearchTitle;

#[async_trait]
impl EnrichmentStrategy for SearchTitle {
    fn name(&self) -> &'static str {
        "search_title"
    }

    fn applies(&self, _ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        !record.has(fields::TITLE)
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, _record: &Entity) -> Result<Option<Entity>> {
        let options = SearchOptions::fuzzy();
        for url in ctx.service.config.search_urls() {
            match ctx.service.search_at(&url, ctx.code, &options).await {
                Ok(response) => {
                    let entity = response.find_code(ctx.code, true).map(hit_to_entity);
                    if let Some(entity) = entity.filter(|e| e.has(fields::TITLE)) {
                        return Ok(Some(entity));
                    }
                }
                Err(e) => tracing::debug!(url = %url, error = %e, "title search failed"),
            }
        }
        Ok(None)
    }
}

/// Title from the public browser page.
pub struct ScrapeTitle;

#[async_trait]
impl EnrichmentStrategy for ScrapeTitle {
    fn name(&self) -> &'static str {
        "scrape_title"
    }

    fn applies(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        ctx.service.scraper.is_some() && !record.has(fields::TITLE)
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, _record: &Entity) -> Result<Option<Entity>> {
        let Some(scraper) = &ctx.service.scraper else {
            return Ok(None);
        };
        let title = scraper.scrape_title(ctx.code).await?;
        Ok(title.map(|title| Entity::from_pairs([(fields::TITLE, Value::String(title))])))
    }
}

/// The entity itself, by the id captured so far.
pub struct FullEntity;

#[async_trait]
impl EnrichmentStrategy for FullEntity {
    fn name(&self) -> &'static str {
        "full_entity"
    }

    fn applies(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        ctx.entity_id(record).is_some()
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> Result<Option<Entity>> {
        let Some(id) = ctx.entity_id(record) else {
            return Ok(None);
        };
        Ok(non_empty(ctx.service.get_entity(&id).await?))
    }
}

/// `{id}/{path}` stored under `target` when `target` is still missing.
pub struct SubResource {
    name: &'static str,
    path: &'static str,
    target: &'static str,
}

impl SubResource {
    pub fn definition() -> Self {
        Self {
            name: "definition",
            path: "definition",
            target: fields::DEFINITION,
        }
    }

    pub fn inclusion() -> Self {
        Self {
            name: "inclusion",
            path: "inclusion",
            target: fields::INCLUSION,
        }
    }

    pub fn exclusion() -> Self {
        Self {
            name: "exclusion",
            path: "exclusion",
            target: fields::EXCLUSION,
        }
    }

    pub fn browser_description() -> Self {
        Self {
            name: "browser_description",
            path: "browserDescription",
            target: fields::DESCRIPTION,
        }
    }
}

#[async_trait]
impl EnrichmentStrategy for SubResource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn applies(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        !record.has(self.target) && ctx.entity_id(record).is_some()
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> Result<Option<Entity>> {
        let Some(id) = ctx.entity_id(record) else {
            return Ok(None);
        };
        let value = ctx
            .service
            .request(&format!("{id}/{}", self.path), &[], Method::Get)
            .await?;

        // Endpoints answer either with the bare value or wrapped in an object
        // keyed by the resource name.
        let value = match value.get(self.path).or_else(|| value.get(self.target)) {
            Some(inner) => inner.clone(),
            None => value,
        };
        Ok(Some(Entity::from_pairs([(self.target, value)])).filter(|e| !e.is_empty()))
    }
}

/// Textual fields of the foundation entity.
pub struct FoundationEntity;

#[async_trait]
impl EnrichmentStrategy for FoundationEntity {
    fn name(&self) -> &'static str {
        "foundation"
    }

    fn applies(&self, _ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        record.has(fields::FOUNDATION_URI)
            && !record.has_all(&[
                fields::DESCRIPTION,
                fields::DEFINITION,
                fields::LONG_DEFINITION,
            ])
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> Result<Option<Entity>> {
        let Some(uri) = record.get_str(fields::FOUNDATION_URI) else {
            return Ok(None);
        };
        let foundation = ctx.service.request(uri, &[], Method::Get).await?;
        Ok(non_empty(foundation)
            .map(|entity| entity.select(&FOUNDATION_FIELDS))
            .filter(|entity| !entity.is_empty()))
    }
}

/// Description derived from the textual fields already present.
pub struct NormalizeDescription;

#[async_trait]
impl EnrichmentStrategy for NormalizeDescription {
    fn name(&self) -> &'static str {
        "normalize_description"
    }

    fn applies(&self, _ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        !record.has(fields::DESCRIPTION)
    }

    async fn enrich(&self, _ctx: &EnrichmentContext<'_>, record: &Entity) -> Result<Option<Entity>> {
        Ok(derived_description(record)
            .map(|text| Entity::from_pairs([(fields::DESCRIPTION, Value::String(text))])))
    }
}

/// Entity lookups across the foundation and release variants until
/// description, inclusion and exclusion are all known.
pub struct FoundationComponents;

const COMPONENT_TARGETS: [&str; 3] = [fields::DESCRIPTION, fields::INCLUSION, fields::EXCLUSION];

#[async_trait]
impl EnrichmentStrategy for FoundationComponents {
    fn name(&self) -> &'static str {
        "foundation_components"
    }

    fn applies(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        !record.has_all(&COMPONENT_TARGETS) && ctx.entity_id(record).is_some()
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> Result<Option<Entity>> {
        let Some(id) = ctx.entity_id(record) else {
            return Ok(None);
        };

        let mut urls: Vec<String> = record
            .get_str(fields::FOUNDATION_URI)
            .map(str::to_string)
            .into_iter()
            .collect();
        urls.extend(ctx.service.config.component_urls(&id));

        let mut seen = record.clone();
        let mut gained = Entity::new();
        for url in urls {
            if seen.has_all(&COMPONENT_TARGETS) {
                break;
            }
            let component = match ctx.service.request(&url, &[], Method::Get).await {
                Ok(value) => non_empty(value),
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "component lookup failed");
                    continue;
                }
            };
            let Some(component) = component else { continue };

            let mut selected = component.select(&COMPONENT_FIELDS);
            if let Some(description) = derived_description(&selected) {
                selected.set_if_absent(fields::DESCRIPTION, Value::String(description));
            }
            seen.merge(selected.clone());
            gained.merge(selected);
        }

        Ok(Some(gained).filter(|entity| !entity.is_empty()))
    }
}

/// Title and description scraped from the public browser.
pub struct BrowserScrape;

#[async_trait]
impl EnrichmentStrategy for BrowserScrape {
    fn name(&self) -> &'static str {
        "browser_scrape"
    }

    fn applies(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        ctx.service.scraper.is_some()
            && !record.has_all(&[fields::TITLE, fields::DESCRIPTION])
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, _record: &Entity) -> Result<Option<Entity>> {
        let Some(scraper) = &ctx.service.scraper else {
            return Ok(None);
        };
        let scraped = scraper.scrape_description(ctx.code).await?;
        Ok(Some(scraped.into_entity()).filter(|entity| !entity.is_empty()))
    }
}

/// External enhanced-browser service, consulted last.
pub struct EnhancedBrowserLookup;

#[async_trait]
impl EnrichmentStrategy for EnhancedBrowserLookup {
    fn name(&self) -> &'static str {
        "enhanced_browser"
    }

    fn applies(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        ctx.service.enhanced_browser.is_some()
            && !record.has_all(&[fields::TITLE, fields::DESCRIPTION])
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, _record: &Entity) -> Result<Option<Entity>> {
        let Some(browser) = &ctx.service.enhanced_browser else {
            return Ok(None);
        };
        let found = browser.lookup(ctx.code).await?;
        Ok(Some(found.into_entity()).filter(|entity| !entity.is_empty()))
    }
}

/// Synthetic title for codes nothing could name.
pub struct Placeholder;

#[async_trait]
impl EnrichmentStrategy for Placeholder {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn applies(&self, ctx: &EnrichmentContext<'_>, record: &Entity) -> bool {
        ctx.service.config.placeholder_on_miss && !record.has(fields::TITLE)
    }

    async fn enrich(&self, ctx: &EnrichmentContext<'_>, _record: &Entity) -> Result<Option<Entity>> {
        let title = format!(
            "{} {}",
            ctx.service.config.placeholder_title_prefix.trim(),
            ctx.code
        );
        Ok(Some(Entity::from_pairs([
            (fields::TITLE, Value::String(title)),
            (fields::TITLE_NOT_FOUND, Value::Bool(true)),
        ])))
    }
}
