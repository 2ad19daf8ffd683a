//! Cached lookups: code to entity, ancestor trail, entity by reference.

use serde_json::Value;

use crate::cache::{self, keys};
use crate::request::Method;
use crate::search::{SearchOptions, hit_to_entity};
use crate::service::Icd11Service;
use icd11_core::uri::last_segment;
use icd11_core::{Ancestor, Entity, EntityRefs, Icd11Error, Result, parent_items};

impl Icd11Service {
    /// Resolve a code to its entity. Lookups never fail: every strategy
    /// error is logged and the next one is tried.
    ///
    /// Order: cache, literal search, flexisearch, direct entity lookup.
    pub async fn find_by_code(&self, code: &str) -> Option<Entity> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }

        let key = keys::code(code);
        if let Some(entity) = cache::get_json::<Entity>(self.cache.as_ref(), &key).await {
            tracing::debug!(code, "code served from cache");
            return Some(entity);
        }

        match self.find_by_code_uncached(code).await {
            Some(entity) => {
                cache::put_json(self.cache.as_ref(), &key, &entity, self.entity_ttl).await;
                Some(entity)
            }
            None => {
                tracing::error!(code, "code could not be resolved by any strategy");
                None
            }
        }
    }

    async fn find_by_code_uncached(&self, code: &str) -> Option<Entity> {
        let searches = [
            ("search", SearchOptions::exact()),
            ("flexisearch", SearchOptions::fuzzy()),
        ];
        for (strategy, options) in searches {
            match self.search(code, &options).await {
                Ok(response) => {
                    if let Some(hit) = response.find_code(code, false) {
                        tracing::debug!(code, strategy, "code resolved");
                        return Some(hit_to_entity(hit));
                    }
                    tracing::debug!(code, strategy, "no exact match");
                }
                Err(e) => tracing::debug!(code, strategy, error = %e, "lookup failed"),
            }
        }

        match self.get_entity(code).await {
            Ok(value) => {
                let entity = Entity::from_value(value).filter(|entity| !entity.is_empty());
                if entity.is_some() {
                    tracing::debug!(code, strategy = "direct", "code resolved");
                }
                entity
            }
            Err(e) => {
                tracing::debug!(code, strategy = "direct", error = %e, "lookup failed");
                None
            }
        }
    }

    /// Breadcrumb trail of an entity, walked two levels up and returned
    /// root-most first.
    ///
    /// A failure fetching the direct parents yields an empty (uncached)
    /// trail; a failing grandparent lookup only drops that branch.
    pub async fn get_ancestors(&self, entity_id: &str) -> Vec<Ancestor> {
        let key = keys::ancestors(entity_id);
        if let Some(ancestors) = cache::get_json::<Vec<Ancestor>>(self.cache.as_ref(), &key).await {
            return ancestors;
        }

        let parents = match self.get_parents(entity_id).await {
            Ok(payload) => parent_items(&payload),
            Err(e) => {
                tracing::warn!(entity_id, error = %e, "failed to fetch parents");
                return Vec::new();
            }
        };

        let untitled = self.config.untitled_label.as_str();
        let mut trail = Vec::new();
        for item in &parents {
            let Some(parent) = Ancestor::from_parent(item, untitled) else {
                tracing::warn!(entity_id, "unrecognised parent item");
                continue;
            };

            let parent_id = parent.id.clone();
            trail.push(parent);
            if parent_id.is_empty() {
                continue;
            }

            match self.get_parents(&parent_id).await {
                Ok(payload) => trail.extend(
                    parent_items(&payload)
                        .iter()
                        .filter_map(|grand| Ancestor::from_parent(grand, untitled)),
                ),
                Err(e) => {
                    tracing::debug!(parent_id = %parent_id, error = %e, "grandparents unavailable")
                }
            }
        }
        trail.reverse();

        cache::put_json(self.cache.as_ref(), &key, &trail, self.ancestors_ttl).await;
        trail
    }

    /// Resolve an entity from whichever references the caller has.
    ///
    /// The returned entity starts from the caller's references, so they win
    /// over anything the upstream returns. `Ok(None)` when nothing resolves.
    pub async fn get_entity_by_uri(&self, refs: &EntityRefs) -> Result<Option<Entity>> {
        if refs.is_empty() {
            return Err(Icd11Error::validation(
                "one of uri, foundationUri, linearizationUri or code is required",
            ));
        }

        let key = keys::entity_uri(refs)?;
        if let Some(entity) = cache::get_json::<Entity>(self.cache.as_ref(), &key).await {
            tracing::debug!("entity served from cache");
            return Ok(Some(entity));
        }

        let Some(resolved) = self.resolve_refs(refs).await else {
            tracing::info!(refs = ?refs, "entity could not be resolved");
            return Ok(None);
        };

        let mut entity = refs.to_entity();
        entity.merge(resolved);
        cache::put_json(self.cache.as_ref(), &key, &entity, self.entity_ttl).await;
        Ok(Some(entity))
    }

    async fn resolve_refs(&self, refs: &EntityRefs) -> Option<Entity> {
        if let Some(id) = refs.uri().and_then(last_segment) {
            match self.get_entity(&id).await {
                Ok(value) => {
                    if let Some(entity) = non_empty(value) {
                        return Some(entity);
                    }
                }
                Err(e) => tracing::debug!(strategy = "uri", error = %e, "lookup failed"),
            }
        }

        let direct = [
            ("foundation_uri", refs.foundation_uri()),
            ("linearization_uri", refs.linearization_uri()),
        ];
        for (strategy, uri) in direct {
            let Some(uri) = uri else { continue };
            match self.request(uri, &[], Method::Get).await {
                Ok(value) => {
                    if let Some(entity) = non_empty(value) {
                        return Some(entity);
                    }
                }
                Err(e) => tracing::debug!(strategy, error = %e, "lookup failed"),
            }
        }

        match refs.code() {
            Some(code) => self.find_by_code(code).await,
            None => None,
        }
    }
}

fn non_empty(value: Value) -> Option<Entity> {
    Entity::from_value(value).filter(|entity| !entity.is_empty())
}
