use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::IntoResponse,
};
use icd11_client::SearchOptions;
use icd11_core::EntityRefs;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::server::AppState;

type ApiResult = Result<Json<Value>, ApiError>;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "icd11-gateway",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "cache": state.icd11.cache().stats(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    pub use_flexisearch: Option<bool>,
    pub flat_results: Option<bool>,
    pub highlighting_enabled: Option<bool>,
    pub chapter_filter: Option<String>,
    pub subtree_filter: Option<String>,
}

impl SearchParams {
    fn options(&self) -> SearchOptions {
        let defaults = SearchOptions::default();
        SearchOptions {
            use_flexisearch: self.use_flexisearch.unwrap_or(defaults.use_flexisearch),
            flat_results: self.flat_results.unwrap_or(defaults.flat_results),
            highlighting_enabled: self
                .highlighting_enabled
                .unwrap_or(defaults.highlighting_enabled),
            chapter_filter: non_blank(self.chapter_filter.as_deref()),
            subtree_filter: non_blank(self.subtree_filter.as_deref()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("{what} is required")));
    }
    Ok(trimmed)
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult {
    let query = required(&params.query, "query")?;
    let response = state.icd11.search(query, &params.options()).await?;
    Ok(Json(json!({
        "success": true,
        "data": response.raw,
        "processedResults": response.results,
    })))
}

pub async fn code(State(state): State<AppState>, Path(code): Path<String>) -> ApiResult {
    let code = required(&code, "code")?;
    match state.icd11.find_by_code(code).await {
        Some(entity) => Ok(Json(json!({"success": true, "data": entity}))),
        None => Err(ApiError::not_found(format!("no ICD-11 entity found for code {code}"))),
    }
}

pub async fn entity(State(state): State<AppState>, Path(entity_id): Path<String>) -> ApiResult {
    let entity_id = required(&entity_id, "entityId")?;
    let mut data = state.icd11.get_entity(entity_id).await?;

    let children = match state.icd11.get_children(entity_id).await {
        Ok(children) => children,
        Err(e) => {
            tracing::warn!(entity_id, error = %e, "children lookup failed");
            json!([])
        }
    };
    let ancestors = serde_json::to_value(state.icd11.get_ancestors(entity_id).await)
        .unwrap_or_else(|_| json!([]));

    if let Value::Object(map) = &mut data {
        map.insert("ancestors".into(), ancestors.clone());
    }

    Ok(Json(json!({
        "success": true,
        "data": data,
        "children": children,
        "ancestors": ancestors,
    })))
}

pub async fn children(State(state): State<AppState>, Path(entity_id): Path<String>) -> ApiResult {
    let entity_id = required(&entity_id, "entityId")?;
    let data = state.icd11.get_children(entity_id).await?;
    Ok(Json(json!({"success": true, "data": data})))
}

pub async fn disease(State(state): State<AppState>, Path(code): Path<String>) -> ApiResult {
    let code = required(&code, "code")?;
    let record = state.icd11.get_detailed_disease_by_code(code).await?;
    Ok(Json(json!({"success": true, "data": record})))
}

#[derive(Debug, Default, Deserialize)]
pub struct EntityByUriRequest {
    #[serde(default)]
    pub data: Option<EntityRefs>,
}

pub async fn entity_by_uri(
    State(state): State<AppState>,
    body: Result<Json<EntityByUriRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let refs = request.data.unwrap_or_default();
    match state.icd11.get_entity_by_uri(&refs).await? {
        Some(entity) => Ok(Json(json!({"success": true, "data": entity}))),
        None => Err(ApiError::not_found("no ICD-11 entity matches the given references")),
    }
}

pub async fn get_token(State(state): State<AppState>) -> ApiResult {
    let token = state.icd11.get_token().await?;
    Ok(Json(json!({"success": true, "token": token})))
}
