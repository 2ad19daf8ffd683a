//! Authenticated calls against the WHO entity API.

use std::sync::Arc;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use serde_json::{Map, Value};

use crate::config::Icd11Config;
use crate::token::TokenManager;
use icd11_core::uri::is_absolute;
use icd11_core::{Icd11Error, Result, is_meaningful};

/// HTTP verbs supported by [`RequestExecutor::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct RequestExecutor {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    config: Arc<Icd11Config>,
}

impl RequestExecutor {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenManager>, config: Arc<Icd11Config>) -> Self {
        Self {
            http,
            tokens,
            config,
        }
    }

    /// Absolute URLs pass through; anything else is joined to the entity base.
    pub fn resolve_url(&self, path: &str) -> String {
        let path = path.trim();
        if is_absolute(path) {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.entity_base(),
                path.trim_start_matches('/')
            )
        }
    }

    /// Issue an authenticated request and return the decoded JSON body.
    ///
    /// `releaseId`, `linearization` and `language` are appended unless the
    /// caller already set them. GET/DELETE send parameters as the query
    /// string, POST/PUT as a JSON object body.
    pub async fn request(
        &self,
        path: &str,
        params: &[(&str, String)],
        method: Method,
    ) -> Result<Value> {
        let token = self.tokens.get_token().await?;
        let url = self.resolve_url(path);
        let params = self.with_common_params(params);

        tracing::debug!(url = %url, method = %method, "ICD-11 request");

        let builder = match method {
            Method::Get => self.http.get(&url).query(&params),
            Method::Delete => self.http.delete(&url).query(&params),
            Method::Post => self.http.post(&url).json(&params_object(&params)),
            Method::Put => self.http.put(&url).json(&params_object(&params)),
        };

        let response = builder
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, &self.config.language)
            .header("API-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, method = %method, error = %e, "ICD-11 request failed");
                Icd11Error::transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            tracing::error!(url = %url, status, error = %e, "failed to read ICD-11 response");
            Icd11Error::transport(e.to_string())
        })?;

        if !(200..300).contains(&status) {
            tracing::error!(url = %url, status, "ICD-11 request returned an error status");
            return Err(Icd11Error::upstream(status, body));
        }

        parse_body(status, &body).inspect_err(|e| {
            tracing::error!(url = %url, status, error = %e, "unusable ICD-11 response");
        })
    }

    fn with_common_params(&self, params: &[(&str, String)]) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = params
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();

        let common = [
            ("releaseId", &self.config.release),
            ("linearization", &self.config.linearization),
            ("language", &self.config.language),
        ];
        for (key, value) in common {
            if !merged.iter().any(|(existing, _)| existing == key) {
                merged.push((key.to_string(), value.clone()));
            }
        }
        merged
    }
}

fn params_object(params: &[(String, String)]) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect()
}

/// Decode a 2xx body. Blank bodies and empty JSON values are treated as an
/// upstream failure.
fn parse_body(status: u16, body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Err(Icd11Error::upstream(status, "empty response"));
    }
    let value: Value = serde_json::from_str(body)?;
    if !is_meaningful(&value) {
        return Err(Icd11Error::upstream(status, "empty response"));
    }
    Ok(value)
}
