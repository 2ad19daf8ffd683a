//! OAuth2 client-credentials token for the WHO API.
//!
//! The token lives in the shared [`CacheStore`] under [`keys::TOKEN`] as
//! `{token, expires_at}`. Callers never coordinate refreshes: two concurrent
//! misses both fetch and the last successful write wins.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{self, CacheStore, keys};
use crate::clock::Clock;
use crate::config::Icd11Config;
use icd11_core::{Icd11Error, Result};

/// `expires_in` assumed when the identity provider omits it.
const DEFAULT_EXPIRES_IN: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedToken {
    token: String,
    /// Unix timestamp (seconds)
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

pub struct TokenManager {
    http: reqwest::Client,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        config: &Icd11Config,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            cache,
            clock,
            token_url: config.token_url.clone(),
            client_id: config.client_id.trim().to_string(),
            client_secret: config.client_secret.trim().to_string(),
            scope: config.scope.clone(),
        }
    }

    /// Return a valid bearer token, fetching a new one when the cached entry
    /// is missing or expired.
    ///
    /// On failure the cached entry is removed so the next call starts clean.
    pub async fn get_token(&self) -> Result<String> {
        let now = self.clock.now().unix_timestamp();
        if let Some(cached) = cache::get_json::<CachedToken>(self.cache.as_ref(), keys::TOKEN).await
            && cached.expires_at > now
        {
            tracing::trace!("using cached access token");
            return Ok(cached.token);
        }

        match self.fetch_token().await {
            Ok(token) => Ok(token),
            Err(e) => {
                self.cache.forget(keys::TOKEN).await;
                tracing::error!(error = %e, "failed to obtain ICD-11 access token");
                Err(match e {
                    Icd11Error::Auth(_) => e,
                    other => Icd11Error::auth(format!("token request failed: {other}")),
                })
            }
        }
    }

    /// Drop the cached token.
    pub async fn invalidate(&self) {
        self.cache.forget(keys::TOKEN).await;
    }

    async fn fetch_token(&self) -> Result<String> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(Icd11Error::auth("ICD-11 client id and secret are not configured"));
        }

        tracing::debug!(url = %self.token_url, "requesting ICD-11 access token");

        let params = [
            ("grant_type", "client_credentials"),
            ("scope", self.scope.as_str()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| Icd11Error::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Icd11Error::auth(format!("HTTP {status} - {body}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Icd11Error::auth(format!("failed to parse token response: {e}")))?;

        let token = body
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| Icd11Error::auth("token response carried no access_token"))?;
        let expires_in = body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN).max(1);

        let cached = CachedToken {
            token: token.clone(),
            expires_at: self.clock.now().unix_timestamp() + expires_in as i64,
        };
        cache::put_json(
            self.cache.as_ref(),
            keys::TOKEN,
            &cached,
            Duration::from_secs(expires_in),
        )
        .await;

        tracing::info!(expires_in, "obtained ICD-11 access token");
        Ok(token)
    }
}
