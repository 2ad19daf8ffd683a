//! External "enhanced browser" lookup service.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::scrape::ScrapedText;
use icd11_core::{Icd11Error, Result, text_of};

#[async_trait]
pub trait EnhancedBrowser: Send + Sync {
    async fn lookup(&self, code: &str) -> Result<ScrapedText>;
}

/// Calls `GET {url}/disease/{code}` and reads `title` / `description`,
/// optionally wrapped in a `data` envelope.
pub struct HttpEnhancedBrowser {
    http: reqwest::Client,
    url: String,
}

impl HttpEnhancedBrowser {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `{url}/disease/{code}` with the code percent-encoded as one segment.
    fn disease_url(&self, code: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url).map_err(|e| {
            Icd11Error::configuration(format!("invalid enhanced browser url {}: {e}", self.url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                Icd11Error::configuration(format!("enhanced browser url {} cannot be a base", self.url))
            })?
            .pop_if_empty()
            .extend(["disease", code.trim()]);
        Ok(url)
    }
}

#[async_trait]
impl EnhancedBrowser for HttpEnhancedBrowser {
    async fn lookup(&self, code: &str) -> Result<ScrapedText> {
        let url = self.disease_url(code)?;
        tracing::debug!(url = %url, "enhanced browser lookup");

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Icd11Error::transport(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(Icd11Error::upstream(status, body));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Icd11Error::transport(format!("invalid enhanced browser body: {e}")))?;
        Ok(read_payload(&payload))
    }
}

fn read_payload(payload: &Value) -> ScrapedText {
    let body = payload.get("data").filter(|d| d.is_object()).unwrap_or(payload);
    ScrapedText {
        title: body.get("title").and_then(text_of),
        description: body.get("description").and_then(text_of),
    }
}
