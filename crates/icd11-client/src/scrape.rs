//! Last-resort text extraction from the public ICD-11 browser.
//!
//! The browser serves a JSON concept endpoint and an HTML concept page for
//! every code. Both are read without credentials; markup is matched with a
//! fixed set of patterns and anything unrecognised yields nothing.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Icd11Config;
use icd11_core::{Entity, Icd11Error, Result, fields, strip_markup, text_of};

static HEADING_TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<h[12][^>]*class="[^"]*title[^"]*"[^>]*>(.*?)</h[12]>"#)
        .expect("Invalid heading title regex")
});

static H1_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("Invalid h1 regex"));

static DEFINITION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div[^>]*class="[^"]*definition[^"]*"[^>]*>(.*?)</div>"#)
        .expect("Invalid definition regex")
});

static META_DESCRIPTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta\s+name="description"\s+content="([^"]*)""#)
        .expect("Invalid meta description regex")
});

/// Text recovered for a code. Either side may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedText {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ScrapedText {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }

    /// Fill whichever side is still missing from `other`.
    pub fn or(self, other: ScrapedText) -> ScrapedText {
        ScrapedText {
            title: self.title.or(other.title),
            description: self.description.or(other.description),
        }
    }

    pub fn into_entity(self) -> Entity {
        Entity::from_pairs(
            [
                (fields::TITLE, self.title),
                (fields::DESCRIPTION, self.description),
            ]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, Value::String(v)))),
        )
    }
}

#[async_trait]
pub trait BrowserScraper: Send + Sync {
    async fn scrape_title(&self, code: &str) -> Result<Option<String>>;

    async fn scrape_description(&self, code: &str) -> Result<ScrapedText>;
}

pub struct HtmlBrowserScraper {
    http: reqwest::Client,
    root: String,
}

impl HtmlBrowserScraper {
    pub fn new(http: reqwest::Client, config: &Icd11Config) -> Self {
        Self {
            http,
            root: format!(
                "{}/{}/{}/{}",
                config.browser_base_url.trim_end_matches('/'),
                config.release,
                config.linearization,
                config.language
            ),
        }
    }

    fn json_url(&self) -> String {
        format!("{}/JsonGetConceptByCode", self.root)
    }

    fn html_url(&self) -> String {
        format!("{}/GetConceptByCode", self.root)
    }

    /// GET `url?code=<code>`; the code is form-encoded so post-coordinated
    /// codes (`5A11&XA1234`) stay a single parameter.
    async fn fetch(&self, url: &str, code: &str) -> Result<String> {
        tracing::debug!(url = %url, code, "fetching browser page");
        let response = self
            .http
            .get(url)
            .query(&[("code", code)])
            .send()
            .await
            .map_err(|e| Icd11Error::transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Icd11Error::transport(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(Icd11Error::upstream(status, body));
        }
        Ok(body)
    }

    async fn scrape_json(&self, code: &str) -> ScrapedText {
        let url = self.json_url();
        match self.fetch(&url, code).await {
            Ok(body) => match serde_json::from_str::<Value>(&body) {
                Ok(value) => parse_concept_json(&value, code),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "browser JSON endpoint returned non-JSON");
                    ScrapedText::default()
                }
            },
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "browser JSON endpoint unavailable");
                ScrapedText::default()
            }
        }
    }

    async fn scrape_html(&self, code: &str) -> ScrapedText {
        let url = self.html_url();
        match self.fetch(&url, code).await {
            Ok(body) => parse_concept_html(&body, code),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "browser page unavailable");
                ScrapedText::default()
            }
        }
    }
}

#[async_trait]
impl BrowserScraper for HtmlBrowserScraper {
    async fn scrape_title(&self, code: &str) -> Result<Option<String>> {
        if let Some(title) = self.scrape_json(code).await.title {
            return Ok(Some(title));
        }
        Ok(self.scrape_html(code).await.title)
    }

    async fn scrape_description(&self, code: &str) -> Result<ScrapedText> {
        let scraped = self.scrape_json(code).await;
        if scraped.title.is_some() && scraped.description.is_some() {
            return Ok(scraped);
        }
        Ok(scraped.or(self.scrape_html(code).await))
    }
}

/// Read title and description from the browser's JSON concept payload.
pub fn parse_concept_json(value: &Value, code: &str) -> ScrapedText {
    let title = value
        .get("title")
        .and_then(text_of)
        .map(|title| clean_title(&title, code))
        .filter(|title| !title.is_empty());
    let description = ["definition", "description", "longDefinition"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find_map(text_of)
        .map(|text| strip_markup(&text));
    ScrapedText { title, description }
}

/// Read title and description from a browser HTML concept page.
pub fn parse_concept_html(html: &str, code: &str) -> ScrapedText {
    let title = [&*HEADING_TITLE_REGEX, &*H1_REGEX]
        .iter()
        .find_map(|regex| first_capture(regex, html))
        .map(|title| clean_title(&title, code))
        .filter(|title| !title.is_empty());
    let description = [&*DEFINITION_REGEX, &*META_DESCRIPTION_REGEX]
        .iter()
        .find_map(|regex| first_capture(regex, html));
    ScrapedText { title, description }
}

fn first_capture(regex: &Regex, haystack: &str) -> Option<String> {
    regex
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| strip_markup(m.as_str()))
        .filter(|text| !text.is_empty())
}

/// Drop markup and a leading copy of the code (`MD12 Tos` -> `Tos`).
fn clean_title(raw: &str, code: &str) -> String {
    let title = strip_markup(raw);
    let code = code.trim();
    if !code.is_empty()
        && title.len() > code.len()
        && title.is_char_boundary(code.len())
        && title[..code.len()].eq_ignore_ascii_case(code)
        && title[code.len()..].starts_with(char::is_whitespace)
    {
        return title[code.len()..].trim().to_string();
    }
    title
}
