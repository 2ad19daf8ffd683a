#![allow(dead_code)]

use std::sync::Arc;

use icd11_client::{
    Icd11Config, Icd11Service, Icd11ServiceBuilder, LocalCacheStore, ManualClock, ScrapingConfig,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/connect/token";
pub const SEARCH_PATH: &str = "/icd/release/11/2024-01/mms/search";

pub fn config(server: &MockServer) -> Icd11Config {
    Icd11Config {
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
        token_url: format!("{}{TOKEN_PATH}", server.uri()),
        api_root: format!("{}/icd", server.uri()),
        browser_base_url: format!("{}/browse", server.uri()),
        timeout_secs: 5,
        ..Default::default()
    }
}

/// Builder wired to `server` with a manual clock, a local cache sharing that
/// clock and scraping turned off.
pub fn builder(server: &MockServer, clock: &ManualClock) -> Icd11ServiceBuilder {
    let clock = Arc::new(clock.clone());
    Icd11Service::builder(config(server))
        .clock(clock.clone())
        .cache(Arc::new(LocalCacheStore::with_clock(clock)))
        .scraping(ScrapingConfig { enabled: false })
}

pub fn service(server: &MockServer, clock: &ManualClock) -> Icd11Service {
    builder(server, clock).build().expect("service should build")
}

pub async fn mount_token(server: &MockServer, token: &str, expires_in: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "expires_in": expires_in,
            "token_type": "Bearer",
            "scope": "icdapi_access"
        })))
        .mount(server)
        .await;
}
