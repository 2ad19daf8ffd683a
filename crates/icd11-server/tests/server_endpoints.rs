use std::net::{Ipv4Addr, SocketAddr};

use assert_json_diff::assert_json_include;
use icd11_client::ScrapingConfig;
use icd11_server::build_app;
use icd11_server::config::AppConfig;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/icd/release/11/2024-01/mms/search";

fn app_config(upstream: &MockServer) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.icd11.client_id = "id".into();
    cfg.icd11.client_secret = "secret".into();
    cfg.icd11.token_url = format!("{}/connect/token", upstream.uri());
    cfg.icd11.api_root = format!("{}/icd", upstream.uri());
    cfg.icd11.timeout_secs = 5;
    cfg.scraping = ScrapingConfig { enabled: false };
    cfg
}

async fn start_upstream() -> MockServer {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connect/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "expires_in": 3600
        })))
        .mount(&upstream)
        .await;
    upstream
}

async fn start_server(cfg: &AppConfig) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let app = build_app(cfg).await.expect("app should build");

    let listener = tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    (format!("http://{addr}"), tx, handle)
}

async fn get_json(url: &str) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_search_returns_raw_and_processed_results() {
    let upstream = start_upstream().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("q", "tos"))
        .and(query_param("useFlexisearch", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "destinationEntities": [{"theCode": "MD12", "title": "<em>Tos</em>"}]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let (base, tx, handle) = start_server(&app_config(&upstream)).await;

    let (status, body) = get_json(&format!("{base}/api/icd11/search?query=tos&useFlexisearch=true")).await;
    assert_eq!(status, 200);
    assert_json_include!(
        actual: body,
        expected: json!({
            "success": true,
            "data": {"error": false},
            "processedResults": [{"theCode": "MD12"}]
        })
    );

    let (status, body) = get_json(&format!("{base}/api/icd11/search?query=")).await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn test_code_lookup_found_and_missing() {
    let upstream = start_upstream().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("q", "MD12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "destinationEntities": [{
                "theCode": "MD12",
                "title": "Tos",
                "id": "http://id.who.int/icd/release/11/2024-01/mms/12345"
            }]
        })))
        .mount(&upstream)
        .await;

    let (base, tx, handle) = start_server(&app_config(&upstream)).await;

    let (status, body) = get_json(&format!("{base}/api/icd11/code/MD12")).await;
    assert_eq!(status, 200);
    assert_json_include!(
        actual: body,
        expected: json!({"success": true, "data": {"code": "MD12", "title": "Tos"}})
    );

    let (status, body) = get_json(&format!("{base}/api/icd11/code/XYZ")).await;
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"], Value::Null);
    assert!(body["message"].as_str().unwrap().contains("XYZ"));

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn test_entity_includes_ancestors_and_degrades_children() {
    let upstream = start_upstream().await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "Tos"})))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/123/children"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/123/parents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "http://id.who.int/icd/entity/200",
            "title": {"@value": "Síntomas respiratorios"},
            "code": "MD1"
        }])))
        .mount(&upstream)
        .await;

    let (base, tx, handle) = start_server(&app_config(&upstream)).await;

    let (status, body) = get_json(&format!("{base}/api/icd11/entity/123")).await;
    assert_eq!(status, 200);
    let ancestors = json!([{"id": "200", "title": "Síntomas respiratorios", "code": "MD1"}]);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["title"], "Tos");
    assert_eq!(body["data"]["ancestors"], ancestors);
    assert_eq!(body["ancestors"], ancestors);
    assert_eq!(body["children"], json!([]));

    // The children endpoint surfaces the upstream failure.
    let (status, body) = get_json(&format!("{base}/api/icd11/entity/123/children")).await;
    assert_eq!(status, 500);
    assert_eq!(body["success"], false);

    let (status, _) = get_json(&format!("{base}/api/icd11/entity/999")).await;
    assert_eq!(status, 404);

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn test_disease_falls_back_to_placeholder() {
    let upstream = start_upstream().await;
    let (base, tx, handle) = start_server(&app_config(&upstream)).await;

    let (status, body) = get_json(&format!("{base}/api/icd11/disease/ZZ99")).await;
    assert_eq!(status, 200);
    assert_json_include!(
        actual: body,
        expected: json!({
            "success": true,
            "data": {"code": "ZZ99", "title": "Código ZZ99", "title_not_found": true}
        })
    );

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn test_entity_by_uri_validation_and_not_found() {
    let upstream = start_upstream().await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/555"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Asma",
            "code": "CA23"
        })))
        .mount(&upstream)
        .await;

    let (base, tx, handle) = start_server(&app_config(&upstream)).await;
    let client = reqwest::Client::new();
    let url = format!("{base}/api/icd11/entity-by-uri");

    let resp = client
        .post(&url)
        .json(&json!({"data": {"uri": "http://id.who.int/icd/entity/555"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_json_include!(
        actual: body,
        expected: json!({
            "success": true,
            "data": {"uri": "http://id.who.int/icd/entity/555", "title": "Asma", "code": "CA23"}
        })
    );

    let resp = client.post(&url).json(&json!({"data": {}})).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = client
        .post(&url)
        .json(&json!({"data": {"code": "XYZ"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn test_get_token_and_health() {
    let upstream = start_upstream().await;
    let (base, tx, handle) = start_server(&app_config(&upstream)).await;

    let (status, body) = get_json(&format!("{base}/api/icd11/get-token")).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"success": true, "token": "tok"}));

    let (status, body) = get_json(&format!("{base}/healthz")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");

    let (status, body) = get_json(&format!("{base}/")).await;
    assert_eq!(status, 200);
    assert_eq!(body["service"], "icd11-gateway");

    let _ = tx.send(());
    let _ = handle.await;
}
