mod common;

use std::sync::Arc;

use async_trait::async_trait;
use icd11_client::{
    BrowserScraper, CacheStore, EnhancedBrowser, ManualClock, ScrapedText, ScrapingConfig,
};
use icd11_core::{Icd11Error, Result};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{SEARCH_PATH, builder, mount_token, service};

const CODEINFO_PATH: &str = "/icd/release/11/2024-01/mms/codeinfo";
const LATEST_CODEINFO_PATH: &str = "/icd/release/11/mms/codeinfo";

struct StubScraper;

#[async_trait]
impl BrowserScraper for StubScraper {
    async fn scrape_title(&self, _code: &str) -> Result<Option<String>> {
        Ok(Some("Scraped title".to_string()))
    }

    async fn scrape_description(&self, _code: &str) -> Result<ScrapedText> {
        Ok(ScrapedText {
            title: Some("Ignored".to_string()),
            description: Some("Scraped description".to_string()),
        })
    }
}

struct StubEnhancedBrowser;

#[async_trait]
impl EnhancedBrowser for StubEnhancedBrowser {
    async fn lookup(&self, _code: &str) -> Result<ScrapedText> {
        Ok(ScrapedText {
            title: Some("Enhanced title".to_string()),
            description: Some("Enhanced description".to_string()),
        })
    }
}

#[tokio::test]
async fn test_earlier_source_wins() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    let foundation_uri = format!("{}/icd/foundation/777", server.uri());
    Mock::given(method("GET"))
        .and(path(format!("{CODEINFO_PATH}/MD12")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "MD12",
            "title": "Tos",
            "description": "A",
            "foundationUri": foundation_uri
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/foundation/777"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "description": "B",
            "definition": "Reflejo"
        })))
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("MD12").await.unwrap();

    assert_eq!(record.get_str("description"), Some("A"));
    assert_eq!(record.get_str("definition"), Some("Reflejo"));
    assert_eq!(record.get_str("title"), Some("Tos"));
    assert!(!record.has("title_not_found"));
}

#[tokio::test]
async fn test_placeholder_when_nothing_resolves() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("ZZ99").await.unwrap();

    assert_eq!(record.get_str("title"), Some("Código ZZ99"));
    assert_eq!(record.get("title_not_found"), Some(&json!(true)));
    assert_eq!(record.get_str("code"), Some("ZZ99"));
    assert!(service.cache().has("icd11_disease_ZZ99").await);
}

#[tokio::test]
async fn test_disabled_placeholder_is_not_found() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;

    let clock = ManualClock::starting_now();
    let mut config = common::config(&server);
    config.placeholder_on_miss = false;
    let service = icd11_client::Icd11Service::builder(config)
        .clock(Arc::new(clock))
        .scraping(ScrapingConfig { enabled: false })
        .build()
        .unwrap();

    let err = service.get_detailed_disease_by_code("ZZ99").await.unwrap_err();
    assert!(matches!(err, Icd11Error::NotFound(_)));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_blank_code_is_validation_error() {
    let server = MockServer::start().await;
    let service = service(&server, &ManualClock::starting_now());

    assert!(matches!(
        service.get_detailed_disease_by_code(" ").await,
        Err(Icd11Error::Validation(_))
    ));
}

#[tokio::test]
async fn test_search_prefers_exact_over_prefix_hit() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "destinationEntities": [
                {"theCode": "MD12.0", "title": "Prefix"},
                {"theCode": "MD12", "title": "<em>Exact</em>"}
            ]
        })))
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("MD12").await.unwrap();

    assert_eq!(record.get_str("title"), Some("Exact"));
    assert_eq!(record.get_str("code"), Some("MD12"));
}

#[tokio::test]
async fn test_shorter_code_does_not_match_longer_one() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "destinationEntities": [{"theCode": "MD12", "title": "Tos"}]
        })))
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("MD1").await.unwrap();

    assert_eq!(record.get_str("title"), Some("Código MD1"));
}

#[tokio::test]
async fn test_complete_record_skips_remaining_sources() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(format!("{CODEINFO_PATH}/1A00")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Cólera",
            "description": "Infección intestinal",
            "definition": "Infección por Vibrio cholerae",
            "inclusion": [{"label": "cólera clásico"}],
            "exclusion": [{"label": "diarrea"}],
            "stemId": "http://id.who.int/icd/release/11/2024-01/mms/257068234"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/257068234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "unused"})))
        .expect(0)
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("1A00").await.unwrap();

    assert_eq!(record.get_str("title"), Some("Cólera"));
    assert_eq!(record.get_str("code"), Some("1A00"));
}

#[tokio::test]
async fn test_entity_sub_resources_fill_missing_fields() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "destinationEntities": [{
                "theCode": "CA23",
                "title": "Asma",
                "id": "http://id.who.int/icd/release/11/2024-01/mms/1234"
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": {"@language": "es", "@value": "Otro"},
            "definition": {"@language": "es", "@value": "Enfermedad crónica"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/1234/inclusion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "inclusion": [{"label": {"@value": "asma alérgica"}}]
        })))
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("CA23").await.unwrap();

    assert_eq!(record.get_str("title"), Some("Asma"));
    assert_eq!(record.text("definition"), Some("Enfermedad crónica".to_string()));
    assert_eq!(record.get_str("description"), Some("Enfermedad crónica"));
    assert_eq!(record.get("inclusion").unwrap()[0]["label"]["@value"], "asma alérgica");
    assert!(!record.has("exclusion"));
}

#[tokio::test]
async fn test_scraper_supplies_missing_title_and_description() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;

    let service = builder(&server, &ManualClock::starting_now())
        .scraping(ScrapingConfig { enabled: true })
        .scraper(Arc::new(StubScraper))
        .build()
        .unwrap();
    let record = service.get_detailed_disease_by_code("XA00").await.unwrap();

    assert_eq!(record.get_str("title"), Some("Scraped title"));
    assert_eq!(record.get_str("description"), Some("Scraped description"));
    assert!(!record.has("title_not_found"));
}

#[tokio::test]
async fn test_enhanced_browser_only_fills_empty_fields() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(format!("{CODEINFO_PATH}/XA01")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "Original"})))
        .mount(&server)
        .await;

    let service = builder(&server, &ManualClock::starting_now())
        .enhanced_browser(Arc::new(StubEnhancedBrowser))
        .build()
        .unwrap();
    let record = service.get_detailed_disease_by_code("XA01").await.unwrap();

    assert_eq!(record.get_str("title"), Some("Original"));
    assert_eq!(record.get_str("description"), Some("Enhanced description"));
}

#[tokio::test]
async fn test_disease_served_from_cache() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(format!("{CODEINFO_PATH}/MD12")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "Tos"})))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let first = service.get_detailed_disease_by_code("MD12").await.unwrap();
    let second = service.get_detailed_disease_by_code("md12").await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_codeinfo_falls_back_to_latest_release() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(format!("{CODEINFO_PATH}/MD12")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{LATEST_CODEINFO_PATH}/MD12")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "MD12",
            "title": "Tos"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/MD12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "unused"})))
        .expect(0)
        .mount(&server)
        .await;

    // Neither release answers: the raw entity path is the last variant.
    Mock::given(method("GET"))
        .and(path("/icd/entity/MD13"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "Tos seca"})))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("MD12").await.unwrap();

    assert_eq!(record.get_str("title"), Some("Tos"));
    assert!(!record.has("title_not_found"));

    let record = service.get_detailed_disease_by_code("MD13").await.unwrap();
    assert_eq!(record.get_str("title"), Some("Tos seca"));
}

#[tokio::test]
async fn test_stem_entity_contributes_text_fields_only() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(format!("{CODEINFO_PATH}/2A00")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stemId": "http://id.who.int/icd/release/11/2024-01/mms/5555"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/5555"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Stem title",
            "definition": "Tumor cerebral primario",
            "browserUrl": "http://browser/5555"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("2A00").await.unwrap();

    assert_eq!(record.get_str("title"), Some("Código 2A00"));
    assert_eq!(record.get("title_not_found"), Some(&json!(true)));
    assert_eq!(record.get_str("definition"), Some("Tumor cerebral primario"));
    assert_eq!(record.get_str("description"), Some("Tumor cerebral primario"));
    assert!(!record.has("browserUrl"));
}

#[tokio::test]
async fn test_title_search_retries_with_flexisearch() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("useFlexisearch", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "destinationEntities": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("useFlexisearch", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "destinationEntities": [{"theCode": "MD12", "title": "<em>Tos</em>"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("MD12").await.unwrap();

    assert_eq!(record.get_str("title"), Some("Tos"));
    assert!(!record.has("title_not_found"));
}

#[tokio::test]
async fn test_browser_description_is_unwrapped() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "destinationEntities": [{
                "theCode": "CA23",
                "title": "Asma",
                "id": "http://id.who.int/icd/release/11/2024-01/mms/4321"
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/4321"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "Asma"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/4321/browserDescription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "browserDescription": {"@language": "es", "@value": "Inflamación de las vías aéreas"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("CA23").await.unwrap();

    assert_eq!(
        record.text("description"),
        Some("Inflamación de las vías aéreas".to_string())
    );
    assert!(!record.has("browserDescription"));
}

#[tokio::test]
async fn test_component_lookups_stop_once_fields_are_known() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600).await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "destinationEntities": [{
                "theCode": "9C61",
                "title": "Glaucoma",
                "id": "http://id.who.int/icd/release/11/2024-01/mms/999"
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/entity/999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Glaucoma",
            "inclusion": [{"label": {"@value": "glaucoma crónico"}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/release/11/2024-01/mms/999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "longDefinition": {"@value": "Daño progresivo del nervio óptico"},
            "exclusion": [{"label": {"@value": "hipertensión ocular"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/icd/release/11/mms/999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "description": "unused"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let service = service(&server, &ManualClock::starting_now());
    let record = service.get_detailed_disease_by_code("9C61").await.unwrap();

    assert_eq!(
        record.text("description"),
        Some("Daño progresivo del nervio óptico".to_string())
    );
    assert_eq!(record.get("inclusion").unwrap()[0]["label"]["@value"], "glaucoma crónico");
    assert_eq!(record.get("exclusion").unwrap()[0]["label"]["@value"], "hipertensión ocular");
}
