use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use icd11_client::{Icd11Service, SystemClock, create_cache_store, start_cleanup_task};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::AppConfig, handlers};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub icd11: Arc<Icd11Service>,
}

pub struct Icd11Gateway {
    addr: SocketAddr,
    app: Router,
}

/// Build the ICD-11 service from application config: cache backend first,
/// then the client wired to it.
pub async fn build_service(cfg: &AppConfig) -> anyhow::Result<Icd11Service> {
    let clock = Arc::new(SystemClock);
    let cache = create_cache_store(&cfg.cache, clock.clone()).await;
    start_cleanup_task(cache.clone(), cfg.cache.cleanup_interval());

    if !cfg.icd11.has_credentials() {
        tracing::warn!("icd11.client_id/client_secret not set; upstream calls will fail");
    }
    if cfg.enhanced_browser.enabled && cfg.enhanced_browser.active_url().is_none() {
        tracing::info!("enhanced_browser.url not set; enhanced browser lookups skipped");
    }

    let service = Icd11Service::builder(cfg.icd11.clone())
        .cache_config(cfg.cache.clone())
        .scraping(cfg.scraping.clone())
        .enhanced_browser_config(cfg.enhanced_browser.clone())
        .clock(clock)
        .cache(cache)
        .build()?;
    Ok(service)
}

pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let service = build_service(cfg).await?;
    let state = AppState {
        icd11: Arc::new(service),
    };
    Ok(router(state, cfg.server.body_limit_bytes))
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    let api = Router::new()
        .route("/search", get(handlers::search))
        .route("/code/{code}", get(handlers::code))
        .route("/entity/{entity_id}", get(handlers::entity))
        .route("/entity/{entity_id}/children", get(handlers::children))
        .route("/disease/{code}", get(handlers::disease))
        .route("/entity-by-uri", post(handlers::entity_by_uri))
        .route("/get-token", get(handlers::get_token));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .nest("/api/icd11", api)
        .with_state(state)
        // Middleware stack (order: compression/cors/trace -> body limit)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<Icd11Gateway> {
        let app = build_app(&self.config).await?;

        Ok(Icd11Gateway {
            addr: self.addr,
            app,
        })
    }
}

impl Icd11Gateway {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
