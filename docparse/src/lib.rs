//! # docparse: plain text out of uploaded documents
//!
//! `docparse` is a small HTTP service that accepts a single PDF or Word document, extracts its
//! text, writes the text to disk and answers with a short preview.
//!
//! ## Request Flow
//!
//! A `POST /parse-document` request carries a multipart form with one `document` file part. The
//! handler in [`api::handlers::documents`] checks the declared media type before anything is
//! written, then streams the part into the uploads directory while enforcing the size limit. The
//! staged file is handed to [`extract::extract_text`], which picks an extractor from the file
//! extension and runs it on the blocking pool. The resulting text is written to the output
//! directory as `<stem>-extracted.txt` and the staged upload is removed.
//!
//! Staged uploads never outlive their request: [`storage::StoredFile`] removes the file when it is
//! dropped, so every failure path cleans up as well. Extracted artifacts accumulate and are never
//! removed by the service.
//!
//! Failures map to a JSON body `{"error": "..."}` via [`errors::Error`]. Validation problems are
//! `400`, extraction and storage problems are `500`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use docparse::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = docparse::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     docparse::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod errors;
pub mod extract;
mod openapi;
pub mod storage;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
pub mod types;

use std::time::Duration;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use config::CorsOrigin;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::openapi::ApiDoc;
use crate::storage::StorageLayout;

/// Headroom on top of `max_file_size` for multipart boundaries and part headers
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared state handed to every handler.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .storage(storage)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub storage: StorageLayout,
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let origins = &config.cors.allowed_origins;

    // A literal "*" in an origin list is rejected by tower-http, so the wildcard wins outright
    let allow_origin = if origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut values = Vec::with_capacity(origins.len());
        for origin in origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a trailing slash
                values.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(values)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// Routes: `/healthz`, `/test`, `POST /parse-document`, the OpenAPI document and Scalar docs, and
/// `/internal/metrics` when metrics are enabled. CORS and request tracing wrap everything.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    // Let the handler report oversized files itself; the body limit only stops runaway requests
    let body_limit = usize::try_from(state.config.limits.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let api_routes = Router::new()
        .route("/test", get(api::handlers::status::server_status))
        .route(
            "/parse-document",
            post(api::handlers::documents::parse_document).layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Prepare storage and build the router. Fails if either scratch directory cannot be created.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting docparse with configuration: {:#?}", config);

        let storage = StorageLayout::init(&config.storage).await?;

        let app_state = AppState::builder().config(config.clone()).storage(storage).build();
        let router = build_router(&app_state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "docparse listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
