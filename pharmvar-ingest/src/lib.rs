//! pharmvar-ingest library - pharmacogenomic variant enrichment
//!
//! Enrichment pipeline (upstream clients, normalizer, merge policy,
//! orchestrator, persistence writer, coverage aggregation) plus the
//! read-only query API over the enriched database.

use axum::http::{HeaderValue, Method};
use axum::Router;
use pharmvar_common::PharmvarConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved configuration
    pub config: Arc<PharmvarConfig>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: PharmvarConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let cors = cors_layer(&state.config.api.allowed_origins);

    Router::new()
        .route("/genes", get(api::list_genes))
        .route("/genes/:symbol", get(api::get_gene))
        .route("/genes/:symbol/variants", get(api::list_gene_variants))
        .route("/variants", get(api::list_variants))
        .route("/variants/pathogenic", get(api::list_pathogenic_variants))
        .route("/variants/search/:external_id", get(api::search_variants))
        .route("/summary", get(api::get_summary))
        .route("/quality", get(api::get_quality))
        .merge(api::health_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
