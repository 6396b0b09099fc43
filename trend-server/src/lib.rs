//! trend-server library - time-series CSV merge service
//!
//! Accepts an original CSV plus additional CSVs, aligns the additional
//! series onto the original timestamp grid, and returns the merged CSV with
//! a standalone chart page.

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use trend_common::config::ServiceConfig;

pub mod api;
pub mod archive;
pub mod chart;
pub mod error;
pub mod exports;
pub mod logging;
pub mod merge;
pub mod publish;

pub use crate::error::{ApiError, ApiResult};

use crate::exports::{ExportStore, EXPORTS_URL_PREFIX};
use crate::publish::Publishers;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved service configuration
    pub config: Arc<ServiceConfig>,
    /// Local exports directory
    pub exports: ExportStore,
    /// Enabled publishing targets
    pub publishers: Publishers,
    /// Service startup timestamp
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServiceConfig, http: reqwest::Client) -> Self {
        let exports = ExportStore::new(config.exports_dir.clone());
        let publishers = Publishers::from_config(&http, &config);
        Self {
            config: Arc::new(config),
            exports,
            publishers,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let exports_dir = state.exports.root().to_path_buf();
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .merge(api::ui_routes())
        .merge(api::process_routes(body_limit))
        .merge(api::export_routes())
        .merge(api::health_routes())
        .nest_service(EXPORTS_URL_PREFIX, ServeDir::new(exports_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
