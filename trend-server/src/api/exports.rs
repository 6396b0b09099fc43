//! Export listing endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::exports::{ExportEntry, RECENT_LIMIT};
use crate::publish::PublishedLinks;
use crate::AppState;

/// Recent local exports plus the last published links
#[derive(Debug, Serialize)]
pub struct ExportsResponse {
    pub exports: Vec<ExportEntry>,
    pub pushed: PublishedLinks,
    pub site_base: Option<String>,
}

/// Shared by the JSON endpoint and the index page
pub(crate) async fn collect(state: &AppState) -> ExportsResponse {
    let exports = state
        .exports
        .recent(RECENT_LIMIT)
        .await
        .unwrap_or_else(|e| {
            warn!(
                "Cannot list exports in {}: {}",
                state.exports.root().display(),
                e
            );
            Vec::new()
        });

    ExportsResponse {
        exports,
        pushed: state.exports.read_latest().await,
        site_base: state
            .config
            .github
            .as_ref()
            .and_then(|gh| gh.site_base.clone()),
    }
}

/// GET /api/exports
pub async fn list_exports(State(state): State<AppState>) -> Json<ExportsResponse> {
    Json(collect(&state).await)
}

pub fn export_routes() -> Router<AppState> {
    Router::new().route("/api/exports", get(list_exports))
}
