//! API route handlers.

use axum::extract::State;
use axum::Json;
use tracing::debug;

use crate::error::Result;
use crate::models::{ClassifyRequest, ClassifyResponse};
use crate::state::AppState;

/// POST /api/classify - Decide the fate of one intercepted request.
pub async fn classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>> {
    debug!(url = %req.url, method = %req.method, "Classifying request");

    let verdict = state.engine.classify(req.into()).await?;

    debug!(?verdict, "Classification complete");
    Ok(Json(verdict.into()))
}
