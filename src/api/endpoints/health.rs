//! Health check endpoint.

use axum::extract::State;
use axum::response::Response;

use crate::api::error::ApiError;
use crate::api::types::{ok, ApiContext};

/// `GET /health` — liveness check, also verifies the database opens.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Response, ApiError> {
    ctx.open_db()?;
    Ok(ok(serde_json::json!({
        "status": "ok",
        "version": crate::config::APP_VERSION,
    })))
}
