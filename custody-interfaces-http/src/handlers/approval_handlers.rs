use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;

use custody_application::authorization::require_privileged;
use custody_application::commands::auto_approval_commands;
use custody_application::AppState;

use crate::dtos::AutoApproveResponse;
use crate::error::HttpError;
use crate::middleware::extract_bearer;

/// Entry point for the external scheduler. Admits the system secret or an
/// administrator session.
pub async fn trigger_auto_approval(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AutoApproveResponse>, HttpError> {
    let token = extract_bearer(&headers);
    let principal = require_privileged(&state, token.as_deref()).await?;
    let report = auto_approval_commands::run_auto_approval(&state, &principal, Utc::now()).await?;
    Ok(Json(AutoApproveResponse::from(&report)))
}
