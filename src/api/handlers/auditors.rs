//! Auditor handlers: on-chain auditor registration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use super::records::parse_address;
use crate::api::dto::RegisterAuditorRequest;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayerError};

/// `POST /auditors` — Register an auditor on the audit ledger contract.
///
/// # Errors
///
/// Returns [`RelayerError`] for malformed addresses or a failed on-chain
/// registration.
#[utoipa::path(
    post,
    path = "/api/v1/auditors",
    tag = "Auditors",
    summary = "Register an auditor",
    request_body = RegisterAuditorRequest,
    responses(
        (status = 201, description = "Auditor registered"),
        (status = 400, description = "Malformed address", body = ErrorResponse),
        (status = 502, description = "On-chain registration failed", body = ErrorResponse),
    )
)]
pub async fn register_auditor(
    State(state): State<AppState>,
    Json(req): Json<RegisterAuditorRequest>,
) -> Result<impl IntoResponse, RelayerError> {
    let auditor = parse_address(&req.address)?;
    state.audit_service.register_auditor(auditor).await?;
    Ok(StatusCode::CREATED)
}

/// Auditor routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/auditors", post(register_auditor))
}
