//! Record handlers: intake and listing.

use std::str::FromStr;

use alloy::primitives::Address;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::dto::{CreateRecordRequest, RecordResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayerError};

/// Query parameters for `GET /records`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordListParams {
    /// Restrict the listing to one device.
    #[serde(default)]
    pub device_address: Option<String>,
}

/// `POST /records` — Store a device reading as an unaudited record.
///
/// # Errors
///
/// Returns [`RelayerError`] for malformed addresses or unregistered
/// devices.
#[utoipa::path(
    post,
    path = "/api/v1/records",
    tag = "Records",
    summary = "Submit a sensor reading",
    description = "Stores a reading as an unaudited record. The record is picked up by the next audit cycle, signed into a call permit, and dispatched on-chain in a batch.",
    request_body = CreateRecordRequest,
    responses(
        (status = 201, description = "Record stored"),
        (status = 400, description = "Malformed device address", body = ErrorResponse),
        (status = 404, description = "Device not registered", body = ErrorResponse),
    )
)]
pub async fn create_record(
    State(state): State<AppState>,
    Json(req): Json<CreateRecordRequest>,
) -> Result<impl IntoResponse, RelayerError> {
    let device = parse_address(&req.device_address)?;
    let record = state
        .audit_service
        .store_reading(device, req.value, req.timestamp)
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /records` — List records with their audit events, newest first.
///
/// # Errors
///
/// Returns [`RelayerError`] for malformed filter addresses or storage
/// failures.
#[utoipa::path(
    get,
    path = "/api/v1/records",
    tag = "Records",
    summary = "List records",
    description = "Returns records with their terminal audit events, newest first, optionally filtered by device.",
    responses(
        (status = 200, description = "Record list", body = Vec<RecordResponse>),
        (status = 400, description = "Malformed device address", body = ErrorResponse),
    )
)]
pub async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<RecordListParams>,
) -> Result<impl IntoResponse, RelayerError> {
    let device = params
        .device_address
        .as_deref()
        .map(parse_address)
        .transpose()?;

    let rows = state.audit_service.records_with_events(device).await?;
    let response: Vec<RecordResponse> = rows.iter().map(RecordResponse::from).collect();
    Ok(Json(response))
}

pub(super) fn parse_address(raw: &str) -> Result<Address, RelayerError> {
    Address::from_str(raw)
        .map_err(|_| RelayerError::InvalidRequest(format!("invalid address: {raw}")))
}

/// Record routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/records", post(create_record).get(list_records))
}
