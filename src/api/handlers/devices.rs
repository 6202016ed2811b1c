//! Device handlers: registration, listing, and audit status.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::records::parse_address;
use crate::api::dto::{AuditStatusResponse, DeviceDto, RegisterDeviceRequest};
use crate::app_state::AppState;
use crate::domain::Device;
use crate::error::{ErrorResponse, RelayerError};

/// `POST /devices` — Register a device with the relayer and on-chain.
///
/// # Errors
///
/// Returns [`RelayerError`] for malformed addresses, storage failures, or
/// a failed on-chain registration.
#[utoipa::path(
    post,
    path = "/api/v1/devices",
    tag = "Devices",
    summary = "Register a device",
    description = "Persists the device under its auditor and registers it on the audit ledger contract.",
    request_body = RegisterDeviceRequest,
    responses(
        (status = 201, description = "Device registered", body = DeviceDto),
        (status = 400, description = "Malformed address", body = ErrorResponse),
        (status = 502, description = "On-chain registration failed", body = ErrorResponse),
    )
)]
pub async fn register_device(
    State(state): State<AppState>,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<impl IntoResponse, RelayerError> {
    let device = Device::new(
        parse_address(&req.address)?,
        parse_address(&req.auditor_address)?,
    );
    let device = state.audit_service.register_device(device).await?;

    Ok((StatusCode::CREATED, Json(DeviceDto::from(&device))))
}

/// `GET /devices` — List registered devices.
///
/// # Errors
///
/// Returns [`RelayerError`] on storage failures.
#[utoipa::path(
    get,
    path = "/api/v1/devices",
    tag = "Devices",
    summary = "List devices",
    responses(
        (status = 200, description = "Device list", body = Vec<DeviceDto>),
    )
)]
pub async fn list_devices(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, RelayerError> {
    let devices = state.audit_service.list_devices().await?;
    let response: Vec<DeviceDto> = devices.iter().map(DeviceDto::from).collect();
    Ok(Json(response))
}

/// `GET /devices/{address}/audit-status` — Resolve the device's audit
/// status.
///
/// # Errors
///
/// Returns [`RelayerError`] for unknown devices or failed settlement
/// checks.
#[utoipa::path(
    get,
    path = "/api/v1/devices/{address}/audit-status",
    tag = "Devices",
    summary = "Audit status",
    description = "Answers whether the device's latest audit is still pending, including the post-inclusion settlement window.",
    params(("address" = String, Path, description = "Device address")),
    responses(
        (status = 200, description = "Audit status", body = AuditStatusResponse),
        (status = 404, description = "Device not registered", body = ErrorResponse),
        (status = 502, description = "Settlement check failed", body = ErrorResponse),
    )
)]
pub async fn audit_status(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, RelayerError> {
    let device = parse_address(&address)?;
    let status = state.audit_service.audit_status(device).await?;

    Ok(Json(AuditStatusResponse {
        is_audit_pending: status.is_audit_pending(),
    }))
}

/// Device routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/devices", post(register_device).get(list_devices))
        .route("/devices/{address}/audit-status", get(audit_status))
}
