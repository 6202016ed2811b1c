//! DTOs for device registration and audit status.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Device;

/// Body of `POST /devices`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterDeviceRequest {
    /// Hex address of the device.
    pub address: String,
    /// Hex address of the responsible auditor.
    pub auditor_address: String,
}

/// A registered device.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeviceDto {
    /// Hex address of the device.
    pub address: String,
    /// Hex address of the responsible auditor.
    pub auditor_address: String,
}

impl From<&Device> for DeviceDto {
    fn from(device: &Device) -> Self {
        Self {
            address: format!("{:#x}", device.address),
            auditor_address: format!("{:#x}", device.auditor_address),
        }
    }
}

/// Body of `POST /auditors`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterAuditorRequest {
    /// Hex address of the auditor.
    pub address: String,
}

/// Body of `GET /devices/{address}/audit-status`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditStatusResponse {
    /// `true` while the device's latest audit is pending or awaiting
    /// settlement.
    pub is_audit_pending: bool,
}
