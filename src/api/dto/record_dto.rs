//! DTOs for record intake and listing.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{AuditEvent, RecordId};
use crate::persistence::RecordWithEvents;

/// Body of `POST /records`: one device reading.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRecordRequest {
    /// Hex address of the submitting device.
    pub device_address: String,
    /// Sampled value in the device's native scale.
    pub value: i64,
    /// Unix-seconds timestamp of the reading. Defaults to the server
    /// clock when omitted.
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// A terminal audit event attached to a record.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventDto {
    /// Outcome class (`SubcallSucceeded`, `SubcallFailed`, `Unknown`).
    pub event_type: String,
    /// Hash of the batch transaction.
    pub transaction_hash: String,
    /// Hash of the including block.
    pub block_hash: String,
    /// Number of the including block.
    pub block_number: u64,
    /// Raw block-wide log index.
    pub log_index: u64,
}

impl From<&AuditEvent> for EventDto {
    fn from(event: &AuditEvent) -> Self {
        Self {
            event_type: event.event_type.as_str().to_string(),
            transaction_hash: format!("{}", event.transaction_hash),
            block_hash: format!("{}", event.block_hash),
            block_number: event.block_number,
            log_index: event.log_index,
        }
    }
}

/// A record with its audit history, as returned by the list endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordResponse {
    /// Record identifier.
    pub id: RecordId,
    /// Device that produced the reading.
    pub device_address: String,
    /// Sampled value.
    pub value: i64,
    /// Unix-seconds timestamp of the reading.
    pub timestamp: u64,
    /// Permit expiry, present once a permit has been built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_deadline: Option<u64>,
    /// Terminal events reconciled for the record.
    pub events: Vec<EventDto>,
}

impl From<&RecordWithEvents> for RecordResponse {
    fn from(row: &RecordWithEvents) -> Self {
        Self {
            id: row.record.id,
            device_address: format!("{:#x}", row.record.device_address),
            value: row.record.value,
            timestamp: row.record.timestamp,
            permit_deadline: row.record.permit_deadline,
            events: row.events.iter().map(EventDto::from).collect(),
        }
    }
}
