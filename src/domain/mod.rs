//! Domain layer: records, devices, outcome events, and audit status.
//!
//! This module contains the relayer's domain model: record identity, the
//! sensor record with its optional permit annotation, terminal outcome
//! events produced by receipt reconciliation, and the derived per-device
//! audit status.

pub mod audit_event;
pub mod audit_status;
pub mod device;
pub mod record;
pub mod record_id;

pub use audit_event::{AuditEvent, EventType};
pub use audit_status::AuditStatus;
pub use device::Device;
pub use record::{PermitSignature, Record, SignedPermit};
pub use record_id::RecordId;

/// Returns the current wall-clock time as unix seconds.
///
/// Chain timestamps, record timestamps and permit deadlines are all unix
/// seconds; only the HTTP DTO layer uses `chrono` datetimes.
#[must_use]
pub fn unix_time_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
