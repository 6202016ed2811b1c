//! Sensor records and their permit annotations.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// Decomposed ECDSA signature over an EIP-712 `CallPermit` message.
///
/// The batch dispatch call consumes the three scalar components rather
/// than the compact encoding, so they are stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
    /// Recovery id, normalized to 27/28.
    pub v: u8,
    /// First signature scalar.
    pub r: B256,
    /// Second signature scalar.
    pub s: B256,
}

/// A sensor reading submitted by a field device.
///
/// Immutable once created, except for the one-time permit annotation set
/// when a permit is built for it. A record owns at most one meaningful
/// terminal [`super::AuditEvent`]; once that exists the record is audited
/// and is never selected again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Unique record identifier (immutable after creation).
    pub id: RecordId,

    /// Address of the device that produced the reading.
    pub device_address: Address,

    /// The sampled value, in the device's native scale.
    pub value: i64,

    /// Unix-seconds timestamp of the reading.
    pub timestamp: u64,

    /// Permit expiry (unix seconds), set once a permit has been built.
    pub permit_deadline: Option<u64>,

    /// Permit signature components, set together with the deadline.
    pub permit_signature: Option<PermitSignature>,
}

impl Record {
    /// Creates a new unaudited record with no permit annotation.
    #[must_use]
    pub fn new(device_address: Address, value: i64, timestamp: u64) -> Self {
        Self {
            id: RecordId::new(),
            device_address,
            value,
            timestamp,
            permit_deadline: None,
            permit_signature: None,
        }
    }

    /// Returns `true` if the record is still eligible for batching at
    /// `now`: the permit deadline (when set) has not passed.
    ///
    /// Event history is tracked by the store, not the record itself, so
    /// the "no terminal event" half of the predicate lives in the
    /// selection query.
    #[must_use]
    pub fn is_unexpired(&self, now: u64) -> bool {
        self.permit_deadline.is_none_or(|deadline| deadline > now)
    }
}

/// A record together with its freshly built permit, ready for batching.
///
/// Produced by the permit builder and consumed by the batch encoder in the
/// same cycle; the annotation is also persisted back onto the record.
#[derive(Debug, Clone)]
pub struct SignedPermit {
    /// Identifier of the originating record.
    pub record_id: RecordId,
    /// Device address the permit was signed for (`from` of the dispatch).
    pub device_address: Address,
    /// The sampled value, re-encoded into the inner call at batch time.
    pub value: i64,
    /// Unix-seconds timestamp of the reading.
    pub timestamp: u64,
    /// Permit expiry: `timestamp` plus the fixed validity window.
    pub deadline: u64,
    /// Signature over the EIP-712 permit message.
    pub signature: PermitSignature,
}
