//! Terminal outcome events produced by receipt reconciliation.
//!
//! Each audited record receives exactly one [`AuditEvent`], created after
//! the batch transaction is included and immutable thereafter.

use alloy::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// Classified outcome of one batch sub-call.
///
/// Resolved once at reconciliation time from the batch precompile's own
/// event signature and never re-interpreted downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// The sub-call executed successfully; the record is audited.
    SubcallSucceeded,
    /// The sub-call failed on-chain. Still terminal: the permit was
    /// consumed either way and the record is never resubmitted.
    SubcallFailed,
    /// A log that did not match a known batch event signature.
    Unknown,
}

impl EventType {
    /// Returns the event type as a static string slice (also the storage
    /// representation).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SubcallSucceeded => "SubcallSucceeded",
            Self::SubcallFailed => "SubcallFailed",
            Self::Unknown => "Unknown",
        }
    }

    /// Parses a stored event type string; anything unrecognized maps to
    /// [`EventType::Unknown`].
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "SubcallSucceeded" => Self::SubcallSucceeded,
            "SubcallFailed" => Self::SubcallFailed,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` for the successful terminal outcome.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::SubcallSucceeded)
    }
}

/// Terminal outcome of one record's audit, reconciled from a receipt log.
///
/// `log_index` is the log's raw block-wide position; it is carried for
/// auditability only and is never the correlation key (the sub-call
/// submission position is).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// The record this outcome belongs to.
    pub record_id: RecordId,
    /// Classified outcome.
    pub event_type: EventType,
    /// Hash of the batch transaction.
    pub transaction_hash: B256,
    /// Hash of the including block.
    pub block_hash: B256,
    /// Number of the including block.
    pub block_number: u64,
    /// Raw block-wide log index (informational).
    pub log_index: u64,
    /// Address that emitted the log (the batch precompile).
    pub address: Address,
    /// Raw log data.
    pub data: Bytes,
    /// Raw log topics.
    pub topics: Vec<B256>,
}
