//! Derived per-device audit status.
//!
//! Never persisted: recomputed on every query from record/event history,
//! wall-clock time and, for settled audits, an on-chain block timestamp.

use serde::Serialize;

/// State machine answering "is this device's audit still pending?".
///
/// Transitions into [`AuditStatus::PendingAudit`] happen when a new record
/// is created; transitions out happen only through a reconciled outcome.
/// Terminal states are never revisited by the periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// No unexpired record without a terminal event, and no recent
    /// successful audit inside the settlement window.
    NoOutstandingRecord,
    /// An unexpired record exists with no terminal event yet (never
    /// submitted, or a submitted batch not yet included).
    PendingAudit,
    /// The most recent record succeeded on-chain but its block timestamp
    /// is still inside the settlement grace window.
    AwaitingSettlement,
    /// The most recent successful audit has settled.
    AuditComplete,
}

impl AuditStatus {
    /// Returns `true` exactly for [`AuditStatus::PendingAudit`] and
    /// [`AuditStatus::AwaitingSettlement`].
    #[must_use]
    pub const fn is_audit_pending(&self) -> bool {
        matches!(self, Self::PendingAudit | Self::AwaitingSettlement)
    }
}
