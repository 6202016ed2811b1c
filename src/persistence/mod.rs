//! Persistence layer: durable storage of records, devices, and outcomes.
//!
//! [`RecordStore`] is the collaborator contract the audit pipeline
//! consumes. Two implementations exist: a `tokio::sync::RwLock` in-memory
//! store (tests, and deployments with persistence disabled) and a
//! PostgreSQL store over `sqlx`.

pub mod memory;
pub mod postgres;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::domain::{AuditEvent, Device, PermitSignature, Record, RecordId};
use crate::error::RelayerError;

/// A record together with its terminal events, for list endpoints.
#[derive(Debug, Clone)]
pub struct RecordWithEvents {
    /// The stored record.
    pub record: Record,
    /// Terminal events reconciled for the record (at most one meaningful
    /// outcome in practice).
    pub events: Vec<AuditEvent>,
}

/// Durable storage consumed by the audit pipeline and the HTTP surface.
///
/// The selection predicate (`unaudited_records`) is idempotent; together
/// with the one-cycle-at-a-time guarantee it is the only re-entrancy
/// protection between selection and reconciliation.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Inserts a newly submitted record.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] on storage failure.
    async fn insert_record(&self, record: Record) -> Result<Record, RelayerError>;

    /// Persists the permit annotation built for a record.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] if the record does not exist.
    async fn store_permit(
        &self,
        record_id: RecordId,
        deadline: u64,
        signature: PermitSignature,
    ) -> Result<(), RelayerError>;

    /// Returns up to `max_count` unaudited records: permit deadline unset
    /// or after `now`, no terminal event, oldest first, at most one per
    /// device.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] on storage failure.
    async fn unaudited_records(
        &self,
        max_count: usize,
        now: u64,
    ) -> Result<Vec<Record>, RelayerError>;

    /// Durably records terminal outcomes. Called at most once per
    /// successfully reconciled batch.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] on storage failure.
    async fn insert_events(&self, events: &[AuditEvent]) -> Result<(), RelayerError>;

    /// Returns `true` if the device has an unexpired record with no
    /// terminal event.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] on storage failure.
    async fn has_pending_record(&self, device: Address, now: u64) -> Result<bool, RelayerError>;

    /// Returns the most recent `SubcallSucceeded` event among the
    /// device's unexpired records, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] on storage failure.
    async fn last_successful_audit(
        &self,
        device: Address,
        now: u64,
    ) -> Result<Option<AuditEvent>, RelayerError>;

    /// Returns records with their events, newest first, optionally
    /// filtered by device.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] on storage failure.
    async fn records_with_events(
        &self,
        device: Option<Address>,
    ) -> Result<Vec<RecordWithEvents>, RelayerError>;

    /// Counts unaudited records whose permit deadline has already passed.
    /// Such records have no path to a terminal event and are surfaced by
    /// the cycle as a warning.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] on storage failure.
    async fn expired_unaudited_count(&self, now: u64) -> Result<u64, RelayerError>;

    /// Registers a device.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] on storage failure.
    async fn insert_device(&self, device: Device) -> Result<(), RelayerError>;

    /// Looks up a registered device.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] on storage failure.
    async fn find_device(&self, address: Address) -> Result<Option<Device>, RelayerError>;

    /// Lists all registered devices.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Storage`] on storage failure.
    async fn list_devices(&self) -> Result<Vec<Device>, RelayerError>;
}
