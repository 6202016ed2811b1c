//! Audit service: record intake, device registration, and the audit
//! status resolver.

use std::sync::Arc;

use alloy::primitives::Address;

use crate::chain::ChainClient;
use crate::chain::abi::AUDIT_SAFETY_OFFSET_SECS;
use crate::domain::{AuditStatus, Device, Record, unix_time_now};
use crate::error::RelayerError;
use crate::persistence::{RecordStore, RecordWithEvents};

/// Intake and query layer over the record store and chain client.
///
/// The audit status resolver recomputes [`AuditStatus`] on every query
/// from stored history plus wall-clock time; nothing derived is
/// persisted.
#[derive(Debug)]
pub struct AuditService {
    store: Arc<dyn RecordStore>,
    client: Arc<dyn ChainClient>,
}

impl AuditService {
    /// Creates a new `AuditService`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, client: Arc<dyn ChainClient>) -> Self {
        Self { store, client }
    }

    /// Stores a device reading as a new unaudited record.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::DeviceNotRegistered`] if the device is
    /// unknown, or a storage error.
    pub async fn store_reading(
        &self,
        device_address: Address,
        value: i64,
        timestamp: Option<u64>,
    ) -> Result<Record, RelayerError> {
        self.require_device(device_address).await?;

        let record = Record::new(
            device_address,
            value,
            timestamp.unwrap_or_else(unix_time_now),
        );
        let record = self.store.insert_record(record).await?;

        tracing::info!(record_id = %record.id, device = %device_address, "record stored");
        Ok(record)
    }

    /// Registers a device with the relayer and on the audit ledger
    /// contract.
    ///
    /// # Errors
    ///
    /// Returns a storage error or a chain error from the on-chain
    /// registration call.
    pub async fn register_device(&self, device: Device) -> Result<Device, RelayerError> {
        self.store.insert_device(device.clone()).await?;
        let receipt = self
            .client
            .register_device(device.auditor_address, device.address)
            .await?;

        tracing::info!(
            device = %device.address,
            auditor = %device.auditor_address,
            tx_hash = %receipt.transaction_hash,
            "device registered"
        );
        Ok(device)
    }

    /// Registers an auditor on the audit ledger contract.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::AddressRequired`] for the zero address or a
    /// chain error from the registration call.
    pub async fn register_auditor(&self, auditor: Address) -> Result<(), RelayerError> {
        if auditor == Address::ZERO {
            return Err(RelayerError::AddressRequired);
        }
        let receipt = self.client.register_auditor(auditor).await?;
        tracing::info!(
            auditor = %auditor,
            tx_hash = %receipt.transaction_hash,
            "auditor registered"
        );
        Ok(())
    }

    /// Lists registered devices.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list_devices(&self) -> Result<Vec<Device>, RelayerError> {
        self.store.list_devices().await
    }

    /// Returns records with their terminal events, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn records_with_events(
        &self,
        device: Option<Address>,
    ) -> Result<Vec<RecordWithEvents>, RelayerError> {
        self.store.records_with_events(device).await
    }

    /// Resolves the device's current [`AuditStatus`].
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::DeviceNotRegistered`] for unknown devices,
    /// a storage error, or [`RelayerError::ChainQuery`] if the settlement
    /// check needs a block timestamp that cannot be fetched.
    pub async fn audit_status(&self, device: Address) -> Result<AuditStatus, RelayerError> {
        self.audit_status_at(device, unix_time_now()).await
    }

    /// Status resolution against an explicit `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Same as [`AuditService::audit_status`].
    pub async fn audit_status_at(
        &self,
        device: Address,
        now: u64,
    ) -> Result<AuditStatus, RelayerError> {
        self.require_device(device).await?;

        if self.store.has_pending_record(device, now).await? {
            return Ok(AuditStatus::PendingAudit);
        }

        let Some(success) = self.store.last_successful_audit(device, now).await? else {
            return Ok(AuditStatus::NoOutstandingRecord);
        };

        let sealed_at = self.client.block_timestamp(success.block_number).await?;
        if now < sealed_at.saturating_add(AUDIT_SAFETY_OFFSET_SECS) {
            Ok(AuditStatus::AwaitingSettlement)
        } else {
            Ok(AuditStatus::AuditComplete)
        }
    }

    async fn require_device(&self, address: Address) -> Result<Device, RelayerError> {
        if address == Address::ZERO {
            return Err(RelayerError::AddressRequired);
        }
        self.store
            .find_device(address)
            .await?
            .ok_or(RelayerError::DeviceNotRegistered(address))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::client::mock::MockChainClient;
    use crate::domain::{AuditEvent, EventType, RecordId};
    use crate::persistence::memory::InMemoryStore;
    use alloy::primitives::{B256, Bytes};

    const NOW: u64 = 1_700_000_000;

    fn service() -> (AuditService, Arc<InMemoryStore>, Arc<MockChainClient>) {
        let store = Arc::new(InMemoryStore::new());
        let client = Arc::new(MockChainClient::new());
        let service = AuditService::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&client) as Arc<dyn ChainClient>,
        );
        (service, store, client)
    }

    fn success_event(record_id: RecordId, block_number: u64) -> AuditEvent {
        AuditEvent {
            record_id,
            event_type: EventType::SubcallSucceeded,
            transaction_hash: B256::repeat_byte(0xaa),
            block_hash: B256::repeat_byte(0xbb),
            block_number,
            log_index: 0,
            address: Address::ZERO,
            data: Bytes::new(),
            topics: Vec::new(),
        }
    }

    async fn register(service: &AuditService, device: Address) {
        let result = service
            .register_device(Device::new(device, Address::repeat_byte(0xa1)))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn auditor_registration_rejects_zero_address() {
        let (service, _store, _client) = service();
        let result = service.register_auditor(Address::ZERO).await;
        assert!(matches!(result, Err(RelayerError::AddressRequired)));

        let result = service.register_auditor(Address::repeat_byte(0xa1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unknown_device_is_rejected() {
        let (service, _store, _client) = service();
        let result = service.audit_status(Address::repeat_byte(1)).await;
        assert!(matches!(result, Err(RelayerError::DeviceNotRegistered(_))));
    }

    #[tokio::test]
    async fn zero_address_is_rejected() {
        let (service, _store, _client) = service();
        let result = service.audit_status(Address::ZERO).await;
        assert!(matches!(result, Err(RelayerError::AddressRequired)));
    }

    #[tokio::test]
    async fn no_records_means_no_outstanding_record() {
        let (service, _store, _client) = service();
        let device = Address::repeat_byte(1);
        register(&service, device).await;

        let status = service.audit_status_at(device, NOW).await;
        assert_eq!(status.ok(), Some(AuditStatus::NoOutstandingRecord));
    }

    #[tokio::test]
    async fn stored_reading_makes_audit_pending() {
        let (service, _store, _client) = service();
        let device = Address::repeat_byte(1);
        register(&service, device).await;

        let stored = service.store_reading(device, 7, Some(NOW)).await;
        assert!(stored.is_ok());

        let status = service.audit_status_at(device, NOW).await;
        assert_eq!(status.ok(), Some(AuditStatus::PendingAudit));
    }

    #[tokio::test]
    async fn storing_for_unregistered_device_fails() {
        let (service, _store, _client) = service();
        let result = service
            .store_reading(Address::repeat_byte(9), 7, Some(NOW))
            .await;
        assert!(matches!(result, Err(RelayerError::DeviceNotRegistered(_))));
    }

    #[tokio::test]
    async fn settlement_window_gates_completion() {
        let (service, store, client) = service();
        let device = Address::repeat_byte(1);
        register(&service, device).await;

        let Ok(record) = service.store_reading(device, 7, Some(NOW)).await else {
            panic!("store failed");
        };
        let _ = store.insert_events(&[success_event(record.id, 500)]).await;
        if let Ok(mut timestamps) = client.block_timestamps.lock() {
            timestamps.insert(500, NOW);
        }

        // Inside the grace window the audit still counts as pending.
        let status = service
            .audit_status_at(device, NOW + AUDIT_SAFETY_OFFSET_SECS - 1)
            .await;
        assert_eq!(status.ok(), Some(AuditStatus::AwaitingSettlement));

        // At the boundary it settles.
        let status = service
            .audit_status_at(device, NOW + AUDIT_SAFETY_OFFSET_SECS)
            .await;
        assert_eq!(status.ok(), Some(AuditStatus::AuditComplete));
    }

    #[tokio::test]
    async fn settlement_check_failure_propagates_as_chain_query() {
        let (service, store, _client) = service();
        let device = Address::repeat_byte(1);
        register(&service, device).await;

        let Ok(record) = service.store_reading(device, 7, Some(NOW)).await else {
            panic!("store failed");
        };
        // Block 500 timestamp is not scripted in the mock.
        let _ = store.insert_events(&[success_event(record.id, 500)]).await;

        let result = service.audit_status_at(device, NOW).await;
        assert!(matches!(result, Err(RelayerError::ChainQuery(_))));
    }
}
