//! In-memory implementation of the record store.
//!
//! Backs tests and deployments with persistence disabled. Uses
//! `tokio::sync::RwLock`-protected maps; the audit cycle is the only
//! writer of permit annotations and events, so contention is negligible.

use std::collections::{HashMap, HashSet};

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RecordStore, RecordWithEvents};
use crate::domain::{AuditEvent, Device, EventType, PermitSignature, Record, RecordId};
use crate::error::RelayerError;

/// Volatile [`RecordStore`] over `RwLock`-protected hash maps.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<RecordId, Record>>,
    events: RwLock<HashMap<RecordId, Vec<AuditEvent>>>,
    devices: RwLock<HashMap<Address, Device>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert_record(&self, record: Record) -> Result<Record, RelayerError> {
        let mut records = self.records.write().await;
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn store_permit(
        &self,
        record_id: RecordId,
        deadline: u64,
        signature: PermitSignature,
    ) -> Result<(), RelayerError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&record_id)
            .ok_or_else(|| RelayerError::Storage(format!("record {record_id} not found")))?;
        record.permit_deadline = Some(deadline);
        record.permit_signature = Some(signature);
        Ok(())
    }

    async fn unaudited_records(
        &self,
        max_count: usize,
        now: u64,
    ) -> Result<Vec<Record>, RelayerError> {
        let records = self.records.read().await;
        let events = self.events.read().await;

        let mut eligible: Vec<Record> = records
            .values()
            .filter(|record| record.is_unexpired(now))
            .filter(|record| events.get(&record.id).is_none_or(Vec::is_empty))
            .cloned()
            .collect();
        eligible.sort_by_key(|record| record.timestamp);

        let mut seen_devices = HashSet::new();
        let mut selected = Vec::with_capacity(max_count.min(eligible.len()));
        for record in eligible {
            if selected.len() == max_count {
                break;
            }
            if seen_devices.insert(record.device_address) {
                selected.push(record);
            }
        }
        Ok(selected)
    }

    async fn insert_events(&self, events: &[AuditEvent]) -> Result<(), RelayerError> {
        let mut stored = self.events.write().await;
        for event in events {
            stored
                .entry(event.record_id)
                .or_default()
                .push(event.clone());
        }
        Ok(())
    }

    async fn has_pending_record(&self, device: Address, now: u64) -> Result<bool, RelayerError> {
        let records = self.records.read().await;
        let events = self.events.read().await;
        Ok(records.values().any(|record| {
            record.device_address == device
                && record.is_unexpired(now)
                && events.get(&record.id).is_none_or(Vec::is_empty)
        }))
    }

    async fn last_successful_audit(
        &self,
        device: Address,
        now: u64,
    ) -> Result<Option<AuditEvent>, RelayerError> {
        let records = self.records.read().await;
        let events = self.events.read().await;

        let mut audited: Vec<(&Record, &AuditEvent)> = records
            .values()
            .filter(|record| record.device_address == device && record.is_unexpired(now))
            .filter_map(|record| {
                events
                    .get(&record.id)
                    .and_then(|evs| {
                        evs.iter()
                            .find(|e| e.event_type == EventType::SubcallSucceeded)
                    })
                    .map(|event| (record, event))
            })
            .collect();
        audited.sort_by_key(|(record, _)| record.timestamp);

        Ok(audited.last().map(|(_, event)| (*event).clone()))
    }

    async fn records_with_events(
        &self,
        device: Option<Address>,
    ) -> Result<Vec<RecordWithEvents>, RelayerError> {
        let records = self.records.read().await;
        let events = self.events.read().await;

        let mut rows: Vec<RecordWithEvents> = records
            .values()
            .filter(|record| device.is_none_or(|d| record.device_address == d))
            .map(|record| RecordWithEvents {
                record: record.clone(),
                events: events.get(&record.id).cloned().unwrap_or_default(),
            })
            .collect();
        rows.sort_by(|a, b| b.record.timestamp.cmp(&a.record.timestamp));
        Ok(rows)
    }

    async fn expired_unaudited_count(&self, now: u64) -> Result<u64, RelayerError> {
        let records = self.records.read().await;
        let events = self.events.read().await;
        let count = records
            .values()
            .filter(|record| {
                record
                    .permit_deadline
                    .is_some_and(|deadline| deadline <= now)
            })
            .filter(|record| events.get(&record.id).is_none_or(Vec::is_empty))
            .count();
        Ok(count as u64)
    }

    async fn insert_device(&self, device: Device) -> Result<(), RelayerError> {
        let mut devices = self.devices.write().await;
        devices.insert(device.address, device);
        Ok(())
    }

    async fn find_device(&self, address: Address) -> Result<Option<Device>, RelayerError> {
        let devices = self.devices.read().await;
        Ok(devices.get(&address).cloned())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, RelayerError> {
        let devices = self.devices.read().await;
        let mut list: Vec<Device> = devices.values().cloned().collect();
        list.sort_by_key(|device| device.address);
        Ok(list)
    }
}
