//! Relay service: the periodic permit-batch dispatch cycle.
//!
//! One cycle: select unaudited records → build and sign permits → encode
//! the batch → dispatch and await inclusion → reconcile outcomes →
//! persist. At most one cycle runs at a time; a trigger firing while a
//! previous cycle is still awaiting inclusion is skipped, never run
//! concurrently, because concurrent cycles could race on a device's
//! authorization nonce and invalidate each other's signatures.

use std::sync::Arc;

use futures_util::future;
use tokio::sync::Mutex;

use crate::chain::{BatchEncoder, Dispatcher, PermitBuilder, reconcile};
use crate::domain::unix_time_now;
use crate::error::RelayerError;
use crate::persistence::RecordStore;

/// Result of one trigger firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A previous cycle was still in flight; nothing was done.
    Skipped,
    /// No unaudited records existed; the dispatcher was never called.
    Idle,
    /// A batch was dispatched and reconciled.
    Completed {
        /// Outcomes persisted for this batch.
        audited: usize,
        /// Sub-calls whose outcome could not be correlated.
        unreconciled: usize,
    },
}

/// Orchestrates the dispatch cycle over the pipeline components.
#[derive(Debug)]
pub struct RelayService {
    store: Arc<dyn RecordStore>,
    permit_builder: PermitBuilder,
    encoder: BatchEncoder,
    dispatcher: Dispatcher,
    max_batch_size: usize,
    in_flight: Mutex<()>,
}

impl RelayService {
    /// Creates a relay service over the assembled pipeline.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        permit_builder: PermitBuilder,
        encoder: BatchEncoder,
        dispatcher: Dispatcher,
        max_batch_size: usize,
    ) -> Self {
        Self {
            store,
            permit_builder,
            encoder,
            dispatcher,
            max_batch_size,
            in_flight: Mutex::new(()),
        }
    }

    /// Runs one audit cycle.
    ///
    /// Any failure before submission aborts the cycle with no on-chain
    /// side effects and no persisted outcome, so the same records are
    /// selected again on the next trigger. Individual sub-call failures
    /// are terminal outcomes, not errors.
    ///
    /// # Errors
    ///
    /// Propagates pipeline errors per the taxonomy in
    /// [`crate::error::RelayerError`].
    pub async fn run_cycle(&self) -> Result<CycleOutcome, RelayerError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("previous audit cycle still in flight; skipping trigger");
            return Ok(CycleOutcome::Skipped);
        };

        tracing::debug!("audit cycle start");
        let now = unix_time_now();

        let expired = self.store.expired_unaudited_count(now).await?;
        if expired > 0 {
            tracing::warn!(
                expired,
                "unaudited records past their permit deadline will never be selected"
            );
        }

        let records = self.store.unaudited_records(self.max_batch_size, now).await?;
        if records.is_empty() {
            tracing::debug!("audit cycle end: 0 records audited");
            return Ok(CycleOutcome::Idle);
        }

        let ids: Vec<String> = records.iter().map(|r| r.id.to_string()).collect();
        tracing::info!(records = ?ids, "records under audit");

        // Signing runs concurrently per record; encoding below is the
        // barrier that needs every permit collected.
        let permits = future::try_join_all(
            records
                .iter()
                .map(|record| self.permit_builder.build_permit(record)),
        )
        .await?;

        for permit in &permits {
            self.store
                .store_permit(permit.record_id, permit.deadline, permit.signature.clone())
                .await?;
        }

        let payload = self.encoder.encode_batch(&permits)?;
        let receipt = self.dispatcher.dispatch(&payload).await?;

        let reconciled = reconcile(&receipt, &payload.record_ids);
        for outcome in &reconciled.outcomes {
            tracing::info!(
                record_id = %outcome.record_id,
                event_type = outcome.event_type.as_str(),
                tx_hash = %outcome.transaction_hash,
                "record audited"
            );
        }
        for failure in &reconciled.failures {
            tracing::error!(
                record_id = ?failure.record_id,
                position = ?failure.position,
                reason = %failure.reason,
                "sub-call outcome not reconciled"
            );
        }

        self.store.insert_events(&reconciled.outcomes).await?;

        tracing::info!(
            audited = reconciled.outcomes.len(),
            "audit cycle end"
        );
        Ok(CycleOutcome::Completed {
            audited: reconciled.outcomes.len(),
            unreconciled: reconciled.failures.len(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::client::mock::MockChainClient;
    use crate::chain::{ChainClient, RelayerKeystore};
    use crate::domain::{EventType, Record, unix_time_now};
    use crate::persistence::memory::InMemoryStore;
    use alloy::primitives::Address;
    use std::time::Duration;

    const RELAYER_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEVICE_KEYS: [&str; 2] = [
        "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
        "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    ];

    struct Fixture {
        service: RelayService,
        store: Arc<InMemoryStore>,
        client: Arc<MockChainClient>,
        devices: Vec<Address>,
    }

    fn fixture(client: MockChainClient) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let client = Arc::new(client);
        let keys: Vec<String> = DEVICE_KEYS.iter().map(|k| (*k).to_string()).collect();
        let Ok(keystore) = RelayerKeystore::from_keys(RELAYER_KEY, &keys) else {
            panic!("keystore construction failed");
        };
        let mut devices = keystore.device_addresses();
        devices.sort();
        let contract = Address::repeat_byte(0x42);
        let permit_builder = PermitBuilder::new(
            Arc::new(keystore),
            Arc::clone(&client) as Arc<dyn ChainClient>,
            contract,
            1287,
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&client) as Arc<dyn ChainClient>,
            Duration::from_secs(5),
        );
        let service = RelayService::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            permit_builder,
            BatchEncoder::new(contract),
            dispatcher,
            10,
        );
        Fixture {
            service,
            store,
            client,
            devices,
        }
    }

    async fn seed_records(fixture: &Fixture) -> Vec<Record> {
        let now = unix_time_now();
        let mut seeded = Vec::new();
        for (offset, device) in fixture.devices.iter().enumerate() {
            let record = Record::new(*device, 20 + offset as i64, now - 60 + offset as u64);
            let Ok(record) = fixture.store.insert_record(record).await else {
                panic!("seed failed");
            };
            seeded.push(record);
        }
        seeded
    }

    #[tokio::test]
    async fn empty_selection_short_circuits_with_zero_dispatches() {
        let fixture = fixture(MockChainClient::new());
        let outcome = fixture.service.run_cycle().await;
        assert_eq!(outcome.ok(), Some(CycleOutcome::Idle));
        assert_eq!(fixture.client.submit_count(), 0);
    }

    #[tokio::test]
    async fn happy_path_persists_one_outcome_per_record() {
        let fixture = fixture(MockChainClient::new());
        let seeded = seed_records(&fixture).await;

        let outcome = fixture.service.run_cycle().await;
        assert_eq!(
            outcome.ok(),
            Some(CycleOutcome::Completed {
                audited: seeded.len(),
                unreconciled: 0
            })
        );

        let Ok(rows) = fixture.store.records_with_events(None).await else {
            panic!("listing failed");
        };
        assert!(rows.iter().all(|row| row.events.len() == 1));
        // Permit annotations were persisted before dispatch.
        assert!(rows.iter().all(|row| row.record.permit_deadline.is_some()));
    }

    #[tokio::test]
    async fn second_cycle_without_new_records_is_idle() {
        let fixture = fixture(MockChainClient::new());
        let _ = seed_records(&fixture).await;

        let first = fixture.service.run_cycle().await;
        assert!(matches!(first.ok(), Some(CycleOutcome::Completed { .. })));
        assert_eq!(fixture.client.submit_count(), 1);

        let second = fixture.service.run_cycle().await;
        assert_eq!(second.ok(), Some(CycleOutcome::Idle));
        assert_eq!(fixture.client.submit_count(), 1);
    }

    #[tokio::test]
    async fn failed_sub_call_is_a_persisted_terminal_outcome() {
        let client = MockChainClient::new();
        if let Ok(mut slot) = client.next_receipt.lock() {
            *slot = Some(MockChainClient::receipt_with_logs(vec![
                MockChainClient::failed_log(0, 0),
                MockChainClient::succeeded_log(1, 1),
            ]));
        }
        let fixture = fixture(client);
        let _ = seed_records(&fixture).await;

        let outcome = fixture.service.run_cycle().await;
        assert_eq!(
            outcome.ok(),
            Some(CycleOutcome::Completed {
                audited: 2,
                unreconciled: 0
            })
        );

        let Ok(rows) = fixture.store.records_with_events(None).await else {
            panic!("listing failed");
        };
        let failed = rows
            .iter()
            .flat_map(|row| row.events.iter())
            .filter(|event| event.event_type == EventType::SubcallFailed)
            .count();
        assert_eq!(failed, 1);

        // Consumed permits are final: nothing is reselected.
        let next = fixture.service.run_cycle().await;
        assert_eq!(next.ok(), Some(CycleOutcome::Idle));
    }

    #[tokio::test]
    async fn rejected_submission_leaves_records_pending() {
        let client = MockChainClient {
            fail_submit: Some("insufficient relayer balance".to_string()),
            ..MockChainClient::new()
        };
        let fixture = fixture(client);
        let seeded = seed_records(&fixture).await;

        let outcome = fixture.service.run_cycle().await;
        assert!(matches!(outcome, Err(RelayerError::Transaction(_))));

        // No outcome was persisted; the records stay selectable.
        let now = unix_time_now();
        let Ok(reselect) = fixture.store.unaudited_records(10, now).await else {
            panic!("selection failed");
        };
        assert_eq!(reselect.len(), seeded.len());
    }

    #[tokio::test]
    async fn missing_terminal_log_does_not_block_other_outcomes() {
        let client = MockChainClient::new();
        if let Ok(mut slot) = client.next_receipt.lock() {
            *slot = Some(MockChainClient::receipt_with_logs(vec![
                MockChainClient::succeeded_log(0, 0),
            ]));
        }
        let fixture = fixture(client);
        let _ = seed_records(&fixture).await;

        let outcome = fixture.service.run_cycle().await;
        assert_eq!(
            outcome.ok(),
            Some(CycleOutcome::Completed {
                audited: 1,
                unreconciled: 1
            })
        );

        // The uncorrelated record stays pending for the next cycle.
        let now = unix_time_now();
        let Ok(reselect) = fixture.store.unaudited_records(10, now).await else {
            panic!("selection failed");
        };
        assert_eq!(reselect.len(), 1);
    }

    #[tokio::test]
    async fn signing_failure_aborts_before_any_dispatch() {
        let fixture = fixture(MockChainClient::new());
        // A record from a device with no custodied key.
        let stranger = Record::new(Address::repeat_byte(0x99), 1, unix_time_now() - 10);
        let Ok(_) = fixture.store.insert_record(stranger).await else {
            panic!("seed failed");
        };

        let outcome = fixture.service.run_cycle().await;
        assert!(matches!(outcome, Err(RelayerError::Signing(_))));
        assert_eq!(fixture.client.submit_count(), 0);
    }
}
