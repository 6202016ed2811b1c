//! Receipt reconciliation: maps emitted batch outcomes back to records.
//!
//! The batch precompile emits one terminal event per attempted sub-call,
//! carrying the sub-call's position in the submission order. That position
//! is the only valid correlation key; a log's own `log_index` is a
//! block-wide counter shared with unrelated transactions and is carried on
//! the outcome purely for auditability.

use alloy::sol_types::SolEvent;

use super::abi::{BATCH_PRECOMPILE_ADDRESS, BatchPrecompile};
use super::client::{ChainReceipt, ReceiptLog};
use crate::domain::{AuditEvent, EventType, RecordId};

/// Result of reconciling one receipt against the submission order.
///
/// Correlation failures never block the outcomes that did correlate; the
/// caller persists `outcomes` and reports `failures`.
#[derive(Debug, Clone)]
pub struct ReconciledBatch {
    /// One terminal outcome per successfully correlated sub-call.
    pub outcomes: Vec<AuditEvent>,
    /// Sub-calls or logs that could not be correlated.
    pub failures: Vec<ReconciliationFailure>,
}

/// A log or sub-call that could not be reconciled.
#[derive(Debug, Clone)]
pub struct ReconciliationFailure {
    /// The affected record, when the failure is attributable to one.
    pub record_id: Option<RecordId>,
    /// The sub-call position involved, when one was decodable.
    pub position: Option<usize>,
    /// Human-readable description of the mismatch.
    pub reason: String,
}

/// Correlates every terminal batch log in `receipt` with the record at
/// the same sub-call position in `order`.
///
/// Logs emitted by addresses other than the batch precompile (for
/// example the inner ledger call's own events) are not terminal markers
/// and are skipped. A record with no terminal log, a position outside the
/// batch, a duplicate position, and an unrecognized batch event are each
/// reported as failures.
#[must_use]
pub fn reconcile(receipt: &ChainReceipt, order: &[RecordId]) -> ReconciledBatch {
    let mut outcomes = Vec::with_capacity(order.len());
    let mut failures = Vec::new();
    let mut matched = vec![false; order.len()];

    for log in &receipt.logs {
        if log.address != BATCH_PRECOMPILE_ADDRESS {
            tracing::trace!(address = %log.address, "skipping non-terminal log");
            continue;
        }

        let (event_type, position) = match decode_terminal(log) {
            Ok(decoded) => decoded,
            Err(reason) => {
                failures.push(ReconciliationFailure {
                    record_id: None,
                    position: None,
                    reason,
                });
                continue;
            }
        };

        let Some(record_id) = order.get(position).copied() else {
            failures.push(ReconciliationFailure {
                record_id: None,
                position: Some(position),
                reason: format!("sub-call position {position} outside batch of {}", order.len()),
            });
            continue;
        };

        let Some(slot) = matched.get_mut(position) else {
            continue;
        };
        if *slot {
            failures.push(ReconciliationFailure {
                record_id: Some(record_id),
                position: Some(position),
                reason: format!("duplicate terminal log for sub-call {position}"),
            });
            continue;
        }
        *slot = true;

        outcomes.push(AuditEvent {
            record_id,
            event_type,
            transaction_hash: receipt.transaction_hash,
            block_hash: receipt.block_hash,
            block_number: receipt.block_number,
            log_index: log.log_index,
            address: log.address,
            data: log.data.clone(),
            topics: log.topics.clone(),
        });
    }

    for (position, (record_id, seen)) in order.iter().zip(matched.iter()).enumerate() {
        if !*seen {
            failures.push(ReconciliationFailure {
                record_id: Some(*record_id),
                position: Some(position),
                reason: format!("no terminal log emitted for sub-call {position}"),
            });
        }
    }

    ReconciledBatch { outcomes, failures }
}

/// Decodes a batch-precompile log into its outcome class and sub-call
/// position.
fn decode_terminal(log: &ReceiptLog) -> Result<(EventType, usize), String> {
    let Some(topic0) = log.topics.first() else {
        return Err("batch log without topics".to_string());
    };

    let decoded = if *topic0 == BatchPrecompile::SubcallSucceeded::SIGNATURE_HASH {
        BatchPrecompile::SubcallSucceeded::decode_raw_log(log.topics.iter().copied(), &log.data)
            .map(|event| (EventType::SubcallSucceeded, event.index))
    } else if *topic0 == BatchPrecompile::SubcallFailed::SIGNATURE_HASH {
        BatchPrecompile::SubcallFailed::decode_raw_log(log.topics.iter().copied(), &log.data)
            .map(|event| (EventType::SubcallFailed, event.index))
    } else {
        return Err(format!("unrecognized batch event topic {topic0}"));
    };

    let (event_type, raw_index) =
        decoded.map_err(|e| format!("terminal log decode failed: {e}"))?;
    let position = usize::try_from(raw_index)
        .map_err(|_| format!("sub-call index {raw_index} does not fit a position"))?;
    Ok((event_type, position))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::client::mock::MockChainClient;
    use alloy::primitives::{Address, B256, Bytes};

    fn order(n: usize) -> Vec<RecordId> {
        (0..n).map(|_| RecordId::new()).collect()
    }

    #[test]
    fn outcomes_follow_submission_position_not_log_index() {
        // Three records; positions 0 and 2 succeed, 1 fails. The raw
        // block-wide log indices are deliberately unrelated.
        let order = order(3);
        let receipt = MockChainClient::receipt_with_logs(vec![
            MockChainClient::succeeded_log(0, 17),
            MockChainClient::failed_log(1, 42),
            MockChainClient::succeeded_log(2, 99),
        ]);

        let reconciled = reconcile(&receipt, &order);
        assert!(reconciled.failures.is_empty());
        assert_eq!(reconciled.outcomes.len(), 3);

        let by_record: Vec<(Option<&RecordId>, EventType)> = reconciled
            .outcomes
            .iter()
            .map(|o| (Some(&o.record_id), o.event_type))
            .collect();
        assert_eq!(
            by_record,
            vec![
                (order.first(), EventType::SubcallSucceeded),
                (order.get(1), EventType::SubcallFailed),
                (order.get(2), EventType::SubcallSucceeded),
            ]
        );
    }

    #[test]
    fn shuffled_log_order_still_correlates() {
        let order = order(2);
        let receipt = MockChainClient::receipt_with_logs(vec![
            MockChainClient::succeeded_log(1, 5),
            MockChainClient::failed_log(0, 6),
        ]);

        let reconciled = reconcile(&receipt, &order);
        assert!(reconciled.failures.is_empty());

        let failed = reconciled
            .outcomes
            .iter()
            .find(|o| o.event_type == EventType::SubcallFailed)
            .map(|o| o.record_id);
        assert_eq!(failed, order.first().copied());
    }

    #[test]
    fn missing_terminal_log_is_reported_without_dropping_others() {
        let order = order(2);
        let receipt =
            MockChainClient::receipt_with_logs(vec![MockChainClient::succeeded_log(0, 0)]);

        let reconciled = reconcile(&receipt, &order);
        assert_eq!(reconciled.outcomes.len(), 1);
        assert_eq!(reconciled.failures.len(), 1);
        let failure = reconciled.failures.first();
        assert_eq!(failure.and_then(|f| f.position), Some(1));
        assert_eq!(
            failure.and_then(|f| f.record_id),
            order.get(1).copied()
        );
    }

    #[test]
    fn out_of_range_position_is_a_failure() {
        let order = order(2);
        let receipt = MockChainClient::receipt_with_logs(vec![
            MockChainClient::succeeded_log(0, 0),
            MockChainClient::succeeded_log(1, 1),
            MockChainClient::succeeded_log(5, 2),
        ]);

        let reconciled = reconcile(&receipt, &order);
        assert_eq!(reconciled.outcomes.len(), 2);
        assert_eq!(reconciled.failures.len(), 1);
    }

    #[test]
    fn duplicate_position_keeps_first_outcome() {
        let order = order(1);
        let receipt = MockChainClient::receipt_with_logs(vec![
            MockChainClient::succeeded_log(0, 0),
            MockChainClient::failed_log(0, 1),
        ]);

        let reconciled = reconcile(&receipt, &order);
        assert_eq!(reconciled.outcomes.len(), 1);
        assert_eq!(
            reconciled.outcomes.first().map(|o| o.event_type),
            Some(EventType::SubcallSucceeded)
        );
        assert_eq!(reconciled.failures.len(), 1);
    }

    #[test]
    fn foreign_logs_are_not_terminal_markers() {
        let order = order(1);
        let receipt = MockChainClient::receipt_with_logs(vec![
            // Inner ledger event from the audited contract.
            ReceiptLog {
                address: Address::repeat_byte(0x42),
                topics: vec![B256::repeat_byte(0x77)],
                data: Bytes::new(),
                log_index: 3,
            },
            MockChainClient::succeeded_log(0, 4),
        ]);

        let reconciled = reconcile(&receipt, &order);
        assert_eq!(reconciled.outcomes.len(), 1);
        assert!(reconciled.failures.is_empty());
    }

    #[test]
    fn unrecognized_batch_event_is_a_failure() {
        let order = order(1);
        let receipt = MockChainClient::receipt_with_logs(vec![
            ReceiptLog {
                address: BATCH_PRECOMPILE_ADDRESS,
                topics: vec![B256::repeat_byte(0x66)],
                data: Bytes::new(),
                log_index: 0,
            },
            MockChainClient::succeeded_log(0, 1),
        ]);

        let reconciled = reconcile(&receipt, &order);
        assert_eq!(reconciled.outcomes.len(), 1);
        assert_eq!(reconciled.failures.len(), 1);
    }
}
