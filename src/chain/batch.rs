//! Batch encoder: assembles the ordered multi-call payload for the batch
//! precompile.
//!
//! Array position is the only correlation key between a record and its
//! eventual on-chain outcome, so the order of permits fed in here is
//! preserved unchanged through dispatch and reconciliation.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

use super::abi::{
    AuditLedger, BatchPrecompile, CALL_PERMIT_PRECOMPILE_ADDRESS, CallPermitPrecompile,
    PERMIT_GAS_LIMIT,
};
use crate::domain::{RecordId, SignedPermit};
use crate::error::RelayerError;

/// Ordered argument arrays for one `batchSome` dispatch.
///
/// The four sequences are index-aligned: position `i` of each describes
/// sub-call `i`. `record_ids` carries the same order for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPayload {
    /// Destination of each sub-call (always the call-permit precompile).
    pub to: Vec<Address>,
    /// Native value of each sub-call (always zero).
    pub value: Vec<U256>,
    /// Encoded `dispatch` call for each sub-call.
    pub call_data: Vec<Bytes>,
    /// Gas limit forwarded to each sub-call.
    pub gas_limit: Vec<u64>,
    /// Originating record of each sub-call, in submission order.
    pub record_ids: Vec<RecordId>,
}

impl BatchPayload {
    /// Number of sub-calls in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.record_ids.len()
    }

    /// Returns `true` if the batch carries no sub-calls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record_ids.is_empty()
    }

    /// Rejects payloads that would be a contract-level bug to submit:
    /// empty batches and parallel arrays of unequal length.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::EncodingInvariant`] describing the
    /// violated invariant.
    pub fn validate(&self) -> Result<(), RelayerError> {
        if self.is_empty() {
            return Err(RelayerError::EncodingInvariant(
                "empty batch must not be dispatched".to_string(),
            ));
        }
        let n = self.record_ids.len();
        if self.to.len() != n
            || self.value.len() != n
            || self.call_data.len() != n
            || self.gas_limit.len() != n
        {
            return Err(RelayerError::EncodingInvariant(format!(
                "parallel array lengths diverge: to={} value={} call_data={} gas_limit={} records={n}",
                self.to.len(),
                self.value.len(),
                self.call_data.len(),
                self.gas_limit.len(),
            )));
        }
        Ok(())
    }

    /// ABI-encodes the `batchSome` call for submission.
    #[must_use]
    pub fn encode_call(&self) -> Vec<u8> {
        BatchPrecompile::batchSomeCall {
            to: self.to.clone(),
            value: self.value.clone(),
            callData: self.call_data.clone(),
            gasLimit: self.gas_limit.clone(),
        }
        .abi_encode()
    }
}

/// Encodes signed permits into a [`BatchPayload`].
#[derive(Debug, Clone, Copy)]
pub struct BatchEncoder {
    contract_address: Address,
}

impl BatchEncoder {
    /// Creates an encoder targeting the audit ledger contract.
    #[must_use]
    pub const fn new(contract_address: Address) -> Self {
        Self { contract_address }
    }

    /// Re-encodes each permit into a `dispatch` sub-call and assembles
    /// the four parallel arrays, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::EncodingInvariant`] for an empty input or
    /// if the assembled payload fails validation.
    pub fn encode_batch(&self, permits: &[SignedPermit]) -> Result<BatchPayload, RelayerError> {
        let call_data: Vec<Bytes> = permits
            .iter()
            .map(|permit| self.encode_dispatch(permit))
            .collect();

        let payload = BatchPayload {
            to: vec![CALL_PERMIT_PRECOMPILE_ADDRESS; permits.len()],
            value: vec![U256::ZERO; permits.len()],
            call_data,
            gas_limit: vec![PERMIT_GAS_LIMIT; permits.len()],
            record_ids: permits.iter().map(|permit| permit.record_id).collect(),
        };
        payload.validate()?;
        Ok(payload)
    }

    fn encode_dispatch(&self, permit: &SignedPermit) -> Bytes {
        let inner = AuditLedger::storeRecordCall {
            deviceAddress: permit.device_address,
            value: permit.value,
            timestamp: permit.timestamp,
        }
        .abi_encode();

        CallPermitPrecompile::dispatchCall {
            from: permit.device_address,
            to: self.contract_address,
            value: U256::ZERO,
            data: inner.into(),
            gaslimit: PERMIT_GAS_LIMIT,
            deadline: U256::from(permit.deadline),
            v: permit.signature.v,
            r: permit.signature.r,
            s: permit.signature.s,
        }
        .abi_encode()
        .into()
    }
}
