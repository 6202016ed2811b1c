//! Permit builder: turns an unsigned record into a signed, deadline-bounded
//! authorization for the call-permit precompile.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::sol_types::{Eip712Domain, SolCall};

use super::abi::{
    AuditLedger, CallPermit, PERMIT_GAS_LIMIT, PERMIT_VALIDITY_WINDOW_SECS, call_permit_domain,
};
use super::client::ChainClient;
use super::signer::RelayerKeystore;
use crate::domain::{Record, SignedPermit};
use crate::error::RelayerError;

/// Builds and signs call permits for unaudited records.
///
/// Nonce discipline is fetch-then-sign: the device's authorization nonce
/// is read immediately before signing and never cached across records,
/// since nonces are monotonic per device and a stale nonce invalidates
/// the signature at dispatch time.
#[derive(Debug)]
pub struct PermitBuilder {
    keystore: Arc<RelayerKeystore>,
    client: Arc<dyn ChainClient>,
    contract_address: Address,
    domain: Eip712Domain,
}

impl PermitBuilder {
    /// Creates a builder bound to the audit ledger contract and the
    /// permit domain of the given chain.
    #[must_use]
    pub fn new(
        keystore: Arc<RelayerKeystore>,
        client: Arc<dyn ChainClient>,
        contract_address: Address,
        chain_id: u64,
    ) -> Self {
        Self {
            keystore,
            client,
            contract_address,
            domain: call_permit_domain(chain_id),
        }
    }

    /// Builds a fully signed permit for one record.
    ///
    /// The deadline is `record.timestamp` plus the fixed one-day validity
    /// window; the inner call is `storeRecord(device, value, timestamp)`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::ChainQuery`] if the nonce cannot be
    /// fetched, or [`RelayerError::Signing`] if key material for the
    /// device is unavailable.
    pub async fn build_permit(&self, record: &Record) -> Result<SignedPermit, RelayerError> {
        let nonce = self.client.permit_nonce(record.device_address).await?;
        let deadline = record.timestamp.saturating_add(PERMIT_VALIDITY_WINDOW_SECS);

        let inner = AuditLedger::storeRecordCall {
            deviceAddress: record.device_address,
            value: record.value,
            timestamp: record.timestamp,
        }
        .abi_encode();

        let permit = CallPermit {
            from: record.device_address,
            to: self.contract_address,
            value: U256::ZERO,
            data: inner.into(),
            gaslimit: PERMIT_GAS_LIMIT,
            nonce,
            deadline: U256::from(deadline),
        };

        let signature = self
            .keystore
            .sign_permit(record.device_address, &permit, &self.domain)?;

        tracing::debug!(
            record_id = %record.id,
            device = %record.device_address,
            deadline,
            "permit signed"
        );

        Ok(SignedPermit {
            record_id: record.id,
            device_address: record.device_address,
            value: record.value,
            timestamp: record.timestamp,
            deadline,
            signature,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::client::mock::MockChainClient;

    const DEVICE_KEY: &str =
        "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const RELAYER_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn builder_with(client: Arc<MockChainClient>) -> (PermitBuilder, Address) {
        let Ok(keystore) = RelayerKeystore::from_keys(RELAYER_KEY, &[DEVICE_KEY.to_string()])
        else {
            panic!("keystore construction failed");
        };
        let device = keystore.device_addresses().first().copied();
        let Some(device) = device else {
            panic!("expected one device");
        };
        let builder = PermitBuilder::new(
            Arc::new(keystore),
            client,
            Address::repeat_byte(0x42),
            1287,
        );
        (builder, device)
    }

    #[tokio::test]
    async fn deadline_is_timestamp_plus_one_day() {
        let client = Arc::new(MockChainClient::new());
        let (builder, device) = builder_with(Arc::clone(&client));

        let record = Record::new(device, 21, 1_700_000_000);
        let Ok(permit) = builder.build_permit(&record).await else {
            panic!("permit build failed");
        };
        assert_eq!(permit.deadline, 1_700_000_000 + 86_400);
        assert_eq!(permit.record_id, record.id);
    }

    #[tokio::test]
    async fn nonce_is_fetched_per_record() {
        let client = Arc::new(MockChainClient::new());
        let (builder, device) = builder_with(Arc::clone(&client));

        let first = Record::new(device, 1, 1_700_000_000);
        let second = Record::new(device, 2, 1_700_000_100);
        let _ = builder.build_permit(&first).await;
        let _ = builder.build_permit(&second).await;

        let calls = client.nonce_calls.lock().ok().map(|c| c.len());
        assert_eq!(calls, Some(2));
    }

    #[tokio::test]
    async fn unknown_device_fails_with_signing_error() {
        let client = Arc::new(MockChainClient::new());
        let (builder, _device) = builder_with(client);

        let record = Record::new(Address::repeat_byte(0x99), 1, 1_700_000_000);
        let result = builder.build_permit(&record).await;
        assert!(matches!(result, Err(RelayerError::Signing(_))));
    }
}
