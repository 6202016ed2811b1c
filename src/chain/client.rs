//! Chain client: the JSON-RPC boundary of the dispatch pipeline.
//!
//! [`ChainClient`] is the collaborator contract the pipeline consumes;
//! transport details stay behind it. [`RpcChainClient`] is the production
//! implementation over an alloy HTTP provider with the relayer wallet
//! attached.

use std::fmt;

use alloy::consensus::BlockHeader;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use super::abi::{
    AuditLedger, BATCH_PRECOMPILE_ADDRESS, CALL_PERMIT_PRECOMPILE_ADDRESS, CallPermitPrecompile,
};
use super::batch::BatchPayload;
use crate::error::RelayerError;

/// One log emitted by an included transaction.
///
/// `log_index` is the block-wide counter shared with unrelated
/// transactions; it is recorded for auditability but must never be used
/// to correlate a log back to a sub-call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    /// Address that emitted the log.
    pub address: Address,
    /// Raw log topics; `topics[0]` is the event signature hash.
    pub topics: Vec<B256>,
    /// Raw ABI-encoded log data.
    pub data: Bytes,
    /// Block-wide log index (informational only).
    pub log_index: u64,
}

/// Receipt of an included transaction, reduced to what reconciliation
/// needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    /// Transaction hash.
    pub transaction_hash: B256,
    /// Hash of the including block.
    pub block_hash: B256,
    /// Number of the including block.
    pub block_number: u64,
    /// `true` if the transaction itself succeeded. Individual sub-call
    /// failures inside a batch do not clear this flag.
    pub status: bool,
    /// All logs emitted by the transaction, in emission order.
    pub logs: Vec<ReceiptLog>,
}

/// On-chain reads and writes the dispatch pipeline depends on.
#[async_trait]
pub trait ChainClient: Send + Sync + fmt::Debug {
    /// Current call-permit authorization nonce for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::ChainQuery`] on transport or decode failure.
    async fn permit_nonce(&self, owner: Address) -> Result<U256, RelayerError>;

    /// Timestamp (unix seconds) of the given block.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::ChainQuery`] if the block cannot be fetched.
    async fn block_timestamp(&self, block_number: u64) -> Result<u64, RelayerError>;

    /// Submits the batch as one transaction and awaits its inclusion.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Transaction`] if submission or the receipt
    /// fetch fails.
    async fn submit_batch(&self, payload: &BatchPayload) -> Result<ChainReceipt, RelayerError>;

    /// Registers an auditor on the audit ledger contract.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Transaction`] on submission failure.
    async fn register_auditor(&self, auditor: Address) -> Result<ChainReceipt, RelayerError>;

    /// Registers a device under an auditor on the audit ledger contract.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::Transaction`] on submission failure.
    async fn register_device(
        &self,
        auditor: Address,
        device: Address,
    ) -> Result<ChainReceipt, RelayerError>;
}

/// Production [`ChainClient`] over an alloy HTTP provider.
pub struct RpcChainClient {
    provider: DynProvider,
    contract_address: Address,
}

impl fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("contract_address", &self.contract_address)
            .finish_non_exhaustive()
    }
}

impl RpcChainClient {
    /// Connects to the chain over HTTP with the relayer wallet attached.
    ///
    /// # Errors
    ///
    /// Returns [`RelayerError::ChainQuery`] if the RPC URL is invalid.
    pub fn connect(
        rpc_url: &str,
        relayer: PrivateKeySigner,
        contract_address: Address,
    ) -> Result<Self, RelayerError> {
        let url = rpc_url
            .parse()
            .map_err(|e| RelayerError::ChainQuery(format!("invalid rpc url {rpc_url}: {e}")))?;
        let wallet = EthereumWallet::from(relayer);
        let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);
        Ok(Self {
            provider: provider.erased(),
            contract_address,
        })
    }

    async fn send_and_wait(&self, request: TransactionRequest) -> Result<ChainReceipt, RelayerError> {
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| RelayerError::Transaction(e.to_string()))?;

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| RelayerError::Transaction(e.to_string()))?;

        Ok(ChainReceipt {
            transaction_hash: receipt.transaction_hash,
            block_hash: receipt.block_hash.unwrap_or_default(),
            block_number: receipt.block_number.unwrap_or_default(),
            status: receipt.status(),
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| ReceiptLog {
                    address: log.inner.address,
                    topics: log.inner.data.topics().to_vec(),
                    data: log.inner.data.data.clone(),
                    log_index: log.log_index.unwrap_or_default(),
                })
                .collect(),
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn permit_nonce(&self, owner: Address) -> Result<U256, RelayerError> {
        let call = CallPermitPrecompile::noncesCall { owner };
        let request = TransactionRequest::default()
            .to(CALL_PERMIT_PRECOMPILE_ADDRESS)
            .input(call.abi_encode().into());

        let returned = self
            .provider
            .call(request)
            .await
            .map_err(|e| RelayerError::ChainQuery(format!("nonce lookup for {owner}: {e}")))?;

        CallPermitPrecompile::noncesCall::abi_decode_returns(&returned)
            .map_err(|e| RelayerError::ChainQuery(format!("nonce decode for {owner}: {e}")))
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64, RelayerError> {
        let block = self
            .provider
            .get_block_by_number(block_number.into())
            .await
            .map_err(|e| RelayerError::ChainQuery(format!("block {block_number}: {e}")))?
            .ok_or_else(|| RelayerError::ChainQuery(format!("block {block_number} not found")))?;

        Ok(block.header.timestamp())
    }

    async fn submit_batch(&self, payload: &BatchPayload) -> Result<ChainReceipt, RelayerError> {
        let request = TransactionRequest::default()
            .to(BATCH_PRECOMPILE_ADDRESS)
            .input(payload.encode_call().into());
        self.send_and_wait(request).await
    }

    async fn register_auditor(&self, auditor: Address) -> Result<ChainReceipt, RelayerError> {
        let call = AuditLedger::registerAuditorCall {
            auditorAddress: auditor,
        };
        let request = TransactionRequest::default()
            .to(self.contract_address)
            .input(call.abi_encode().into());
        self.send_and_wait(request).await
    }

    async fn register_device(
        &self,
        auditor: Address,
        device: Address,
    ) -> Result<ChainReceipt, RelayerError> {
        let call = AuditLedger::registerDeviceCall {
            auditorAddress: auditor,
            deviceAddress: device,
        };
        let request = TransactionRequest::default()
            .to(self.contract_address)
            .input(call.abi_encode().into());
        self.send_and_wait(request).await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory [`ChainClient`] used across the pipeline tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use alloy::primitives::{Address, B256, U256};
    use alloy::sol_types::SolEvent;
    use async_trait::async_trait;

    use super::{ChainClient, ChainReceipt, ReceiptLog};
    use crate::chain::abi::{BATCH_PRECOMPILE_ADDRESS, BatchPrecompile};
    use crate::chain::batch::BatchPayload;
    use crate::error::RelayerError;

    /// Mock chain with scripted nonces, timestamps and receipts.
    #[derive(Debug, Default)]
    pub(crate) struct MockChainClient {
        /// Per-owner scripted nonces (default zero).
        pub nonces: Mutex<HashMap<Address, u64>>,
        /// Every owner passed to `permit_nonce`, in call order.
        pub nonce_calls: Mutex<Vec<Address>>,
        /// Scripted block timestamps.
        pub block_timestamps: Mutex<HashMap<u64, u64>>,
        /// Receipt to return from the next `submit_batch`; when `None`, a
        /// receipt with one `SubcallSucceeded` log per sub-call is built.
        pub next_receipt: Mutex<Option<ChainReceipt>>,
        /// Number of `submit_batch` calls observed.
        pub submit_calls: AtomicUsize,
        /// Artificial inclusion delay before returning the receipt.
        pub submit_delay: Option<Duration>,
        /// When set, `submit_batch` fails with this message.
        pub fail_submit: Option<String>,
    }

    impl MockChainClient {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn submit_count(&self) -> usize {
            self.submit_calls.load(Ordering::SeqCst)
        }

        /// Builds a successful log for sub-call `index`.
        pub(crate) fn succeeded_log(index: usize, log_index: u64) -> ReceiptLog {
            let event = BatchPrecompile::SubcallSucceeded {
                index: U256::from(index),
            };
            ReceiptLog {
                address: BATCH_PRECOMPILE_ADDRESS,
                topics: vec![BatchPrecompile::SubcallSucceeded::SIGNATURE_HASH],
                data: event.encode_data().into(),
                log_index,
            }
        }

        /// Builds a failed log for sub-call `index`.
        pub(crate) fn failed_log(index: usize, log_index: u64) -> ReceiptLog {
            let event = BatchPrecompile::SubcallFailed {
                index: U256::from(index),
            };
            ReceiptLog {
                address: BATCH_PRECOMPILE_ADDRESS,
                topics: vec![BatchPrecompile::SubcallFailed::SIGNATURE_HASH],
                data: event.encode_data().into(),
                log_index,
            }
        }

        pub(crate) fn receipt_with_logs(logs: Vec<ReceiptLog>) -> ChainReceipt {
            ChainReceipt {
                transaction_hash: B256::repeat_byte(0xab),
                block_hash: B256::repeat_byte(0xcd),
                block_number: 1_000,
                status: true,
                logs,
            }
        }
    }

    #[async_trait]
    impl ChainClient for MockChainClient {
        async fn permit_nonce(&self, owner: Address) -> Result<U256, RelayerError> {
            if let Ok(mut calls) = self.nonce_calls.lock() {
                calls.push(owner);
            }
            let nonce = self
                .nonces
                .lock()
                .ok()
                .and_then(|map| map.get(&owner).copied())
                .unwrap_or(0);
            Ok(U256::from(nonce))
        }

        async fn block_timestamp(&self, block_number: u64) -> Result<u64, RelayerError> {
            self.block_timestamps
                .lock()
                .ok()
                .and_then(|map| map.get(&block_number).copied())
                .ok_or_else(|| {
                    RelayerError::ChainQuery(format!("block {block_number} not found"))
                })
        }

        async fn submit_batch(&self, payload: &BatchPayload) -> Result<ChainReceipt, RelayerError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.submit_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.fail_submit {
                return Err(RelayerError::Transaction(message.clone()));
            }
            let scripted = self.next_receipt.lock().ok().and_then(|mut slot| slot.take());
            Ok(scripted.unwrap_or_else(|| {
                let logs = (0..payload.len())
                    .map(|i| Self::succeeded_log(i, i as u64))
                    .collect();
                Self::receipt_with_logs(logs)
            }))
        }

        async fn register_auditor(&self, _auditor: Address) -> Result<ChainReceipt, RelayerError> {
            Ok(Self::receipt_with_logs(Vec::new()))
        }

        async fn register_device(
            &self,
            _auditor: Address,
            _device: Address,
        ) -> Result<ChainReceipt, RelayerError> {
            Ok(Self::receipt_with_logs(Vec::new()))
        }
    }
}
