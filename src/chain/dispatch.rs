//! Dispatcher: submits one encoded batch and awaits its inclusion.
//!
//! Retry policy lives one layer up: a failed or timed-out dispatch leaves
//! every record unaudited and eligible for the next cycle, so this
//! component never retries on its own.

use std::sync::Arc;
use std::time::Duration;

use super::batch::BatchPayload;
use super::client::{ChainClient, ChainReceipt};
use crate::error::RelayerError;

/// Submits batch payloads and enforces the bounded inclusion wait.
#[derive(Debug)]
pub struct Dispatcher {
    client: Arc<dyn ChainClient>,
    receipt_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher with the given inclusion timeout.
    #[must_use]
    pub fn new(client: Arc<dyn ChainClient>, receipt_timeout: Duration) -> Self {
        Self {
            client,
            receipt_timeout,
        }
    }

    /// Submits the batch as a single transaction and waits for its
    /// receipt, bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// - [`RelayerError::EncodingInvariant`] if the payload fails its
    ///   pre-dispatch validation.
    /// - [`RelayerError::Transaction`] if submission is rejected.
    /// - [`RelayerError::TransactionReverted`] if the whole batch
    ///   reverted on-chain (distinct from an individual sub-call failing).
    /// - [`RelayerError::ReceiptTimeout`] if inclusion was not observed in
    ///   time; the cycle is abandoned and records stay pending.
    pub async fn dispatch(&self, payload: &BatchPayload) -> Result<ChainReceipt, RelayerError> {
        payload.validate()?;

        tracing::debug!(sub_calls = payload.len(), "submitting batch transaction");

        let receipt = tokio::time::timeout(self.receipt_timeout, self.client.submit_batch(payload))
            .await
            .map_err(|_| RelayerError::ReceiptTimeout {
                waited_secs: self.receipt_timeout.as_secs(),
            })??;

        if !receipt.status {
            return Err(RelayerError::TransactionReverted(receipt.transaction_hash));
        }

        tracing::info!(
            tx_hash = %receipt.transaction_hash,
            block_number = receipt.block_number,
            logs = receipt.logs.len(),
            "batch transaction included"
        );
        Ok(receipt)
    }
}
