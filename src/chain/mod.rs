//! Blockchain layer: permit signing, batch encoding, dispatch, and
//! receipt reconciliation.
//!
//! The pipeline run by each audit cycle:
//!
//! ```text
//! PermitBuilder::build_permit   (nonce fetch + EIP-712 signing, per record)
//!     → BatchEncoder::encode_batch   (four parallel arrays, order-preserving)
//!     → Dispatcher::dispatch         (one batchSome transaction, bounded await)
//!     → reconcile                    (terminal logs → per-record outcomes)
//! ```
//!
//! All network I/O goes through the [`ChainClient`] trait so the pipeline
//! itself stays testable against a mock.

pub mod abi;
pub mod batch;
pub mod client;
pub mod dispatch;
pub mod permit;
pub mod reconcile;
pub mod signer;

pub use batch::{BatchEncoder, BatchPayload};
pub use client::{ChainClient, ChainReceipt, ReceiptLog, RpcChainClient};
pub use dispatch::Dispatcher;
pub use permit::PermitBuilder;
pub use reconcile::{ReconciledBatch, ReconciliationFailure, reconcile};
pub use signer::RelayerKeystore;
