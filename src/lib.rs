//! # audit-relayer
//!
//! Batched on-chain audit relayer for field sensor readings.
//!
//! Devices submit readings ("records") over HTTP; the relayer periodically
//! gathers unaudited records, signs a gasless EIP-712 call permit for each
//! one with the custodied device key, submits a single batched transaction
//! through the batch precompile, and reconciles the emitted sub-call
//! outcomes back to the originating records.
//!
//! ## Architecture
//!
//! ```text
//! Devices / Operators (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── AuditService / RelayService (service/)
//!     │       │
//!     │       ├── PermitBuilder → BatchEncoder → Dispatcher → reconcile
//!     │       │   (chain/)
//!     │       └── RelayerKeystore + ChainClient (chain/)
//!     │
//!     └── RecordStore (persistence/: in-memory or PostgreSQL)
//! ```

pub mod api;
pub mod app_state;
pub mod chain;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
