//! Service layer: business logic orchestration.
//!
//! [`AuditService`] answers intake and status queries;
//! [`RelayService`] runs the periodic dispatch cycle;
//! [`scheduler`] wires the cycle to a fixed-interval trigger.

pub mod audit_service;
pub mod relay_service;
pub mod scheduler;

pub use audit_service::AuditService;
pub use relay_service::{CycleOutcome, RelayService};
