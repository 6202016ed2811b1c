//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::AuditService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Intake, listing, and audit status resolution.
    pub audit_service: Arc<AuditService>,
}
