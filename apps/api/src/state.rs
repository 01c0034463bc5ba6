use std::sync::Arc;

use crate::pricing::engine::PricingEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the read-only reference snapshot and every pricing collaborator.
    pub engine: Arc<PricingEngine>,
}
