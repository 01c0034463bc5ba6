pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::pricing::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Pricing API
        .route("/api/v1/pricing", post(handlers::handle_price))
        .route("/api/v1/pricing/match", post(handlers::handle_match))
        // Reference data
        .route("/api/v1/taxonomy/:code", get(handlers::handle_get_taxonomy))
        .with_state(state)
}
