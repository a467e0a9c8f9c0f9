//! HTTP surface of the fan-out service

mod error;
pub mod health;
pub mod subscriptions;

use std::sync::Arc;

use axum::Router;
use streamfan_core::repository::SubscriberRegistry;
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult, ErrorResponse};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn SubscriberRegistry>,
}

/// Create the HTTP router with all routes
pub fn create_router(registry: Arc<dyn SubscriberRegistry>) -> Router {
    let state = AppState { registry };

    Router::new()
        .merge(health::create_health_router())
        .merge(subscriptions::create_subscriptions_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
