//! API routes module
//!
//! Everything here is nested under `/api` by `axum_helpers::create_router`.

pub mod categories;
pub mod events;
pub mod health;

use axum::Router;
use domain_events::{EventService, MongoEventStore};
use std::sync::Arc;

use crate::state::AppState;

/// Create all API routes
pub fn routes(state: &AppState) -> Router {
    let service = Arc::new(EventService::new(MongoEventStore::new(&state.db)));

    Router::new()
        .nest("/events", events::router(service.clone()))
        .nest("/categories", categories::router(service))
        .merge(health::router(state.clone()))
}
