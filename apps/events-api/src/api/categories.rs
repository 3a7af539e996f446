//! Categories API routes

use axum::Router;
use domain_events::{EventsState, MongoEventStore};

pub fn router(service: EventsState<MongoEventStore>) -> Router {
    domain_events::categories_router().with_state(service)
}
