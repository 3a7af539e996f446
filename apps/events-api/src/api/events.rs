//! Events API routes

use axum::Router;
use domain_events::{EventsState, MongoEventStore};
use tracing::info;

pub fn router(service: EventsState<MongoEventStore>) -> Router {
    domain_events::events_router().with_state(service)
}

/// Create the indexes the listing queries rely on
pub async fn init_indexes(db: &mongodb::Database) -> eyre::Result<()> {
    MongoEventStore::new(db)
        .create_indexes()
        .await
        .map_err(|e| eyre::eyre!("Failed to create event indexes: {}", e))?;
    info!("Event and category indexes created");
    Ok(())
}
