//! Events Domain
//!
//! Read-side of the events listing service: validates listing parameters,
//! builds an ordered aggregation stage list, runs it against an
//! [`EventStore`] and assembles the response with categories and a random
//! sample of popular upcoming events.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      Listing Flow                             │
//! ├───────────────────────────────────────────────────────────────┤
//! │                                                               │
//! │  GET /api/events ─► ListingParams ─► build_listing_stages     │
//! │                                          │                    │
//! │                      ┌───────────────────┼──────────────┐     │
//! │                      ▼                   ▼              ▼     │
//! │               aggregate_page      popular_stages  categories  │
//! │                      │                   │              │     │
//! │                      └─────────► EventsResponse ◄───────┘     │
//! │                                                               │
//! └───────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod handlers;
mod memory;
mod models;
mod mongodb;
mod pipeline;
mod query;
mod repository;
mod response;
mod service;

pub use error::{EventError, Result};
pub use handlers::{ApiDoc, CategoriesApiDoc, EventsState, categories_router, events_router};
pub use memory::InMemoryEventStore;
pub use models::{
    CATEGORIES_COLLECTION, Category, EVENTS_COLLECTION, Event, EventEntries, EventGroup,
    EventListing, ListEventsQuery,
};
pub use crate::mongodb::MongoEventStore;
pub use pipeline::{
    Condition, OuterJoin, POPULAR_SAMPLE_SIZE, ProjectField, SortKey, Source, Stage,
    build_listing_stages, popular_stages,
};
pub use query::{DEFAULT_LIMIT, DEFAULT_PAGE, ListingParams, MAX_LIMIT, SortDirection, SortField};
pub use repository::{AggregatePage, EventStore, Pagination};
pub use response::{CategoriesResponse, EventsResponse, PopularResponse};
pub use service::EventService;
