//! HTTP handlers for the events and categories APIs

use crate::models::{Category, EventEntries, EventGroup, EventListing, ListEventsQuery};
use crate::repository::EventStore;
use crate::response::{CategoriesResponse, EventsResponse, PopularResponse};
use crate::service::EventService;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use axum_helpers::AppError;
use axum_helpers::errors::responses::{BadRequestValidationResponse, InternalServerErrorResponse};
use std::sync::Arc;
use tracing::instrument;
use utoipa::OpenApi;

/// OpenAPI documentation for the events API
#[derive(OpenApi)]
#[openapi(
    paths(list_events, popular_events),
    components(
        schemas(EventsResponse, PopularResponse, EventEntries, EventGroup, EventListing, Category),
        responses(BadRequestValidationResponse, InternalServerErrorResponse)
    ),
    tags(
        (name = "events", description = "Event listing, search and popular picks")
    )
)]
pub struct ApiDoc;

/// OpenAPI documentation for the categories API
#[derive(OpenApi)]
#[openapi(
    paths(list_categories),
    components(
        schemas(CategoriesResponse, Category),
        responses(InternalServerErrorResponse)
    ),
    tags(
        (name = "categories", description = "Event categories")
    )
)]
pub struct CategoriesApiDoc;

/// Shared service handle
pub type EventsState<S> = Arc<EventService<S>>;

/// Routes mounted under `/events`
pub fn events_router<S: EventStore + 'static>() -> Router<EventsState<S>> {
    Router::new()
        .route("/", get(list_events::<S>))
        .route("/popular", get(popular_events::<S>))
}

/// Routes mounted under `/categories`
pub fn categories_router<S: EventStore + 'static>() -> Router<EventsState<S>> {
    Router::new().route("/", get(list_categories::<S>))
}

/// List events with search, filters, sorting, pagination and day grouping
#[utoipa::path(
    get,
    path = "",
    params(ListEventsQuery),
    responses(
        (status = 200, description = "Listing page", body = EventsResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state, query))]
pub async fn list_events<S: EventStore>(
    State(state): State<EventsState<S>>,
    query: Result<Query<ListEventsQuery>, QueryRejection>,
) -> Result<Json<EventsResponse>, AppError> {
    let Query(query) = query?;
    Ok(Json(state.list_events(query).await?))
}

/// Random sample of up to five upcoming events
#[utoipa::path(
    get,
    path = "/popular",
    responses(
        (status = 200, description = "Popular events", body = PopularResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    tag = "events"
)]
#[instrument(skip(state))]
pub async fn popular_events<S: EventStore>(
    State(state): State<EventsState<S>>,
) -> Result<Json<PopularResponse>, AppError> {
    let popular = state.popular().await?;
    Ok(Json(PopularResponse { popular }))
}

/// All categories in display order
#[utoipa::path(
    get,
    path = "",
    responses(
        (status = 200, description = "Categories", body = CategoriesResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    tag = "categories"
)]
#[instrument(skip(state))]
pub async fn list_categories<S: EventStore>(
    State(state): State<EventsState<S>>,
) -> Result<Json<CategoriesResponse>, AppError> {
    let categories = state.categories().await?;
    Ok(Json(CategoriesResponse { categories }))
}
