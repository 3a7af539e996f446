//! Event listing service

use crate::error::{EventError, Result};
use crate::models::{Category, EventEntries, EventListing, ListEventsQuery};
use crate::pipeline::{Stage, build_listing_stages, popular_stages};
use crate::query::ListingParams;
use crate::repository::{AggregatePage, EventStore, Pagination};
use crate::response::EventsResponse;
use chrono::{DateTime, Utc};
use observability::{ListingMetrics, QueryKind, QueryTimer};
use tracing::{debug, instrument};

/// Runs listing, popular and category queries against an [`EventStore`]
pub struct EventService<S: EventStore> {
    store: S,
}

impl<S: EventStore> EventService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate the raw query, then list at the current instant.
    #[instrument(skip(self, query))]
    pub async fn list_events(&self, query: ListEventsQuery) -> Result<EventsResponse> {
        let params = ListingParams::try_from(query).inspect_err(|e| {
            debug!(error = %e, "Rejected listing query");
            ListingMetrics::record_rejected(QueryKind::Listing);
        })?;
        self.list_with_params(&params, Utc::now()).await
    }

    /// One listing page plus categories and a popular sample, fetched
    /// concurrently; the first failure fails the whole response.
    #[instrument(
        skip(self, params, now),
        fields(
            page = params.page,
            limit = params.limit,
            grouped = params.group,
            is_search = params.is_search
        )
    )]
    pub async fn list_with_params(
        &self,
        params: &ListingParams,
        now: DateTime<Utc>,
    ) -> Result<EventsResponse> {
        let stages = build_listing_stages(params, now);
        let pagination = Pagination::new(params.page, params.limit);

        let (page, categories, popular) = tokio::try_join!(
            self.run_listing(&stages, pagination),
            self.categories(),
            self.popular_at(now),
        )?;

        let events = EventEntries::from_documents(page.docs, params.group)?;
        debug!(
            total = page.total,
            returned = events.len(),
            "Listing assembled"
        );

        Ok(EventsResponse::assemble(
            events,
            page.total,
            pagination,
            categories,
            popular,
            params.group,
        ))
    }

    async fn run_listing(
        &self,
        stages: &[Stage],
        pagination: Pagination,
    ) -> Result<AggregatePage> {
        let timer = QueryTimer::start(QueryKind::Listing);
        let result = self.store.aggregate_page(stages, pagination).await;
        timer.finish(result.as_ref().map(|page| page.docs.len()));
        result
    }

    /// Up to five random upcoming events.
    #[instrument(skip(self))]
    pub async fn popular(&self) -> Result<Vec<EventListing>> {
        self.popular_at(Utc::now()).await
    }

    async fn popular_at(&self, now: DateTime<Utc>) -> Result<Vec<EventListing>> {
        let timer = QueryTimer::start(QueryKind::Popular);
        let result = self.store.aggregate(&popular_stages(now)).await;
        timer.finish(result.as_ref().map(Vec::len));

        result?
            .into_iter()
            .map(|d| EventListing::from_document(d).map_err(EventError::from))
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>> {
        let timer = QueryTimer::start(QueryKind::Categories);
        let result = self.store.list_categories().await;
        timer.finish(result.as_ref().map(Vec::len));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::POPULAR_SAMPLE_SIZE;
    use crate::repository::mock::MockEventStore;
    use chrono::TimeZone;
    use mongodb::bson::{doc, oid::ObjectId};

    fn listing_doc(name: &str) -> mongodb::bson::Document {
        doc! {
            "_id": ObjectId::new(),
            "userId": ObjectId::new(),
            "name": name,
            "location": "",
            "start_date": mongodb::bson::DateTime::from_millis(1_900_000_000_000),
            "end_date": null,
            "description": "",
            "category": null,
            "category_name": null,
            "image": null,
            "createdAt": mongodb::bson::DateTime::now(),
        }
    }

    fn empty_side_queries(mock: &mut MockEventStore) {
        mock.expect_list_categories().returning(|| Ok(vec![]));
        mock.expect_aggregate().returning(|_| Ok(vec![]));
    }

    #[tokio::test]
    async fn test_list_passes_pagination_to_store() {
        let mut mock = MockEventStore::new();
        mock.expect_aggregate_page()
            .withf(|stages, page| {
                !stages.is_empty() && page.page == 2 && page.limit == 2
            })
            .times(1)
            .returning(|_, _| {
                Ok(AggregatePage {
                    docs: vec![listing_doc("c"), listing_doc("d")],
                    total: 5,
                })
            });
        empty_side_queries(&mut mock);

        let service = EventService::new(mock);
        let response = service
            .list_events(ListEventsQuery {
                page: Some("2".into()),
                limit: Some("2".into()),
                group: Some("false".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.total_results, 5);
        assert_eq!(response.page, 2);
        assert_eq!(response.total_pages, 3);
        assert!(!response.grouped);
        match response.events {
            EventEntries::Flat(rows) => {
                let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
                assert_eq!(names, ["c", "d"]);
            }
            EventEntries::Grouped(_) => panic!("expected flat rows"),
        }
    }

    #[tokio::test]
    async fn test_invalid_query_never_reaches_store() {
        let mut mock = MockEventStore::new();
        mock.expect_aggregate_page().never();
        mock.expect_aggregate().never();
        mock.expect_list_categories().never();

        let service = EventService::new(mock);
        let err = service
            .list_events(ListEventsQuery {
                category: Some("bogus".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EventError::InvalidId { field: "category", .. }));
    }

    #[tokio::test]
    async fn test_side_query_failure_fails_response() {
        let mut mock = MockEventStore::new();
        mock.expect_aggregate_page()
            .returning(|_, _| Ok(AggregatePage::default()));
        mock.expect_aggregate().returning(|_| Ok(vec![]));
        mock.expect_list_categories()
            .returning(|| Err(EventError::Internal("categories unavailable".into())));

        let service = EventService::new(mock);
        let err = service
            .list_events(ListEventsQuery::default())
            .await
            .unwrap_err();

        assert!(matches!(err, EventError::Internal(_)));
    }

    #[tokio::test]
    async fn test_popular_uses_sample_stage() {
        let mut mock = MockEventStore::new();
        mock.expect_aggregate()
            .withf(|stages| stages.last() == Some(&Stage::Sample(POPULAR_SAMPLE_SIZE)))
            .times(1)
            .returning(|_| Ok(vec![listing_doc("a"), listing_doc("b")]));

        let service = EventService::new(mock);
        let popular = service.popular().await.unwrap();
        assert_eq!(popular.len(), 2);
    }

    #[tokio::test]
    async fn test_grouped_output_is_decoded_as_buckets() {
        let mut mock = MockEventStore::new();
        mock.expect_aggregate_page().returning(|_, _| {
            Ok(AggregatePage {
                docs: vec![doc! { "_id": "2030-03-17", "data": [listing_doc("a")] }],
                total: 1,
            })
        });
        empty_side_queries(&mut mock);

        let service = EventService::new(mock);
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let response = service
            .list_with_params(&ListingParams::default(), now)
            .await
            .unwrap();

        assert!(response.grouped);
        assert!(matches!(response.events, EventEntries::Grouped(ref g) if g.len() == 1));
    }

    #[tokio::test]
    async fn test_malformed_document_is_decode_error() {
        let mut mock = MockEventStore::new();
        mock.expect_aggregate()
            .returning(|_| Ok(vec![doc! { "name": "no id" }]));

        let service = EventService::new(mock);
        let err = service.popular().await.unwrap_err();
        assert!(matches!(err, EventError::Decode(_)));
    }
}
