//! Listing response assembly

use crate::models::{Category, EventEntries, EventListing};
use crate::repository::Pagination;
use serde::Serialize;
use utoipa::ToSchema;

/// Listing page with pagination metadata, categories and popular events
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    /// Listing rows, or day buckets when `grouped`
    pub events: EventEntries,
    pub total_results: u64,
    pub limit: u64,
    pub page: u64,
    pub total_pages: u64,
    /// 1-based index of the first item on this page
    pub paging_counter: u64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<u64>,
    pub next_page: Option<u64>,
    pub categories: Vec<Category>,
    pub popular: Vec<EventListing>,
    pub grouped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PopularResponse {
    pub popular: Vec<EventListing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

impl EventsResponse {
    pub fn assemble(
        events: EventEntries,
        total_results: u64,
        pagination: Pagination,
        categories: Vec<Category>,
        popular: Vec<EventListing>,
        grouped: bool,
    ) -> Self {
        let Pagination { page, limit } = pagination;
        let total_pages = total_results.div_ceil(limit).max(1);
        let has_prev_page = page > 1;
        let has_next_page = page < total_pages;

        Self {
            events,
            total_results,
            limit,
            page,
            total_pages,
            paging_counter: pagination.skip().saturating_add(1),
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| page - 1),
            next_page: has_next_page.then(|| page + 1),
            categories,
            popular,
            grouped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assemble(total: u64, page: u64, limit: u64) -> EventsResponse {
        EventsResponse::assemble(
            EventEntries::Flat(vec![]),
            total,
            Pagination::new(page, limit),
            vec![],
            vec![],
            false,
        )
    }

    #[test]
    fn test_middle_page() {
        let response = assemble(5, 2, 2);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.paging_counter, 3);
        assert_eq!(response.prev_page, Some(1));
        assert_eq!(response.next_page, Some(3));
        assert!(response.has_prev_page && response.has_next_page);
    }

    #[test]
    fn test_empty_result_has_one_page() {
        let response = assemble(0, 1, 5);
        assert_eq!(response.total_pages, 1);
        assert!(!response.has_next_page);
        assert!(!response.has_prev_page);
        assert_eq!(response.next_page, None);
        assert_eq!(response.prev_page, None);
    }

    #[test]
    fn test_page_past_the_end() {
        let response = assemble(3, 4, 5);
        assert_eq!(response.total_pages, 1);
        assert!(!response.has_next_page);
        assert_eq!(response.prev_page, Some(3));
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let response = assemble(3, 9_999_999_999, 100);
        assert_eq!(response.page, 9_999_999_999);
        assert_eq!(response.paging_counter, 999_999_999_801);
        assert_eq!(response.total_pages, 1);
        assert!(!response.has_next_page);

        let response = assemble(0, i64::MAX as u64, 100);
        assert_eq!(response.paging_counter, u64::MAX);
    }

    #[test]
    fn test_every_field_is_serialized() {
        let value = serde_json::to_value(assemble(0, 1, 5)).unwrap();
        for key in [
            "events",
            "totalResults",
            "limit",
            "page",
            "totalPages",
            "pagingCounter",
            "hasPrevPage",
            "hasNextPage",
            "prevPage",
            "nextPage",
            "categories",
            "popular",
            "grouped",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["events"], json!([]));
        assert_eq!(value["nextPage"], json!(null));
    }
}
