//! Event store trait

use crate::error::Result;
use crate::models::Category;
use crate::pipeline::Stage;
use async_trait::async_trait;
use mongodb::bson::Document;

/// 1-based page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Rows before this page; saturates instead of overflowing.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// One page of aggregation output plus the total before pagination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatePage {
    pub docs: Vec<Document>,
    pub total: u64,
}

/// Read access to events and categories.
///
/// Implementations run [`Stage`]s against the `events` collection with
/// English collation for string ordering.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Run the stages, then count and slice the output.
    async fn aggregate_page(&self, stages: &[Stage], page: Pagination) -> Result<AggregatePage>;

    /// Run the stages without pagination.
    async fn aggregate(&self, stages: &[Stage]) -> Result<Vec<Document>>;

    /// All categories ordered by `order`, then `_id`.
    async fn list_categories(&self) -> Result<Vec<Category>>;
}
