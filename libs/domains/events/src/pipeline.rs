//! Listing pipeline stages
//!
//! Stages are store-agnostic: [`crate::mongodb`] translates them into an
//! aggregation pipeline, [`crate::memory`] evaluates them in process.
//!
//! ```text
//! text match ─► category join ─► identity match ─► date match
//!     ─► sort ─► project ─► [group by day ─► sort buckets]
//! ```

use crate::models::CATEGORIES_COLLECTION;
use crate::query::{ListingParams, SortDirection, SortField, end_of_day, start_of_day};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

pub const POPULAR_SAMPLE_SIZE: usize = 5;

/// Field the joined category lands in before projection.
pub const JOINED_CATEGORY: &str = "categories";

/// Key holding a bucket's events.
pub const GROUP_ITEMS: &str = "data";

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Case-insensitive literal substring match
    Contains { field: &'static str, text: String },
    Equals { field: &'static str, value: ObjectId },
    /// Inclusive on both ends; either end may be open
    Between {
        field: &'static str,
        gte: Option<DateTime<Utc>>,
        lte: Option<DateTime<Utc>>,
    },
}

/// Left outer join unwound to at most one joined document per row.
#[derive(Debug, Clone, PartialEq)]
pub struct OuterJoin {
    pub from: &'static str,
    pub local_field: &'static str,
    pub foreign_field: &'static str,
    pub as_field: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey {
    pub field: &'static str,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Source {
    /// Copy the value at this path
    Path(&'static str),
    /// Copy the value at this path, or null when missing
    PathOrNull(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectField {
    pub name: &'static str,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// All conditions must hold
    Match(Vec<Condition>),
    OuterJoin(OuterJoin),
    Sort(Vec<SortKey>),
    Project(Vec<ProjectField>),
    /// Buckets rows by the UTC `YYYY-MM-DD` of `field`, keeping input order
    /// inside each bucket under [`GROUP_ITEMS`].
    GroupByDay { field: &'static str },
    Sample(usize),
}

fn category_join() -> Stage {
    Stage::OuterJoin(OuterJoin {
        from: CATEGORIES_COLLECTION,
        local_field: "category",
        foreign_field: "_id",
        as_field: JOINED_CATEGORY,
    })
}

fn listing_projection() -> Stage {
    use Source::{Path, PathOrNull};

    let field = |name, source| ProjectField { name, source };
    Stage::Project(vec![
        field("_id", Path("_id")),
        field("userId", Path("userId")),
        field("name", Path("name")),
        field("location", Path("location")),
        field("start_date", Path("start_date")),
        field("end_date", PathOrNull("end_date")),
        field("description", Path("description")),
        field("category", PathOrNull("categories._id")),
        field("category_name", PathOrNull("categories.name")),
        field("image", PathOrNull("image")),
        field("createdAt", Path("createdAt")),
    ])
}

fn sort_with_tiebreak(field: SortField, direction: SortDirection) -> Stage {
    let mut keys = vec![SortKey {
        field: field.path(),
        direction,
    }];
    if field != SortField::Id {
        keys.push(SortKey {
            field: "_id",
            direction: SortDirection::Desc,
        });
    }
    Stage::Sort(keys)
}

fn date_condition(params: &ListingParams, now: DateTime<Utc>) -> Option<Condition> {
    let (gte, lte) = match (params.start, params.end) {
        (Some(start), Some(end)) => (Some(start_of_day(start)), Some(end)),
        (Some(start), None) => (Some(start_of_day(start)), Some(end_of_day(start))),
        (None, Some(end)) => (None, Some(end)),
        (None, None) if !params.is_search => (Some(now), None),
        (None, None) => return None,
    };
    Some(Condition::Between {
        field: "start_date",
        gte,
        lte,
    })
}

/// Ordered stages for one listing request.
pub fn build_listing_stages(params: &ListingParams, now: DateTime<Utc>) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(8);

    if let Some(text) = &params.search {
        stages.push(Stage::Match(vec![Condition::Contains {
            field: "name",
            text: text.clone(),
        }]));
    }

    stages.push(category_join());

    let identity: Vec<Condition> = [
        ("userId", params.user),
        ("category", params.category),
        ("_id", params.id),
    ]
    .into_iter()
    .filter_map(|(field, value)| value.map(|value| Condition::Equals { field, value }))
    .collect();
    if !identity.is_empty() {
        stages.push(Stage::Match(identity));
    }

    if let Some(condition) = date_condition(params, now) {
        stages.push(Stage::Match(vec![condition]));
    }

    stages.push(sort_with_tiebreak(params.sort_by, params.sort_order));
    stages.push(listing_projection());

    if params.group {
        stages.push(Stage::GroupByDay {
            field: "start_date",
        });
        stages.push(Stage::Sort(vec![SortKey {
            field: "_id",
            direction: params.sort_order,
        }]));
    }

    stages
}

/// Random sample of upcoming events with their category.
pub fn popular_stages(now: DateTime<Utc>) -> Vec<Stage> {
    vec![
        category_join(),
        Stage::Match(vec![Condition::Between {
            field: "start_date",
            gte: Some(now),
            lte: None,
        }]),
        sort_with_tiebreak(SortField::StartDate, SortDirection::Desc),
        listing_projection(),
        Stage::Sample(POPULAR_SAMPLE_SIZE),
    ]
}
