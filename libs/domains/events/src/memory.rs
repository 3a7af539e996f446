//! In-process EventStore that evaluates pipeline stages directly
//!
//! Ordering follows MongoDB's cross-type comparison order, with missing
//! values treated as null. Strings compare case-insensitively first and put
//! lowercase before uppercase on ties, approximating the `en` collation.

use crate::error::{EventError, Result};
use crate::models::{CATEGORIES_COLLECTION, Category, EVENTS_COLLECTION, Event};
use crate::pipeline::{Condition, GROUP_ITEMS, OuterJoin, ProjectField, SortKey, Source, Stage};
use crate::query::SortDirection;
use crate::repository::{AggregatePage, EventStore, Pagination};
use async_trait::async_trait;
use chrono::DateTime;
use mongodb::bson::{Bson, Document, doc};
use rand::seq::SliceRandom;
use regex::RegexBuilder;
use std::cmp::Ordering;
use tokio::sync::RwLock;
use tracing::instrument;

#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<Document>>,
    categories: RwLock<Vec<Document>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(events: &[Event], categories: &[Category]) -> Self {
        Self {
            events: RwLock::new(events.iter().map(Event::to_document).collect()),
            categories: RwLock::new(categories.iter().map(Category::to_document).collect()),
        }
    }

    pub async fn insert_event(&self, event: &Event) {
        self.events.write().await.push(event.to_document());
    }

    pub async fn insert_category(&self, category: &Category) {
        self.categories.write().await.push(category.to_document());
    }

    async fn run(&self, stages: &[Stage]) -> Result<Vec<Document>> {
        let events = self.events.read().await;
        let categories = self.categories.read().await;

        let mut rows = events.clone();
        for stage in stages {
            rows = match stage {
                Stage::Match(conditions) => {
                    let predicates = conditions
                        .iter()
                        .map(Predicate::compile)
                        .collect::<Result<Vec<_>>>()?;
                    rows.into_iter()
                        .filter(|row| predicates.iter().all(|p| p.matches(row)))
                        .collect()
                }
                Stage::OuterJoin(join) => {
                    let foreign: &[Document] = match join.from {
                        CATEGORIES_COLLECTION => categories.as_slice(),
                        EVENTS_COLLECTION => events.as_slice(),
                        other => {
                            return Err(EventError::Internal(format!(
                                "unknown collection '{other}'"
                            )));
                        }
                    };
                    outer_join(rows, foreign, join)
                }
                Stage::Sort(keys) => {
                    rows.sort_by(|a, b| compare_rows(a, b, keys));
                    rows
                }
                Stage::Project(fields) => rows.iter().map(|row| project(row, fields)).collect(),
                Stage::GroupByDay { field } => group_by_day(rows, field),
                Stage::Sample(size) => {
                    rows.shuffle(&mut rand::rng());
                    rows.truncate(*size);
                    rows
                }
            };
        }
        Ok(rows)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[instrument(skip(self, stages, page), fields(stages = stages.len(), page = page.page, limit = page.limit))]
    async fn aggregate_page(&self, stages: &[Stage], page: Pagination) -> Result<AggregatePage> {
        let rows = self.run(stages).await?;
        let total = rows.len() as u64;
        let docs = rows
            .into_iter()
            .skip(usize::try_from(page.skip()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
            .collect();
        Ok(AggregatePage { docs, total })
    }

    #[instrument(skip(self, stages), fields(stages = stages.len()))]
    async fn aggregate(&self, stages: &[Stage]) -> Result<Vec<Document>> {
        self.run(stages).await
    }

    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut docs = self.categories.read().await.clone();
        docs.sort_by(|a, b| {
            compare_rows(
                a,
                b,
                &[
                    SortKey {
                        field: "order",
                        direction: SortDirection::Asc,
                    },
                    SortKey {
                        field: "_id",
                        direction: SortDirection::Asc,
                    },
                ],
            )
        });
        docs.into_iter()
            .map(|d| Category::from_document(d).map_err(EventError::from))
            .collect()
    }
}

enum Predicate<'a> {
    Regex(&'static str, regex::Regex),
    Equals(&'static str, Bson),
    Between(&'a Condition),
}

impl<'a> Predicate<'a> {
    fn compile(condition: &'a Condition) -> Result<Self> {
        Ok(match condition {
            Condition::Contains { field, text } => {
                let re = RegexBuilder::new(&regex::escape(text))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| EventError::Internal(e.to_string()))?;
                Self::Regex(*field, re)
            }
            Condition::Equals { field, value } => Self::Equals(*field, Bson::ObjectId(*value)),
            Condition::Between { .. } => Self::Between(condition),
        })
    }

    fn matches(&self, row: &Document) -> bool {
        match self {
            Self::Regex(field, re) => {
                matches!(lookup(row, field), Some(Bson::String(s)) if re.is_match(s))
            }
            Self::Equals(field, value) => lookup(row, field) == Some(value),
            Self::Between(Condition::Between { field, gte, lte }) => {
                let Some(Bson::DateTime(value)) = lookup(row, field) else {
                    return false;
                };
                let millis = value.timestamp_millis();
                gte.is_none_or(|gte| millis >= gte.timestamp_millis())
                    && lte.is_none_or(|lte| millis <= lte.timestamp_millis())
            }
            Self::Between(_) => false,
        }
    }
}

/// Value at a dotted path.
fn lookup<'a>(row: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut value = row.get(parts.next()?)?;
    for part in parts {
        value = value.as_document()?.get(part)?;
    }
    Some(value)
}

fn outer_join(rows: Vec<Document>, foreign: &[Document], join: &OuterJoin) -> Vec<Document> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let local = lookup(&row, join.local_field).cloned();
        let matched: Vec<&Document> = match &local {
            Some(key) if *key != Bson::Null => foreign
                .iter()
                .filter(|f| lookup(f, join.foreign_field) == Some(key))
                .collect(),
            _ => Vec::new(),
        };

        if matched.is_empty() {
            let mut row = row;
            row.remove(join.as_field);
            out.push(row);
            continue;
        }
        for joined in matched {
            let mut row = row.clone();
            row.insert(join.as_field, joined.clone());
            out.push(row);
        }
    }
    out
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        Some(Bson::MinKey) => 0,
        None | Some(Bson::Null) | Some(Bson::Undefined) => 1,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)) => 2,
        Some(Bson::String(_) | Bson::Symbol(_)) => 3,
        Some(Bson::Document(_)) => 4,
        Some(Bson::Array(_)) => 5,
        Some(Bson::Binary(_)) => 6,
        Some(Bson::ObjectId(_)) => 7,
        Some(Bson::Boolean(_)) => 8,
        Some(Bson::DateTime(_)) => 9,
        Some(Bson::Timestamp(_)) => 10,
        Some(Bson::RegularExpression(_)) => 11,
        Some(Bson::MaxKey) => 13,
        Some(_) => 12,
    }
}

fn number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(Bson::String(a)), Some(Bson::String(b))) => collate(a, b),
        (Some(Bson::ObjectId(a)), Some(Bson::ObjectId(b))) => a.bytes().cmp(&b.bytes()),
        (Some(Bson::Boolean(a)), Some(Bson::Boolean(b))) => a.cmp(b),
        (Some(Bson::DateTime(a)), Some(Bson::DateTime(b))) => {
            a.timestamp_millis().cmp(&b.timestamp_millis())
        }
        (Some(a), Some(b)) => match (number(a), number(b)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

fn compare_rows(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    keys.iter()
        .map(|key| {
            let ordering = compare_values(lookup(a, key.field), lookup(b, key.field));
            match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        })
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn project(row: &Document, fields: &[ProjectField]) -> Document {
    let mut out = Document::new();
    for field in fields {
        match field.source {
            Source::Path(path) => {
                if let Some(value) = lookup(row, path) {
                    out.insert(field.name, value.clone());
                }
            }
            Source::PathOrNull(path) => {
                let value = lookup(row, path).cloned().unwrap_or(Bson::Null);
                out.insert(field.name, value);
            }
        }
    }
    out
}

fn day_key(value: Option<&Bson>) -> Bson {
    match value {
        Some(Bson::DateTime(dt)) => DateTime::from_timestamp_millis(dt.timestamp_millis())
            .map(|dt| Bson::String(dt.format("%Y-%m-%d").to_string()))
            .unwrap_or(Bson::Null),
        _ => Bson::Null,
    }
}

fn group_by_day(rows: Vec<Document>, field: &str) -> Vec<Document> {
    let mut buckets: Vec<(Bson, Vec<Bson>)> = Vec::new();
    for row in rows {
        let key = day_key(lookup(&row, field));
        match buckets.iter_mut().find(|(k, _)| *k == key) {
            Some((_, items)) => items.push(Bson::Document(row)),
            None => buckets.push((key, vec![Bson::Document(row)])),
        }
    }
    buckets
        .into_iter()
        .map(|(key, items)| {
            let mut bucket = doc! { "_id": key };
            bucket.insert(GROUP_ITEMS, items);
            bucket
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn test_collation_orders_case_insensitively() {
        let mut names = vec!["banana", "Apple", "apple", "Cherry"];
        names.sort_by(|a, b| collate(a, b));
        assert_eq!(names, ["apple", "Apple", "banana", "Cherry"]);
    }

    #[test]
    fn test_missing_sorts_as_null_before_values() {
        let with = doc! { "name": "a" };
        let without = doc! {};
        let keys = [SortKey {
            field: "name",
            direction: SortDirection::Asc,
        }];
        assert_eq!(compare_rows(&without, &with, &keys), Ordering::Less);
        assert_eq!(
            compare_values(Some(&Bson::Null), None),
            Ordering::Equal
        );
    }

    #[test]
    fn test_lookup_dotted_path() {
        let row = doc! { "categories": { "name": "Music" } };
        assert_eq!(
            lookup(&row, "categories.name"),
            Some(&Bson::String("Music".into()))
        );
        assert_eq!(lookup(&row, "categories._id"), None);
    }

    #[test]
    fn test_outer_join_keeps_unmatched_rows() {
        let music = ObjectId::new();
        let rows = vec![
            doc! { "_id": 1, "category": music },
            doc! { "_id": 2, "category": ObjectId::new() },
            doc! { "_id": 3 },
        ];
        let foreign = vec![doc! { "_id": music, "name": "Music" }];
        let join = OuterJoin {
            from: CATEGORIES_COLLECTION,
            local_field: "category",
            foreign_field: "_id",
            as_field: "categories",
        };

        let joined = outer_join(rows, &foreign, &join);
        assert_eq!(joined.len(), 3);
        assert_eq!(
            lookup(&joined[0], "categories.name"),
            Some(&Bson::String("Music".into()))
        );
        assert!(!joined[1].contains_key("categories"));
        assert!(!joined[2].contains_key("categories"));
    }

    #[test]
    fn test_group_by_day_keeps_input_order() {
        let day = |d, h| {
            Bson::DateTime(mongodb::bson::DateTime::from_millis(
                Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0)
                    .unwrap()
                    .timestamp_millis(),
            ))
        };
        let rows = vec![
            doc! { "n": 1, "start_date": day(10, 22) },
            doc! { "n": 2, "start_date": day(11, 1) },
            doc! { "n": 3, "start_date": day(10, 8) },
        ];

        let groups = group_by_day(rows, "start_date");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].get_str("_id").unwrap(), "2024-03-10");
        let items = groups[0].get_array("data").unwrap();
        let ns: Vec<_> = items
            .iter()
            .map(|b| b.as_document().unwrap().get_i32("n").unwrap())
            .collect();
        assert_eq!(ns, [1, 3]);
    }

    #[test]
    fn test_between_requires_dates() {
        let condition = Condition::Between {
            field: "start_date",
            gte: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            lte: None,
        };
        let predicate = Predicate::compile(&condition).unwrap();
        assert!(!predicate.matches(&doc! { "start_date": "2024-06-01" }));
        assert!(!predicate.matches(&doc! {}));
        assert!(predicate.matches(&doc! {
            "start_date": mongodb::bson::DateTime::from_millis(
                Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap().timestamp_millis()
            )
        }));
    }

    #[tokio::test]
    async fn test_sample_truncates() {
        let user = ObjectId::new();
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let events: Vec<Event> = (0..8)
            .map(|i| Event::new(user, format!("e{i}"), start))
            .collect();
        let store = InMemoryEventStore::with_data(&events, &[]);

        let docs = store.aggregate(&[Stage::Sample(5)]).await.unwrap();
        assert_eq!(docs.len(), 5);
    }

    #[tokio::test]
    async fn test_categories_sorted_by_order_then_id() {
        let store = InMemoryEventStore::new();
        let a = Category::new("Later", 2);
        let b = Category::new("First", 0);
        let c = Category::new("Also first", 0);
        for category in [&a, &b, &c] {
            store.insert_category(category).await;
        }

        let names: Vec<_> = store
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        // ObjectIds created in sequence ascend
        assert_eq!(names, ["First", "Also first", "Later"]);
    }
}
