//! MongoDB implementation of EventStore

use crate::error::{EventError, Result};
use crate::models::{CATEGORIES_COLLECTION, Category, EVENTS_COLLECTION, wire};
use crate::pipeline::{Condition, GROUP_ITEMS, ProjectField, SortKey, Source, Stage};
use crate::repository::{AggregatePage, EventStore, Pagination};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{AggregateOptions, Collation, FindOptions};
use mongodb::{Collection, Database, IndexModel};
use tracing::instrument;

/// MongoDB-backed event store
#[derive(Clone)]
pub struct MongoEventStore {
    events: Collection<Document>,
    categories: Collection<Document>,
}

impl MongoEventStore {
    pub fn new(database: &Database) -> Self {
        Self {
            events: database.collection(EVENTS_COLLECTION),
            categories: database.collection(CATEGORIES_COLLECTION),
        }
    }

    /// Create indexes backing the listing filters and sorts
    pub async fn create_indexes(&self) -> Result<()> {
        let event_indexes = vec![
            // Upcoming listing: range on start_date, tie-break on _id
            IndexModel::builder()
                .keys(doc! { "start_date": -1, "_id": -1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "userId": 1, "start_date": -1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "category": 1, "start_date": -1 })
                .build(),
        ];
        self.events.create_indexes(event_indexes).await?;

        self.categories
            .create_index(IndexModel::builder().keys(doc! { "order": 1, "_id": 1 }).build())
            .await?;
        Ok(())
    }

    fn options() -> AggregateOptions {
        AggregateOptions::builder()
            .collation(Collation::builder().locale("en").build())
            .build()
    }
}

fn condition_value(condition: &Condition) -> (&'static str, Bson) {
    match condition {
        Condition::Contains { field, text } => (
            *field,
            Bson::Document(doc! { "$regex": regex::escape(text), "$options": "i" }),
        ),
        Condition::Equals { field, value } => (*field, Bson::ObjectId(*value)),
        Condition::Between { field, gte, lte } => {
            let mut range = Document::new();
            if let Some(gte) = gte {
                range.insert("$gte", wire::to_bson(*gte));
            }
            if let Some(lte) = lte {
                range.insert("$lte", wire::to_bson(*lte));
            }
            (*field, Bson::Document(range))
        }
    }
}

fn sort_document(keys: &[SortKey]) -> Document {
    keys.iter()
        .map(|key| (key.field.to_string(), Bson::Int32(key.direction.as_i32())))
        .collect()
}

fn project_document(fields: &[ProjectField]) -> Document {
    fields
        .iter()
        .map(|field| {
            let value = match field.source {
                Source::Path(path) if path == field.name => Bson::Int32(1),
                Source::Path(path) => Bson::String(format!("${path}")),
                Source::PathOrNull(path) => {
                    Bson::Document(doc! { "$ifNull": [format!("${path}"), Bson::Null] })
                }
            };
            (field.name.to_string(), value)
        })
        .collect()
}

/// Translate one stage into its aggregation pipeline documents.
pub fn stage_documents(stage: &Stage) -> Vec<Document> {
    match stage {
        Stage::Match(conditions) => {
            let filter: Document = conditions
                .iter()
                .map(|c| {
                    let (field, value) = condition_value(c);
                    (field.to_string(), value)
                })
                .collect();
            vec![doc! { "$match": filter }]
        }
        Stage::OuterJoin(join) => vec![
            doc! {
                "$lookup": {
                    "from": join.from,
                    "localField": join.local_field,
                    "foreignField": join.foreign_field,
                    "as": join.as_field,
                }
            },
            doc! {
                "$unwind": {
                    "path": format!("${}", join.as_field),
                    "preserveNullAndEmptyArrays": true,
                }
            },
        ],
        Stage::Sort(keys) => vec![doc! { "$sort": sort_document(keys) }],
        Stage::Project(fields) => vec![doc! { "$project": project_document(fields) }],
        Stage::GroupByDay { field } => {
            let mut group = doc! {
                "_id": {
                    "$dateToString": {
                        "format": "%Y-%m-%d",
                        "date": format!("${field}"),
                        "timezone": "UTC",
                    }
                },
            };
            group.insert(GROUP_ITEMS, doc! { "$push": "$$ROOT" });
            vec![doc! { "$group": group }]
        }
        Stage::Sample(size) => vec![doc! { "$sample": { "size": *size as i64 } }],
    }
}

pub fn pipeline(stages: &[Stage]) -> Vec<Document> {
    stages.iter().flat_map(stage_documents).collect()
}

/// `$facet` producing the requested page and the unpaginated count.
fn page_facet(page: Pagination) -> Document {
    doc! {
        "$facet": {
            "events": [
                { "$skip": i64::try_from(page.skip()).unwrap_or(i64::MAX) },
                { "$limit": i64::try_from(page.limit).unwrap_or(i64::MAX) },
            ],
            "total": [ { "$count": "count" } ],
        }
    }
}

fn read_page(facet: Document) -> Result<AggregatePage> {
    let docs = facet
        .get_array("events")
        .map_err(|e| EventError::Internal(format!("facet events: {e}")))?
        .iter()
        .filter_map(|value| value.as_document().cloned())
        .collect();

    let total = match facet.get_array("total") {
        Ok(counts) => counts
            .first()
            .and_then(Bson::as_document)
            .and_then(|count| match count.get("count") {
                Some(Bson::Int32(n)) => Some(*n as u64),
                Some(Bson::Int64(n)) => Some(*n as u64),
                _ => None,
            })
            .unwrap_or(0),
        Err(e) => return Err(EventError::Internal(format!("facet total: {e}"))),
    };

    Ok(AggregatePage { docs, total })
}

#[async_trait]
impl EventStore for MongoEventStore {
    #[instrument(skip(self, stages, page), fields(stages = stages.len(), page = page.page, limit = page.limit))]
    async fn aggregate_page(&self, stages: &[Stage], page: Pagination) -> Result<AggregatePage> {
        let mut docs = pipeline(stages);
        docs.push(page_facet(page));

        let mut cursor = self
            .events
            .aggregate(docs)
            .with_options(Self::options())
            .await?;

        match cursor.try_next().await? {
            Some(facet) => read_page(facet),
            None => Ok(AggregatePage::default()),
        }
    }

    #[instrument(skip(self, stages), fields(stages = stages.len()))]
    async fn aggregate(&self, stages: &[Stage]) -> Result<Vec<Document>> {
        let cursor = self
            .events
            .aggregate(pipeline(stages))
            .with_options(Self::options())
            .await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs)
    }

    #[instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let options = FindOptions::builder()
            .sort(doc! { "order": 1, "_id": 1 })
            .build();

        let cursor = self.categories.find(doc! {}).with_options(options).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        docs.into_iter()
            .map(|d| Category::from_document(d).map_err(EventError::from))
            .collect()
    }
}
