//! Event domain models

use chrono::{DateTime, Utc};
use mongodb::bson::{self, Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const EVENTS_COLLECTION: &str = "events";
pub const CATEGORIES_COLLECTION: &str = "categories";

/// Serde adapters between stored BSON values and the JSON wire format.
pub(crate) mod wire {
    use chrono::{DateTime, Utc};
    use mongodb::bson::{self, oid::ObjectId};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn hex<S: Serializer>(id: &ObjectId, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&id.to_hex())
    }

    pub fn hex_opt<S: Serializer>(id: &Option<ObjectId>, s: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => s.serialize_some(&id.to_hex()),
            None => s.serialize_none(),
        }
    }

    pub fn datetime<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let value = bson::DateTime::deserialize(d)?;
        DateTime::from_timestamp_millis(value.timestamp_millis())
            .ok_or_else(|| D::Error::custom("date out of range"))
    }

    pub fn datetime_opt<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<bson::DateTime>::deserialize(d)? {
            Some(value) => DateTime::from_timestamp_millis(value.timestamp_millis())
                .map(Some)
                .ok_or_else(|| D::Error::custom("date out of range")),
            None => Ok(None),
        }
    }

    pub fn to_bson(dt: DateTime<Utc>) -> bson::DateTime {
        bson::DateTime::from_millis(dt.timestamp_millis())
    }
}

/// A stored event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub name: String,
    pub location: String,
    pub address: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub description: String,
    pub category: Option<ObjectId>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(user_id: ObjectId, name: impl Into<String>, start_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            user_id,
            name: name.into(),
            location: String::new(),
            address: None,
            start_date,
            end_date: None,
            description: String::new(),
            category: None,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    pub fn with_category(mut self, category: ObjectId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Stored representation; optional fields are omitted when unset.
    pub fn to_document(&self) -> Document {
        let mut document = doc! {
            "_id": self.id,
            "userId": self.user_id,
            "name": &self.name,
            "location": &self.location,
            "start_date": wire::to_bson(self.start_date),
            "description": &self.description,
            "createdAt": wire::to_bson(self.created_at),
            "updatedAt": wire::to_bson(self.updated_at),
        };
        if let Some(address) = &self.address {
            document.insert("address", address);
        }
        if let Some(end_date) = self.end_date {
            document.insert("end_date", wire::to_bson(end_date));
        }
        if let Some(category) = self.category {
            document.insert("category", category);
        }
        if let Some(image) = &self.image {
            document.insert("image", image);
        }
        document
    }
}

/// Event category, ordered for display by `order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    #[serde(rename = "_id", serialize_with = "wire::hex")]
    #[schema(value_type = String, example = "65f1c0de2a9b4e0012a3b4c5")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub order: i32,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "wire::datetime_opt"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "updatedAt",
        default,
        deserialize_with = "wire::datetime_opt"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Category {
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        let now = Utc::now();
        Self {
            id: ObjectId::new(),
            name: name.into(),
            order,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    pub fn to_document(&self) -> Document {
        let mut document = doc! {
            "_id": self.id,
            "name": &self.name,
            "order": self.order,
        };
        if let Some(created_at) = self.created_at {
            document.insert("createdAt", wire::to_bson(created_at));
        }
        if let Some(updated_at) = self.updated_at {
            document.insert("updatedAt", wire::to_bson(updated_at));
        }
        document
    }

    pub fn from_document(document: Document) -> Result<Self, bson::de::Error> {
        bson::from_document(document)
    }
}

/// One row of a listing: the projected shape of an event joined with its
/// category. Nullable fields are always serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventListing {
    #[serde(rename = "_id", serialize_with = "wire::hex")]
    #[schema(value_type = String, example = "65f1c0de2a9b4e0012a3b4c5")]
    pub id: ObjectId,
    #[serde(rename = "userId", serialize_with = "wire::hex")]
    #[schema(value_type = String)]
    pub user_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(deserialize_with = "wire::datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "wire::datetime_opt")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
    #[serde(default, serialize_with = "wire::hex_opt")]
    #[schema(value_type = Option<String>)]
    pub category: Option<ObjectId>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "wire::datetime_opt"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl EventListing {
    pub fn from_document(document: Document) -> Result<Self, bson::de::Error> {
        bson::from_document(document)
    }
}

/// Events sharing one UTC calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventGroup {
    /// Day key, `YYYY-MM-DD`
    #[serde(rename = "_id")]
    pub day: String,
    pub data: Vec<EventListing>,
}

/// Listing page content: flat rows, or day buckets when grouping is on.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum EventEntries {
    Flat(Vec<EventListing>),
    Grouped(Vec<EventGroup>),
}

impl EventEntries {
    /// Decodes aggregation output into the shape matching `grouped`.
    pub fn from_documents(docs: Vec<Document>, grouped: bool) -> Result<Self, bson::de::Error> {
        if grouped {
            docs.into_iter()
                .map(bson::from_document)
                .collect::<Result<Vec<EventGroup>, _>>()
                .map(Self::Grouped)
        } else {
            docs.into_iter()
                .map(EventListing::from_document)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Flat)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Flat(rows) => rows.len(),
            Self::Grouped(groups) => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw listing query parameters. Everything arrives as text and is
/// validated into [`crate::query::ListingParams`].
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEventsQuery {
    /// Case-insensitive text search on the event name
    pub q: Option<String>,
    /// Owning user id
    pub user: Option<String>,
    /// Category id
    pub category: Option<String>,
    /// Event id
    pub id: Option<String>,
    /// Day (`YYYY-MM-DD`) or date-time lower bound
    pub start: Option<String>,
    /// Upper bound on the start date
    pub end: Option<String>,
    /// Projected field to sort by (default `start_date`)
    pub sort_by: Option<String>,
    /// `asc`, anything else sorts descending
    pub sort_order: Option<String>,
    /// `false` or `0` disables day grouping
    pub group: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn listing_document() -> Document {
        doc! {
            "_id": ObjectId::parse_str("65f1c0de2a9b4e0012a3b4c5").unwrap(),
            "userId": ObjectId::parse_str("65f1c0de2a9b4e0012a3b400").unwrap(),
            "name": "Jazz night",
            "location": "Harbor",
            "start_date": bson::DateTime::from_millis(1_710_000_000_000),
            "end_date": bson::Bson::Null,
            "description": "",
            "category": bson::Bson::Null,
            "category_name": bson::Bson::Null,
            "image": bson::Bson::Null,
            "createdAt": bson::DateTime::from_millis(1_700_000_000_000),
        }
    }

    #[test]
    fn test_listing_serializes_nulls_and_hex_ids() {
        let listing = EventListing::from_document(listing_document()).unwrap();
        let value = serde_json::to_value(&listing).unwrap();

        assert_eq!(value["_id"], json!("65f1c0de2a9b4e0012a3b4c5"));
        assert_eq!(value["userId"], json!("65f1c0de2a9b4e0012a3b400"));
        assert_eq!(value["category"], json!(null));
        assert_eq!(value["category_name"], json!(null));
        assert_eq!(value["end_date"], json!(null));
        assert_eq!(value["image"], json!(null));
        assert_eq!(value["start_date"], json!("2024-03-09T16:00:00Z"));
    }

    #[test]
    fn test_listing_tolerates_missing_optional_fields() {
        let mut document = listing_document();
        document.remove("end_date");
        document.remove("image");
        document.remove("createdAt");

        let listing = EventListing::from_document(document).unwrap();
        assert!(listing.end_date.is_none());
        assert!(listing.image.is_none());
        assert!(listing.created_at.is_none());
    }

    #[test]
    fn test_event_document_omits_unset_fields() {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 18, 0, 0).unwrap();
        let event = Event::new(ObjectId::new(), "Open air", start);
        let document = event.to_document();

        assert!(!document.contains_key("category"));
        assert!(!document.contains_key("end_date"));
        assert_eq!(
            document.get_datetime("start_date").unwrap().timestamp_millis(),
            start.timestamp_millis()
        );

        let category = ObjectId::new();
        let document = event.with_category(category).to_document();
        assert_eq!(document.get_object_id("category").unwrap(), category);
    }

    #[test]
    fn test_category_round_trips_through_document() {
        let category = Category::new("Music", 2);
        let decoded = Category::from_document(category.to_document()).unwrap();

        assert_eq!(decoded.id, category.id);
        assert_eq!(decoded.order, 2);
        assert_eq!(
            decoded.created_at.map(|dt| dt.timestamp_millis()),
            category.created_at.map(|dt| dt.timestamp_millis())
        );
    }

    #[test]
    fn test_category_order_defaults_to_zero() {
        let category = Category::from_document(doc! {
            "_id": ObjectId::new(),
            "name": "Misc",
        })
        .unwrap();
        assert_eq!(category.order, 0);
    }

    #[test]
    fn test_entries_decode_groups() {
        let docs = vec![doc! {
            "_id": "2024-03-09",
            "data": [listing_document()],
        }];

        let entries = EventEntries::from_documents(docs, true).unwrap();
        match &entries {
            EventEntries::Grouped(groups) => {
                assert_eq!(groups[0].day, "2024-03-09");
                assert_eq!(groups[0].data.len(), 1);
            }
            EventEntries::Flat(_) => panic!("expected groups"),
        }

        let value = serde_json::to_value(&entries).unwrap();
        assert_eq!(value[0]["_id"], json!("2024-03-09"));
    }

    #[test]
    fn test_flat_entries_serialize_as_plain_array() {
        let entries = EventEntries::from_documents(vec![listing_document()], false).unwrap();
        let value = serde_json::to_value(&entries).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["name"], json!("Jazz night"));
    }
}
