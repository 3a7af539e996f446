//! MongoEventStore against a real MongoDB
//!
//! Run with `cargo test -p domain_events -- --ignored` (requires Docker).

use chrono::{DateTime, TimeZone, Utc};
use domain_events::*;
use mongodb::bson::Document;
use test_utils::{TestDataBuilder, TestMongo};

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

async fn seeded(events: &[Event], categories: &[Category]) -> (TestMongo, MongoEventStore) {
    let mongo = TestMongo::new().await;
    let database = mongo.database();

    if !events.is_empty() {
        database
            .collection::<Document>(EVENTS_COLLECTION)
            .insert_many(events.iter().map(Event::to_document))
            .await
            .unwrap();
    }
    if !categories.is_empty() {
        database
            .collection::<Document>(CATEGORIES_COLLECTION)
            .insert_many(categories.iter().map(Category::to_document))
            .await
            .unwrap();
    }

    let store = MongoEventStore::new(&database);
    store.create_indexes().await.unwrap();
    (mongo, store)
}

fn flat_names(response: &EventsResponse) -> Vec<&str> {
    match &response.events {
        EventEntries::Flat(rows) => rows.iter().map(|r| r.name.as_str()).collect(),
        EventEntries::Grouped(_) => panic!("expected flat rows"),
    }
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_mongo_outer_join_and_pagination() {
    let builder = TestDataBuilder::from_test_name("mongo_join");
    let music = Category::new("Music", 0);
    let events: Vec<Event> = (1..=5)
        .map(|n| {
            let event = Event::new(builder.user_id(), format!("Event {n}"), at(2099, 7, n, 12))
                .with_id(builder.object_id(n));
            if n % 2 == 0 {
                event.with_category(music.id)
            } else {
                event
            }
        })
        .collect();
    let (_mongo, store) = seeded(&events, std::slice::from_ref(&music)).await;
    let service = EventService::new(store);

    let params = ListingParams {
        group: false,
        sort_order: SortDirection::Asc,
        page: 2,
        limit: 2,
        ..ListingParams::default()
    };
    let response = service.list_with_params(&params, Utc::now()).await.unwrap();

    assert_eq!(response.total_results, 5);
    assert_eq!(flat_names(&response), ["Event 3", "Event 4"]);
    match &response.events {
        EventEntries::Flat(rows) => {
            assert_eq!(rows[0].category, None);
            assert_eq!(rows[1].category_name.as_deref(), Some("Music"));
        }
        EventEntries::Grouped(_) => unreachable!(),
    }
    assert_eq!(response.categories.len(), 1);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_mongo_grouping_and_popular() {
    let builder = TestDataBuilder::from_test_name("mongo_group");
    let events = [
        Event::new(builder.user_id(), "A", at(2099, 5, 1, 9)).with_id(builder.object_id(1)),
        Event::new(builder.user_id(), "B", at(2099, 5, 1, 21)).with_id(builder.object_id(2)),
        Event::new(builder.user_id(), "C", at(2099, 5, 2, 12)).with_id(builder.object_id(3)),
        Event::new(builder.user_id(), "Past", at(2001, 1, 1, 0)).with_id(builder.object_id(4)),
    ];
    let (_mongo, store) = seeded(&events, &[]).await;
    let service = EventService::new(store);

    let response = service
        .list_with_params(&ListingParams::default(), Utc::now())
        .await
        .unwrap();

    assert!(response.grouped);
    assert_eq!(response.total_results, 2);
    match &response.events {
        EventEntries::Grouped(groups) => {
            assert_eq!(groups[0].day, "2099-05-02");
            assert_eq!(groups[1].day, "2099-05-01");
            assert_eq!(groups[1].data.len(), 2);
        }
        EventEntries::Flat(_) => panic!("expected buckets"),
    }

    assert_eq!(response.popular.len(), 3);
    assert!(response.popular.iter().all(|e| e.name != "Past"));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_mongo_collation_orders_names_case_insensitively() {
    let builder = TestDataBuilder::from_test_name("mongo_collation");
    let events = [
        Event::new(builder.user_id(), "banana", at(2099, 1, 1, 0)).with_id(builder.object_id(1)),
        Event::new(builder.user_id(), "Apple", at(2099, 1, 2, 0)).with_id(builder.object_id(2)),
        Event::new(builder.user_id(), "cherry", at(2099, 1, 3, 0)).with_id(builder.object_id(3)),
    ];
    let (_mongo, store) = seeded(&events, &[]).await;
    let service = EventService::new(store);

    let params = ListingParams {
        group: false,
        sort_by: SortField::Name,
        sort_order: SortDirection::Asc,
        ..ListingParams::default()
    };
    let response = service.list_with_params(&params, Utc::now()).await.unwrap();

    assert_eq!(flat_names(&response), ["Apple", "banana", "cherry"]);
}
