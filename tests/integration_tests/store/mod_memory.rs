use bson::{Bson, doc};
use docshell::store::{
    AggregateOptions, DocumentStore, FindOptions, IndexOptions, IndexRef, MemoryStore, UpdateOptions, UpdateSpec,
};
use std::time::Duration;

const T: Duration = Duration::from_secs(5);

fn inventory() -> MemoryStore {
    let store = MemoryStore::new("inv");
    store
        .seed(
            "stock",
            vec![
                doc! {"_id": 1, "item": "pen", "qty": 40, "size": {"h": 14, "uom": "cm"}, "tags": ["blue", "office"]},
                doc! {"_id": 2, "item": "pad", "qty": 5, "size": {"h": 28, "uom": "cm"}, "tags": ["office"]},
                doc! {"_id": 3, "item": "mug", "qty": 0, "tags": ["kitchen", "blue"]},
                doc! {"_id": 4, "item": "cap", "qty": 12.5},
            ],
        )
        .unwrap();
    store
}

async fn ids(store: &MemoryStore, filter: bson::Document) -> Vec<i32> {
    let opts = FindOptions { sort: Some(doc! {"_id": 1}), max_time: T, ..FindOptions::default() };
    store
        .find("stock", &filter, &opts)
        .await
        .unwrap()
        .iter()
        .map(|d| d.get_i32("_id").unwrap())
        .collect()
}

#[tokio::test]
async fn filter_operators() {
    let s = inventory();
    assert_eq!(ids(&s, doc! {"qty": {"$gt": 10}}).await, vec![1, 4]);
    assert_eq!(ids(&s, doc! {"size.uom": "cm", "size.h": {"$lt": 20}}).await, vec![1]);
    assert_eq!(ids(&s, doc! {"tags": "blue"}).await, vec![1, 3]);
    assert_eq!(ids(&s, doc! {"tags": {"$in": ["kitchen", "nope"]}}).await, vec![3]);
    assert_eq!(ids(&s, doc! {"tags": {"$nin": ["office"]}}).await, vec![3, 4]);
    assert_eq!(ids(&s, doc! {"size": {"$exists": false}}).await, vec![3, 4]);
    assert_eq!(ids(&s, doc! {"$or": [{"qty": 0}, {"item": "pad"}]}).await, vec![2, 3]);
    assert_eq!(ids(&s, doc! {"$nor": [{"qty": {"$gte": 5}}]}).await, vec![3]);
    assert_eq!(ids(&s, doc! {"qty": {"$not": {"$gt": 5}}}).await, vec![2, 3]);
    assert_eq!(ids(&s, doc! {"tags.1": "blue"}).await, vec![3]);
    assert_eq!(ids(&s, doc! {"tags.0": "blue"}).await, vec![1]);
}

#[tokio::test]
async fn regex_members_in_set_operators() {
    let s = inventory();
    let office = Bson::RegularExpression(bson::Regex { pattern: "^OFF".try_into().unwrap(), options: "i".try_into().unwrap() });
    assert_eq!(ids(&s, doc! {"tags": {"$in": [office.clone(), "kitchen"]}}).await, vec![1, 2, 3]);
    assert_eq!(ids(&s, doc! {"tags": {"$nin": [office]}}).await, vec![3, 4]);
}

#[tokio::test]
async fn positional_update_keeps_arrays() {
    let s = inventory();
    let spec = UpdateSpec::Operators(doc! {"$set": {"tags.0": "red"}});
    s.update("stock", &doc! {"_id": 1}, &spec, UpdateOptions::default()).await.unwrap();
    let bad = UpdateSpec::Operators(doc! {"$set": {"qty": 1, "item.name": "x"}});
    assert!(s.update("stock", &doc! {"_id": 2}, &bad, UpdateOptions::default()).await.is_err());
    let opts = FindOptions { sort: Some(doc! {"_id": 1}), max_time: T, ..FindOptions::default() };
    let docs = s.find("stock", &doc! {"_id": {"$in": [1, 2]}}, &opts).await.unwrap();
    assert_eq!(docs[0].get_array("tags").unwrap(), &vec![Bson::from("red"), Bson::from("office")]);
    assert_eq!(docs[1].get_i32("qty").unwrap(), 5);
}

#[tokio::test]
async fn malformed_filters_fail() {
    let s = inventory();
    let opts = FindOptions { max_time: T, ..FindOptions::default() };
    assert!(s.find("stock", &doc! {"$or": []}, &opts).await.is_err());
    assert!(s.find("stock", &doc! {"$where": "1"}, &opts).await.is_err());
}

#[tokio::test]
async fn unwind_and_group() {
    let s = inventory();
    let pipeline = [
        doc! {"$unwind": "$tags"},
        doc! {"$group": {"_id": "$tags", "total": {"$sum": "$qty"}, "items": {"$push": "$item"}}},
        doc! {"$sort": {"_id": 1}},
    ];
    let out = s.aggregate("stock", &pipeline, &AggregateOptions { max_time: T, ..AggregateOptions::default() }).await.unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], doc! {"_id": "blue", "total": 40, "items": ["pen", "mug"]});
    assert_eq!(out[2], doc! {"_id": "office", "total": 45, "items": ["pen", "pad"]});
}

#[tokio::test]
async fn inc_keeps_integer_width() {
    let s = inventory();
    let spec = UpdateSpec::Operators(doc! {"$inc": {"qty": 2}});
    s.update("stock", &doc! {"_id": 1}, &spec, UpdateOptions::default()).await.unwrap();
    s.update("stock", &doc! {"_id": 4}, &spec, UpdateOptions::default()).await.unwrap();
    let opts = FindOptions { max_time: T, ..FindOptions::default() };
    let docs = s.find("stock", &doc! {"_id": {"$in": [1, 4]}}, &opts).await.unwrap();
    assert_eq!(docs[0].get("qty"), Some(&Bson::Int32(42)));
    assert_eq!(docs[1].get("qty"), Some(&Bson::Double(14.5)));
}

#[tokio::test]
async fn id_index_cannot_be_dropped() {
    let s = inventory();
    let err = s.drop_index("stock", &IndexRef::Name("_id_".into())).await.unwrap_err();
    assert_eq!(err.code_name.as_deref(), Some("InvalidOptions"));
    let named = IndexOptions { name: Some("by_item".into()), ..IndexOptions::default() };
    assert_eq!(s.create_index("stock", &doc! {"item": 1}, &named).await.unwrap(), "by_item");
    // Same keys under another name conflict.
    assert!(s.create_index("stock", &doc! {"item": 1}, &IndexOptions::default()).await.is_err());
}

#[tokio::test]
async fn unique_index_rejects_existing_duplicates() {
    let s = inventory();
    s.insert_one("stock", doc! {"item": "pen"}).await.unwrap();
    let unique = IndexOptions { unique: true, ..IndexOptions::default() };
    let err = s.create_index("stock", &doc! {"item": 1}, &unique).await.unwrap_err();
    assert_eq!(err.code, Some(11000));
}

#[tokio::test]
async fn missing_collection_reads_are_empty() {
    let s = MemoryStore::default();
    assert_eq!(s.count("ghost", &doc! {}, T).await.unwrap(), 0);
    assert!(s.list_indexes("ghost").await.is_err());
}

#[tokio::test]
async fn latency_setter_applies_to_later_calls() {
    let s = inventory();
    s.set_latency(Duration::from_millis(100));
    let err = s.count("stock", &doc! {}, Duration::from_millis(5)).await.unwrap_err();
    assert!(err.is_timeout());
    s.set_latency(Duration::ZERO);
    assert_eq!(s.count("stock", &doc! {}, Duration::from_millis(5)).await.unwrap(), 4);
}
