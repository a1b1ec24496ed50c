use docshell::{Operation, OperationKind, ParsedQuery, parse};
use serde_json::json;

fn collection(text: &str) -> docshell::CollectionQuery {
    match parse(text).unwrap() {
        ParsedQuery::Collection(q) => q,
        ParsedQuery::Command(c) => panic!("expected a collection query, got command {}", c.command),
    }
}

#[test]
fn find_with_operator_filter() {
    let q = collection("db.users.find({ age: { $gt: 21 } })");
    assert_eq!(q.collection, "users");
    assert_eq!(q.kind(), OperationKind::Find);
    assert_eq!(q.operation, Operation::Find { filter: json!({"age": {"$gt": 21}}), projection: None });
}

#[test]
fn distinct_with_filter() {
    let q = collection("db.users.distinct('role', { active: true })");
    assert_eq!(q.operation, Operation::Distinct { field: "role".into(), filter: Some(json!({"active": true})) });
}

#[test]
fn full_chain_serializes_flat() {
    let parsed = parse("db.orders.find({status: 'open'}, {total: 1}).sort({created: -1}).skip(20).limit(10);").unwrap();
    let v = serde_json::to_value(&parsed).unwrap();
    assert_eq!(
        v,
        json!({
            "collection": "orders",
            "operation": "find",
            "filter": {"status": "open"},
            "projection": {"total": 1},
            "sort": {"created": -1},
            "limit": 10,
            "skip": 20
        })
    );
}

#[test]
fn ignored_chain_methods() {
    let q = collection("db.users.find({}).pretty().limit(3).toArray()");
    assert_eq!(q.limit, Some(3));
}

#[test]
fn find_one_and_update_with_options() {
    let q = collection("db.users.findOneAndUpdate({_id: 1}, {$inc: {visits: 1}}, {returnDocument: 'after', upsert: true})");
    assert_eq!(
        q.operation,
        Operation::FindOneAndUpdate {
            filter: json!({"_id": 1}),
            update: json!({"$inc": {"visits": 1}}),
            options: Some(json!({"returnDocument": "after", "upsert": true})),
        }
    );
}

#[test]
fn aggregate_pipeline_with_regex_and_options() {
    let q = collection("db.logs.aggregate([{$match: {msg: /err(or)?/i}}, {$group: {_id: '$level', n: {$sum: 1}}}], {allowDiskUse: true})");
    let Operation::Aggregate { pipeline, options } = q.operation else { panic!("not aggregate") };
    assert_eq!(pipeline.len(), 2);
    assert_eq!(pipeline[0], json!({"$match": {"msg": {"$regex": "err(or)?", "$options": "i"}}}));
    assert_eq!(options, Some(json!({"allowDiskUse": true})));
}

#[test]
fn get_collection_form() {
    let q = collection("db.getCollection('audit-2024').find({})");
    assert_eq!(q.collection, "audit-2024");
}

#[test]
fn missing_prefix_is_rejected_at_zero() {
    let err = parse("users.find({})").unwrap_err();
    assert!(err.message.contains("must start with db."));
    assert_eq!(err.position, Some(0));
}

#[test]
fn unmatched_call_paren() {
    let err = parse("db.users.find({a: 1}").unwrap_err();
    assert!(err.message.contains("Unmatched parenthesis"));
    assert_eq!(err.position, Some(13));
}

#[test]
fn malformed_call_text_is_rejected() {
    let err = parse("db.users.find(})").unwrap_err();
    assert!(err.message.contains("Unmatched parenthesis"));
    let err = parse("db.users.find({}) garbage .limit(3)").unwrap_err();
    assert!(err.message.contains("Unexpected text after call"));
    assert_eq!(err.position, Some(18));
    let err = parse("db.stats() extra").unwrap_err();
    assert_eq!(err.position, Some(11));
    assert_eq!(collection("db.users.find({}).pretty()").limit, None);
}

#[test]
fn unknown_operation_lists_supported_set() {
    let err = parse("db.users.mapReduce(f, g)").unwrap_err();
    assert!(err.message.contains("Unsupported operation"));
    for name in ["find", "aggregate", "bulkWrite", "getIndexes"] {
        assert!(err.message.contains(name), "{name} missing from {}", err.message);
    }
}

#[test]
fn required_arguments() {
    assert_eq!(parse("db.c.insertOne()").unwrap_err().message, "insertOne requires a document argument");
    assert!(parse("db.c.updateOne({a: 1})").unwrap_err().message.starts_with("updateOne requires"));
    assert!(parse("db.c.dropIndex()").is_err());
}

#[test]
fn empty_and_semicolon_only_input() {
    assert_eq!(parse("   ").unwrap_err().message, "Query is empty");
    assert_eq!(parse(";").unwrap_err().message, "Query is empty");
}
