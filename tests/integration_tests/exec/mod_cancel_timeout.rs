use bson::doc;
use docshell::errors::{CODE_TIMEOUT, ExecuteError, STORE_TIMEOUT_CODE};
use docshell::store::MemoryStore;
use docshell::{CancellationToken, QueryOptions, execute, execute_with_cancel, parse};
use std::time::{Duration, Instant};

fn slow_store(latency: Duration) -> MemoryStore {
    let store = MemoryStore::new("slow").with_latency(latency);
    store.seed("c", vec![doc! {"_id": 1}, doc! {"_id": 2}]).unwrap();
    store
}

#[tokio::test]
async fn store_deadline_becomes_timeout_code() {
    let store = slow_store(Duration::from_millis(500));
    let opts = QueryOptions { timeout_ms: 20, ..QueryOptions::default() };
    let err = execute(&store, &parse("db.c.find({})").unwrap(), &opts).await.unwrap_err();
    assert_eq!(err.code.as_deref(), Some(CODE_TIMEOUT));
    assert!(err.is_timeout());
    let cause = err.cause.as_ref().unwrap();
    assert_eq!(cause.code, Some(STORE_TIMEOUT_CODE));
}

#[tokio::test]
async fn within_deadline_succeeds_and_is_timed() {
    let store = slow_store(Duration::from_millis(15));
    let r = execute(&store, &parse("db.c.find({})").unwrap(), &QueryOptions::default()).await.unwrap();
    assert_eq!(r.documents.len(), 2);
    // find + count, each paying the latency
    assert!(r.execution_time_ms >= 30, "took {} ms", r.execution_time_ms);
}

#[tokio::test]
async fn cancellation_aborts_in_flight_call() {
    let store = slow_store(Duration::from_secs(10));
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });
    let started = Instant::now();
    let parsed = parse("db.c.aggregate([{$match: {}}])").unwrap();
    let err = execute_with_cancel(&store, &parsed, &QueryOptions::default(), &token).await.unwrap_err();
    assert!(matches!(err, ExecuteError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancelled_is_not_a_query_error() {
    let store = slow_store(Duration::ZERO);
    let token = CancellationToken::new();
    token.cancel();
    let err = execute_with_cancel(&store, &parse("db.c.insertOne({_id: 3})").unwrap(), &QueryOptions::default(), &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(store.collection_len("c"), 2);
}

#[tokio::test]
async fn uncancelled_token_runs_normally() {
    let store = slow_store(Duration::ZERO);
    let token = CancellationToken::new();
    let r = execute_with_cancel(&store, &parse("db.c.count()").unwrap(), &QueryOptions::default(), &token).await.unwrap();
    assert_eq!(r.documents, vec![serde_json::json!({"count": 2})]);
}
