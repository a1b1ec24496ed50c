use bson::doc;
use docshell::exec::telemetry::{self, metrics_text, snapshot};
use docshell::store::MemoryStore;
use docshell::utils::devlog;
use docshell::{QueryOptions, execute, parse};
use std::time::Duration;

#[tokio::test]
async fn each_execution_emits_one_bench_line() {
    let store = MemoryStore::new("t");
    store.seed("users", vec![doc! {"_id": 1}, doc! {"_id": 2}, doc! {"_id": 3}]).unwrap();
    let _g = devlog::capture();
    execute(&store, &parse("db.users.find({_id: {$gt: 1}})").unwrap(), &QueryOptions::default()).await.unwrap();
    let lines = devlog::drain();
    assert_eq!(lines.len(), 1);
    let v: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(v["bench"], "query");
    assert_eq!(v["op"], "find");
    assert_eq!(v["collection"], "users");
    assert_eq!(v["result_count"], 2);
    assert_eq!(v["ok"], true);
}

#[tokio::test]
async fn failures_are_benched_as_not_ok() {
    let store = MemoryStore::new("t");
    let _g = devlog::capture();
    let _ = execute(&store, &parse("db.stats()").unwrap(), &QueryOptions { page: 0, ..QueryOptions::default() }).await;
    // Option validation happens before dispatch, so nothing is benched.
    assert!(devlog::drain().is_empty());
    let _ = execute(&store, &parse("db.c.dropIndex('nope')").unwrap(), &QueryOptions::default()).await;
    let lines = devlog::drain();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"ok\":false"));
}

#[tokio::test]
async fn timeouts_and_queries_are_counted() {
    let store = MemoryStore::new("t").with_latency(Duration::from_millis(200));
    let before = snapshot();
    let opts = QueryOptions { timeout_ms: 10, ..QueryOptions::default() };
    let _ = execute(&store, &parse("db.c.count()").unwrap(), &opts).await;
    let after = snapshot();
    assert!(after.queries_total > before.queries_total);
    assert!(after.timeouts_total > before.timeouts_total);
    assert!(metrics_text().contains("docshell_timeouts_total"));
}

#[tokio::test]
async fn slow_queries_are_counted() {
    let store = MemoryStore::new("t").with_latency(Duration::from_millis(5));
    let before = snapshot().queries_slow_total;
    let threshold = telemetry::slow_query_ms();
    telemetry::set_slow_query_ms(1);
    let r = execute(&store, &parse("db.getName()").unwrap(), &QueryOptions::default()).await;
    telemetry::set_slow_query_ms(threshold);
    assert!(r.is_ok());
    assert!(snapshot().queries_slow_total > before);
}
