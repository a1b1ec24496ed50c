use bson::doc;
use docshell::config::QueryOptions;
use docshell::store::MemoryStore;
use docshell::{execute, parse};
use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 32,
        .. proptest::test_runner::Config::default()
    })]

    #[test]
    fn prop_pages_partition_the_result(n in 0u64..120, page_size in prop::sample::select(vec![10u64, 25, 50]), page in 1u64..7) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let store = MemoryStore::new("prop");
        let docs = (0..n).map(|i| doc! {"_id": (i as i64)}).collect();
        store.seed("rows", docs).unwrap();
        let parsed = parse("db.rows.find({}).sort({_id: 1})").unwrap();
        let options = QueryOptions { page, page_size, ..QueryOptions::default() };
        let r = rt.block_on(execute(&store, &parsed, &options)).unwrap();

        let skip = (page - 1) * page_size;
        let expected_len = n.saturating_sub(skip).min(page_size);
        prop_assert_eq!(r.documents.len() as u64, expected_len);
        prop_assert_eq!(r.total_count, n);
        prop_assert_eq!(r.has_more, page * page_size < n);
        if let Some(first) = r.documents.first() {
            prop_assert_eq!(first["_id"].as_i64(), Some(skip as i64));
        }
    }

    #[test]
    fn prop_chained_limit_caps_the_page(n in 0u64..80, limit in 1i64..60) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let store = MemoryStore::new("prop");
        store.seed("rows", (0..n).map(|i| doc! {"i": (i as i64)}).collect()).unwrap();
        let parsed = parse(&format!("db.rows.find({{}}).limit({limit})")).unwrap();
        let options = QueryOptions { page_size: 25, ..QueryOptions::default() };
        let r = rt.block_on(execute(&store, &parsed, &options)).unwrap();
        prop_assert_eq!(r.documents.len() as u64, n.min(limit.unsigned_abs()).min(25));
    }
}
