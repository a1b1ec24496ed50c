use docshell::parse::{normalize, parse};
use docshell::{Operation, ParsedQuery};
use proptest::prelude::*;
use serde_json::json;

fn collection_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 64,
        .. proptest::test_runner::Config::default()
    })]

    #[test]
    fn prop_find_targets_named_collection(name in collection_name(), pad in "[ \t]{0,3}", semi in any::<bool>()) {
        let text = format!("{pad}db.{name}.find({{}}){}{pad}", if semi { ";" } else { "" });
        let ParsedQuery::Collection(q) = parse(&text).unwrap() else {
            panic!("expected a collection query for {text:?}");
        };
        prop_assert_eq!(q.collection, name);
        prop_assert_eq!(q.operation, Operation::Find { filter: json!({}), projection: None });
    }

    #[test]
    fn prop_chain_order_does_not_matter(sort_dir in prop::sample::select(vec![1, -1]), skip in 0i64..1000, limit in 0i64..1000, order in Just(vec!["sort", "skip", "limit"]).prop_shuffle()) {
        let call = |m: &str| match m {
            "sort" => format!(".sort({{a: {sort_dir}}})"),
            "skip" => format!(".skip({skip})"),
            _ => format!(".limit({limit})"),
        };
        let chained: String = order.iter().map(|m| call(m)).collect();
        let shuffled = parse(&format!("db.c.find({{}}){chained}")).unwrap();
        let canonical = parse(&format!("db.c.find({{}}).sort({{a: {sort_dir}}}).skip({skip}).limit({limit})")).unwrap();
        prop_assert_eq!(shuffled, canonical);
    }

    #[test]
    fn prop_regex_literal_becomes_operator(pattern in "[a-z^][a-z0-9^$.]{0,10}", flags in "[imsx]{0,3}") {
        let v = normalize(&format!("{{f: /{pattern}/{flags}}}")).unwrap();
        prop_assert_eq!(&v["f"]["$regex"], &json!(pattern));
        if flags.is_empty() {
            prop_assert!(v["f"].get("$options").is_none());
        } else {
            prop_assert_eq!(&v["f"]["$options"], &json!(flags));
        }
    }

    #[test]
    fn prop_unclosed_call_points_at_open_paren(name in collection_name(), n in 0u32..100) {
        let text = format!("db.{name}.find({{a: {n}}}");
        let err = parse(&text).unwrap_err();
        prop_assert!(err.message.contains("Unmatched parenthesis"));
        prop_assert_eq!(err.position, Some(3 + name.len() + ".find".len()));
    }

    #[test]
    fn prop_parse_never_panics(text in "\\PC{0,64}") {
        let _ = parse(&text);
    }

    #[test]
    fn prop_parse_never_panics_on_shell_like_input(tail in "[a-zA-Z0-9_.(){}\\[\\]:,'\" /$-]{0,48}") {
        let _ = parse(&format!("db.{tail}"));
    }
}
