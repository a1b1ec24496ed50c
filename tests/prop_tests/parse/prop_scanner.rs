use docshell::parse::{match_bracket, split_top_level_args};
use proptest::prelude::*;

/// Balanced bracket text with quoted noise that may contain bracket characters.
fn balanced() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        "[a-z0-9 :]{0,4}",
        "[a-z()\\[\\]{}]{0,4}".prop_map(|s| format!("'{s}'")),
        "[a-z()\\[\\]{}]{0,4}".prop_map(|s| format!("\"{s}\"")),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        (prop::sample::select(vec![('(', ')'), ('[', ']'), ('{', '}')]), prop::collection::vec(inner, 0..4))
            .prop_map(|((open, close), parts)| format!("{open}{}{close}", parts.concat()))
    })
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 64,
        .. proptest::test_runner::Config::default()
    })]

    #[test]
    fn prop_wrapped_text_closes_at_the_end(body in balanced(), tail in "[a-z.]{0,6}") {
        let text = format!("({body}){tail}");
        prop_assert_eq!(match_bracket(&text, 0), Some(body.len() + 1));
    }

    #[test]
    fn prop_dropping_the_closer_is_unmatched(body in balanced()) {
        let text = format!("({body}");
        prop_assert_eq!(match_bracket(&text, 0), None);
    }

    #[test]
    fn prop_wrong_closer_is_unmatched(body in balanced(), closer in prop::sample::select(vec![']', '}']), tail in "[)]{0,2}") {
        let text = format!("({body}{closer}{tail}");
        prop_assert_eq!(match_bracket(&text, 0), None);
    }

    #[test]
    fn prop_split_recovers_arguments(args in prop::collection::vec(balanced().prop_filter("non-empty", |s| !s.trim().is_empty()), 1..5)) {
        let joined = args.join(" , ");
        let expected: Vec<String> = args.iter().map(|a| a.trim().to_string()).collect();
        prop_assert_eq!(split_top_level_args(&joined), expected);
    }

    #[test]
    fn prop_scanner_never_panics(text in "\\PC{0,48}", pos in 0usize..64) {
        let _ = match_bracket(&text, pos);
        let _ = split_top_level_args(&text);
    }
}
