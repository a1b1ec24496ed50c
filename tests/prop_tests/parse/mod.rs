#[path = "prop_parse.rs"]
mod parse_props;
#[path = "prop_scanner.rs"]
mod scanner_props;
