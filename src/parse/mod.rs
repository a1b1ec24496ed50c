//! Shell query text to `ParsedQuery`.

pub mod collection;
pub mod command;
pub mod normalize;
pub mod scanner;
pub mod signatures;

pub use normalize::{normalize, to_strict_json};
pub use scanner::{match_bracket, rewrite_regex_literals, split_top_level_args};
pub use signatures::{COMMAND_SIGNATURES, OPERATION_CONTRACTS, command_signature, operation_contract};

use crate::errors::ParseError;
use crate::types::ParsedQuery;

use scanner::{ident_end, skip_ws};

const DB_PREFIX: &str = "db.";

/// Parse one shell query.
///
/// Surrounding whitespace and a single trailing `;` are ignored. Positions in the returned
/// error are byte offsets into that trimmed text.
///
/// # Errors
/// Returns a `ParseError` for any malformed or unsupported input.
pub fn parse(text: &str) -> Result<ParsedQuery, ParseError> {
    let query = text.trim();
    let query = query.strip_suffix(';').unwrap_or(query).trim_end();
    let res = parse_trimmed(query);
    if let Err(e) = &res {
        log::debug!("parse failed: {e} (position {:?}) in {query:?}", e.position);
    }
    res
}

fn parse_trimmed(query: &str) -> Result<ParsedQuery, ParseError> {
    if query.is_empty() {
        return Err(ParseError::new("Query is empty"));
    }
    if !query.starts_with(DB_PREFIX) {
        return Err(ParseError::at(
            "Query must start with db. (e.g. db.users.find({}) or db.stats())",
            0,
        ));
    }
    if is_database_command(query) {
        return command::parse_command(query).map(ParsedQuery::Command);
    }
    collection::parse_collection_query(query).map(ParsedQuery::Collection)
}

/// `db.<ident>(` with no second dot is a database command, except `getCollection`.
fn is_database_command(query: &str) -> bool {
    let bytes = query.as_bytes();
    let start = DB_PREFIX.len();
    let end = ident_end(bytes, start);
    end > start
        && &query[start..end] != "getCollection"
        && bytes.get(skip_ws(bytes, end)) == Some(&b'(')
}
