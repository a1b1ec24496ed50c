//! MongoDB shell style queries: parse the text into a typed descriptor, then execute it
//! against a [`store::DocumentStore`] with pagination, timing and error classification.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use docshell::{QueryOptions, execute, parse};
//! use docshell::store::MemoryStore;
//!
//! let store = MemoryStore::new("app");
//! let parsed = parse("db.users.find({age: {$gt: 21}}).sort({created: -1}).limit(10)")?;
//! let page = execute(&store, &parsed, &QueryOptions::default()).await?;
//! println!("{} of {}", page.documents.len(), page.total_count);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logger;
pub mod parse;
pub mod store;
pub mod types;
pub mod utils;

pub use config::QueryOptions;
pub use errors::{ExecuteError, ParseError, QueryError, StoreError};
pub use exec::{CancellationToken, execute, execute_with_cancel};
pub use parse::parse;
pub use types::{CollectionQuery, DbCommand, Operation, OperationKind, ParsedQuery, QueryResult, Value};
