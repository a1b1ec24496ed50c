use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Reserved `QueryError::code` for a store-side deadline abort.
pub const CODE_TIMEOUT: &str = "TIMEOUT";
/// Reserved `QueryError::code` for arguments that cannot be shaped into a store call.
pub const CODE_BAD_VALUE: &str = "BAD_VALUE";
/// Reserved `QueryError::code` for out-of-range execution options.
pub const CODE_INVALID_OPTIONS: &str = "INVALID_OPTIONS";

/// Store code and code name used for deadline aborts.
pub const STORE_TIMEOUT_CODE: i32 = 50;
pub const STORE_TIMEOUT_NAME: &str = "MaxTimeMSExpired";

/// Malformed query text. Never reaches the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), position: None }
    }

    pub fn at(message: impl Into<String>, position: usize) -> Self {
        Self { message: message.into(), position: Some(position) }
    }
}

/// Failure reported by a `DocumentStore` implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
    pub code: Option<i32>,
    pub code_name: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: None, code_name: None, source: None }
    }

    pub fn with_code(message: impl Into<String>, code: i32, code_name: &str) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
            code_name: Some(code_name.to_string()),
            source: None,
        }
    }

    /// Deadline exceeded on the store side.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::with_code(message, STORE_TIMEOUT_CODE, STORE_TIMEOUT_NAME)
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.code == Some(STORE_TIMEOUT_CODE) || self.code_name.as_deref() == Some(STORE_TIMEOUT_NAME)
    }
}

/// Store-level failure after a successful parse.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Original store failure, kept for connection-health inspection upstream.
    #[serde(skip)]
    pub cause: Option<Arc<StoreError>>,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: None, cause: None }
    }

    pub fn with_code(message: impl Into<String>, code: &str) -> Self {
        Self { message: message.into(), code: Some(code.to_string()), cause: None }
    }

    pub fn bad_value(message: impl Into<String>) -> Self {
        Self::with_code(message, CODE_BAD_VALUE)
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.code.as_deref() == Some(CODE_TIMEOUT)
    }
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        if err.is_timeout() {
            return Self {
                message: format!("Query exceeded the time limit: {}", err.message),
                code: Some(CODE_TIMEOUT.to_string()),
                cause: Some(Arc::new(err)),
            };
        }
        let code = err.code_name.clone().or_else(|| err.code.map(|c| c.to_string()));
        Self { message: err.message.clone(), code, cause: Some(Arc::new(err)) }
    }
}

/// Outcome of a cancellable execution.
#[derive(Debug, Clone, Error)]
pub enum ExecuteError {
    #[error("query cancelled")]
    Cancelled,

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ExecuteError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<StoreError> for ExecuteError {
    fn from(err: StoreError) -> Self {
        Self::Query(QueryError::from(err))
    }
}
