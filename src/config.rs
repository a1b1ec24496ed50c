//! Execution options and shell configuration.
//!
//! Precedence for the shell: explicit CLI flag > environment > config file > defaults.
//! Config files are searched in order: `--config`, `DOCSHELL_CONFIG`,
//! `~/.config/docshell.toml`, `./docshell.toml`; earlier files win field by field.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::errors::{CODE_INVALID_OPTIONS, QueryError};

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const ALLOWED_PAGE_SIZES: [u64; 6] = [10, 25, 50, 100, 250, 500];

/// Per-execution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryOptions {
    /// 1-based page number.
    pub page: u64,
    pub page_size: u64,
    /// Passed to the store as its max execution time.
    pub timeout_ms: u64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { page: 1, page_size: DEFAULT_PAGE_SIZE, timeout_ms: DEFAULT_TIMEOUT_MS }
    }
}

impl QueryOptions {
    /// # Errors
    /// `INVALID_OPTIONS` for page 0, a page size outside [`ALLOWED_PAGE_SIZES`], or a zero timeout.
    pub fn validate(&self) -> Result<(), QueryError> {
        let invalid = |msg: String| Err(QueryError::with_code(msg, CODE_INVALID_OPTIONS));
        if self.page == 0 {
            return invalid("page must be at least 1".to_string());
        }
        if !ALLOWED_PAGE_SIZES.contains(&self.page_size) {
            return invalid(format!("pageSize must be one of {ALLOWED_PAGE_SIZES:?}, got {}", self.page_size));
        }
        if self.timeout_ms == 0 {
            return invalid("timeoutMs must be positive".to_string());
        }
        Ok(())
    }

    /// Offset of the first document of the current page.
    #[must_use]
    pub const fn page_skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Options(#[from] QueryError),
}

/// Shell settings. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub page_size: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub slow_query_ms: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl ShellConfig {
    /// Resolve the effective configuration. `cli` carries the explicitly passed flags.
    ///
    /// # Errors
    /// An explicit `--config` path that is missing or malformed is an error; other
    /// candidates that fail to parse are skipped with a warning.
    pub fn resolve(cli: Self, config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = cli;
        cfg.fill_from_env(|k| std::env::var(k).ok());
        if let Some(p) = config_path {
            cfg.fill_missing(Self::from_file(p)?);
        }
        for p in search_paths() {
            if !p.exists() {
                continue;
            }
            match Self::from_file(&p) {
                Ok(file) => cfg.fill_missing(file),
                Err(e) => log::warn!("skipping {e}"),
            }
        }
        Ok(cfg)
    }

    /// # Errors
    /// I/O or TOML failure, tagged with the path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Fill unset fields from `DOCSHELL_*` variables via `lookup`.
    pub fn fill_from_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let num = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        self.page_size = self.page_size.or_else(|| num("DOCSHELL_PAGE_SIZE"));
        self.timeout_ms = self.timeout_ms.or_else(|| num("DOCSHELL_TIMEOUT_MS"));
        self.slow_query_ms = self.slow_query_ms.or_else(|| num("DOCSHELL_SLOW_QUERY_MS"));
        if self.log_dir.is_none() {
            self.log_dir = lookup("DOCSHELL_LOG_DIR").map(PathBuf::from);
        }
        if self.log_level.is_none() {
            self.log_level = lookup("DOCSHELL_LOG_LEVEL");
        }
    }

    /// Take fields from a lower-precedence layer where this one has none.
    pub fn fill_missing(&mut self, lower: Self) {
        self.page_size = self.page_size.or(lower.page_size);
        self.timeout_ms = self.timeout_ms.or(lower.timeout_ms);
        self.slow_query_ms = self.slow_query_ms.or(lower.slow_query_ms);
        self.log_dir = self.log_dir.take().or(lower.log_dir);
        self.log_level = self.log_level.take().or(lower.log_level);
    }

    /// Validated options for `page`.
    ///
    /// # Errors
    /// `INVALID_OPTIONS` when the configured values are out of range.
    pub fn query_options(&self, page: u64) -> Result<QueryOptions, QueryError> {
        let options = QueryOptions {
            page,
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        };
        options.validate()?;
        Ok(options)
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = std::env::var_os("DOCSHELL_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        paths.push(PathBuf::from(home).join(".config").join("docshell.toml"));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("docshell.toml"));
    }
    paths
}
