use std::io::{BufRead, Write};

use super::command::Command;
use super::util::render_parse_error;
use crate::config::{QueryOptions, ShellConfig};
use crate::errors::{ExecuteError, ParseError};
use crate::exec::telemetry::metrics_text;
use crate::exec::{CancellationToken, execute_with_cancel};
use crate::parse::parse;
use crate::store::DocumentStore;
use crate::types::{ParsedQuery, QueryResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Plain,
    Json,
}

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Run one command, writing to `out`. Parse and query failures are rendered to `out`
/// before being returned.
///
/// # Errors
/// The rendered parse/query failure, invalid options, or an I/O error on `out`.
pub async fn run_with_format(
    store: &dyn DocumentStore,
    cmd: Command,
    mode: OutputMode,
    cfg: &ShellConfig,
    out: &mut dyn Write,
) -> CliResult {
    match cmd {
        Command::Parse { query } => match parse(&query) {
            Ok(parsed) => {
                let json = serde_json::to_string_pretty(&parsed)?;
                match mode {
                    OutputMode::Plain => writeln!(out, "{}", serde_json::to_string(&parsed)?)?,
                    OutputMode::Json | OutputMode::Human => writeln!(out, "{json}")?,
                }
                Ok(())
            }
            Err(e) => {
                write_parse_error(out, mode, &query, &e)?;
                Err(e.into())
            }
        },
        Command::Run { query, page } => {
            let parsed = match parse(&query) {
                Ok(p) => p,
                Err(e) => {
                    write_parse_error(out, mode, &query, &e)?;
                    return Err(e.into());
                }
            };
            let options = cfg.query_options(page)?;
            match execute_interruptible(store, &parsed, &options).await {
                Ok(result) => write_result(out, mode, &result, &options),
                Err(e) => {
                    write_exec_error(out, mode, &e)?;
                    Err(e.into())
                }
            }
        }
        Command::Metrics => {
            write!(out, "{}", metrics_text())?;
            Ok(())
        }
    }
}

/// Read-eval loop over `input`. `exit`/`quit` (or end of input) leaves; `it` fetches the
/// next page of the last paginated query; `metrics` prints the query counters. Failures are
/// rendered and the loop continues.
///
/// # Errors
/// Only I/O errors on `input`/`out` or invalid configured options end the loop early.
pub async fn run_shell(
    store: &dyn DocumentStore,
    cfg: &ShellConfig,
    mode: OutputMode,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> CliResult {
    let mut cursor: Option<(ParsedQuery, u64)> = None;
    let mut line = String::new();
    loop {
        if mode == OutputMode::Human {
            write!(out, "docshell> ")?;
            out.flush()?;
        }
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let (parsed, page) = match line.trim() {
            "" => continue,
            "exit" | "quit" => break,
            "metrics" => {
                write!(out, "{}", metrics_text())?;
                continue;
            }
            "it" => match cursor.take() {
                Some((parsed, page)) => (parsed, page + 1),
                None => {
                    writeln!(out, "no cursor")?;
                    continue;
                }
            },
            text => match parse(text) {
                Ok(parsed) => (parsed, 1),
                Err(e) => {
                    write_parse_error(out, mode, text, &e)?;
                    continue;
                }
            },
        };
        let options = cfg.query_options(page)?;
        match execute_interruptible(store, &parsed, &options).await {
            Ok(result) => {
                write_result(out, mode, &result, &options)?;
                if result.has_more {
                    cursor = Some((parsed, page));
                }
            }
            Err(e) => write_exec_error(out, mode, &e)?,
        }
    }
    Ok(())
}

/// Execute with Ctrl-C wired to cancellation.
async fn execute_interruptible(
    store: &dyn DocumentStore,
    parsed: &ParsedQuery,
    options: &QueryOptions,
) -> Result<QueryResult, ExecuteError> {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    let res = execute_with_cancel(store, parsed, options, &token).await;
    watcher.abort();
    res
}

fn write_result(out: &mut dyn Write, mode: OutputMode, r: &QueryResult, options: &QueryOptions) -> CliResult {
    match mode {
        OutputMode::Json => writeln!(out, "{}", serde_json::to_string_pretty(r)?)?,
        OutputMode::Plain => {
            for d in &r.documents {
                writeln!(out, "{}", serde_json::to_string(d)?)?;
            }
        }
        OutputMode::Human => {
            for d in &r.documents {
                writeln!(out, "{}", serde_json::to_string_pretty(d)?)?;
            }
            let first = if r.documents.is_empty() { 0 } else { options.page_skip() + 1 };
            let last = options.page_skip() + r.documents.len() as u64;
            let mut footer = if r.has_more || options.page > 1 {
                format!("-- {first}-{last} of {} ({} ms)", r.total_count, r.execution_time_ms)
            } else {
                format!("-- {} document(s) ({} ms)", r.documents.len(), r.execution_time_ms)
            };
            if r.count_unavailable {
                footer.push_str(", total is approximate");
            }
            if r.has_more {
                footer.push_str(". Type \"it\" for more");
            }
            writeln!(out, "{footer}")?;
        }
    }
    Ok(())
}

fn write_parse_error(out: &mut dyn Write, mode: OutputMode, query: &str, e: &ParseError) -> CliResult {
    match mode {
        OutputMode::Json => writeln!(out, "{}", serde_json::json!({"error": e}))?,
        OutputMode::Plain => writeln!(out, "parse error: {e}")?,
        OutputMode::Human => writeln!(out, "{}", render_parse_error(query, e))?,
    }
    Ok(())
}

fn write_exec_error(out: &mut dyn Write, mode: OutputMode, e: &ExecuteError) -> CliResult {
    match (mode, e) {
        (OutputMode::Json, ExecuteError::Cancelled) => {
            writeln!(out, "{}", serde_json::json!({"error": {"message": e.to_string(), "cancelled": true}}))?;
        }
        (OutputMode::Json, ExecuteError::Query(q)) => writeln!(out, "{}", serde_json::json!({"error": q}))?,
        (_, ExecuteError::Cancelled) => writeln!(out, "cancelled")?,
        (_, ExecuteError::Query(q)) => match &q.code {
            Some(code) => writeln!(out, "error[{code}]: {}", q.message)?,
            None => writeln!(out, "error: {}", q.message)?,
        },
    }
    Ok(())
}
