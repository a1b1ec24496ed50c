//! Developer trace lines ("level 6") with an optional per-thread capture buffer.
//!
//! Every executed query emits one JSON `bench` line through [`dev6!`](crate::dev6). Tests
//! enable the buffer on their own thread and assert on the captured lines without touching
//! the global logger.

use serde::Serialize;
use std::cell::RefCell;

/// Target the trace lines are logged under.
pub const DEV6_TARGET: &str = "docshell::dev6";

thread_local! {
    static CAPTURE: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Stops capturing on the current thread when dropped.
pub struct CaptureGuard;

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURE.with(|c| *c.borrow_mut() = None);
    }
}

/// Start capturing `dev6!` lines emitted on this thread.
#[must_use]
pub fn capture() -> CaptureGuard {
    CAPTURE.with(|c| *c.borrow_mut() = Some(Vec::new()));
    CaptureGuard
}

#[doc(hidden)]
pub fn record(line: &str) {
    CAPTURE.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(line.to_owned());
        }
    });
}

/// Take everything captured so far. Empty when capture is off.
pub fn drain() -> Vec<String> {
    CAPTURE.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

/// One `bench` line per executed query.
#[derive(Debug, Serialize)]
pub struct QueryBench<'a> {
    pub bench: &'static str,
    pub op: &'a str,
    pub collection: &'a str,
    pub duration_ms: u64,
    pub result_count: usize,
    pub ok: bool,
}

impl<'a> QueryBench<'a> {
    #[must_use]
    pub const fn new(op: &'a str, collection: &'a str, duration_ms: u64, result_count: usize, ok: bool) -> Self {
        Self { bench: "query", op, collection, duration_ms, result_count, ok }
    }

    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(line) => crate::dev6!("{line}"),
            Err(e) => log::debug!("bench line not serializable: {e}"),
        }
    }
}

/// Emit a developer trace line: captured on this thread if enabled, and logged at TRACE.
#[macro_export]
macro_rules! dev6 {
    ($($arg:tt)*) => {{
        let __line = format!($($arg)*);
        $crate::utils::devlog::record(&__line);
        log::log!(target: $crate::utils::devlog::DEV6_TARGET, log::Level::Trace, "{}", __line);
    }};
}
