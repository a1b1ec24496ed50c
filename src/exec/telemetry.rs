use parking_lot::RwLock;
use serde::Serialize;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Log target for slow-query lines.
pub const METRICS_TARGET: &str = "docshell::metrics";
pub const DEFAULT_SLOW_QUERY_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub slow_query_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let slow = std::env::var("DOCSHELL_SLOW_QUERY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SLOW_QUERY_MS);
        Self { slow_query_ms: slow }
    }
}

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub queries_slow_total: AtomicU64,
    pub timeouts_total: AtomicU64,
    pub cancelled_total: AtomicU64,
    pub failures_total: AtomicU64,
}

#[derive(Default)]
pub struct Telemetry {
    pub cfg: RwLock<TelemetryConfig>,
    pub metrics: Metrics,
}

pub(crate) static TELEMETRY: LazyLock<Telemetry> = LazyLock::new(Telemetry::default);

pub fn set_slow_query_ms(ms: u64) {
    TELEMETRY.cfg.write().slow_query_ms = ms;
}

#[must_use]
pub fn slow_query_ms() -> u64 {
    TELEMETRY.cfg.read().slow_query_ms
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Failed,
    Timeout,
    Cancelled,
}

/// One executed query, as seen by telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRecord<'a> {
    pub collection: &'a str,
    pub op: &'a str,
    pub duration_ms: u64,
    pub result_count: usize,
    pub outcome: Outcome,
}

/// Count the query and, if it was slow, write a JSON line to the metrics target.
/// Returns whether the query counted as slow.
pub fn log_query(record: &QueryRecord<'_>) -> bool {
    let m = &TELEMETRY.metrics;
    m.queries_total.fetch_add(1, Ordering::Relaxed);
    match record.outcome {
        Outcome::Ok => {}
        Outcome::Failed => {
            m.failures_total.fetch_add(1, Ordering::Relaxed);
        }
        Outcome::Timeout => {
            m.timeouts_total.fetch_add(1, Ordering::Relaxed);
        }
        Outcome::Cancelled => {
            m.cancelled_total.fetch_add(1, Ordering::Relaxed);
        }
    }
    let slow = record.duration_ms >= slow_query_ms();
    if slow {
        m.queries_slow_total.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::json!({
            "ts": now_ts(),
            "collection": record.collection,
            "op": record.op,
            "duration_ms": record.duration_ms,
            "result_count": record.result_count,
            "outcome": record.outcome,
        });
        log::info!(target: METRICS_TARGET, "{line}");
    }
    slow
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub queries_slow_total: u64,
    pub timeouts_total: u64,
    pub cancelled_total: u64,
    pub failures_total: u64,
}

#[must_use]
pub fn snapshot() -> MetricsSnapshot {
    let m = &TELEMETRY.metrics;
    MetricsSnapshot {
        queries_total: m.queries_total.load(Ordering::Relaxed),
        queries_slow_total: m.queries_slow_total.load(Ordering::Relaxed),
        timeouts_total: m.timeouts_total.load(Ordering::Relaxed),
        cancelled_total: m.cancelled_total.load(Ordering::Relaxed),
        failures_total: m.failures_total.load(Ordering::Relaxed),
    }
}

/// OpenMetrics exposition of the process-wide counters.
#[must_use]
pub fn metrics_text() -> String {
    let s = snapshot();
    format!(
        "# TYPE docshell_queries counter\n\
         docshell_queries_total {}\n\
         # TYPE docshell_queries_slow counter\n\
         docshell_queries_slow_total {}\n\
         # TYPE docshell_timeouts counter\n\
         docshell_timeouts_total {}\n\
         # TYPE docshell_cancelled counter\n\
         docshell_cancelled_total {}\n\
         # TYPE docshell_failures counter\n\
         docshell_failures_total {}\n\
         # EOF\n",
        s.queries_total, s.queries_slow_total, s.timeouts_total, s.cancelled_total, s.failures_total,
    )
}
