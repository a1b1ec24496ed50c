//! Rolling-file logging via `log4rs`.
//!
//! Layout under the log directory:
//! - `app.log`: root logger
//! - `metrics.log`: slow-query lines (target `docshell::metrics`)
//! - `dev6.log`: developer bench lines (target `docshell::dev6`), only when enabled
//!
//! Each file rolls at 10 MiB into `<name>.{n}.log`, keeping `retention` windows.

use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::exec::telemetry::METRICS_TARGET;
use crate::utils::devlog::DEV6_TARGET;

const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

static HANDLE: OnceLock<Handle> = OnceLock::new();

pub type LogResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Map a textual level; unknown values fall back to `info`.
#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> LogResult<RollingFileAppender> {
    let roller = FixedWindowRoller::builder().build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Build the appender configuration without installing it.
///
/// # Errors
/// Fails if the directory cannot be created or an appender cannot open its file.
pub fn build_config(dir: &Path, level: LevelFilter, retention: Option<usize>, dev6: bool) -> LogResult<Config> {
    std::fs::create_dir_all(dir)?;
    let keep = retention.and_then(|r| u32::try_from(r).ok()).filter(|r| *r > 0).unwrap_or(DEFAULT_RETENTION);
    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(dir, "app", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(dir, "metrics", keep)?)))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, LevelFilter::Info));
    builder = if dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(dir, "dev6", keep)?)))
            .logger(Logger::builder().appender("dev6").additive(false).build(DEV6_TARGET, LevelFilter::Trace))
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV6_TARGET, LevelFilter::Off))
    };
    Ok(builder.build(Root::builder().appender("app").build(level))?)
}

/// Install (or replace) the process-wide logging configuration.
///
/// - `dir`: log directory, defaults to the current directory
/// - `level`: error|warn|info|debug|trace
/// - `retention`: rolled files to keep per log (default 7)
///
/// # Errors
/// Fails if the configuration cannot be built or another logger already owns the facade.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>, dev6: bool) -> LogResult<()> {
    let base = dir.map_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")), PathBuf::from);
    let config = build_config(&base, parse_level(level), retention, dev6)?;
    if let Some(handle) = HANDLE.get() {
        handle.set_config(config);
        return Ok(());
    }
    let handle = log4rs::init_config(config)?;
    let _ = HANDLE.set(handle);
    Ok(())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Configure from `DOCSHELL_LOG_DIR`, `DOCSHELL_LOG_LEVEL`, `DOCSHELL_LOG_RETENTION` and
/// `DOCSHELL_DEV6`. Does nothing unless `DOCSHELL_LOG_DIR` is set.
///
/// # Errors
/// Same as [`configure_logging`].
pub fn configure_from_env() -> LogResult<bool> {
    let Some(dir) = std::env::var_os("DOCSHELL_LOG_DIR").map(PathBuf::from) else {
        return Ok(false);
    };
    let level = std::env::var("DOCSHELL_LOG_LEVEL").ok();
    let retention = std::env::var("DOCSHELL_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(Some(&dir), level.as_deref(), retention, env_flag("DOCSHELL_DEV6"))?;
    Ok(true)
}
