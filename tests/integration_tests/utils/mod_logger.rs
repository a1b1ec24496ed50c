use docshell::logger::{build_config, configure_logging, parse_level};
use log::LevelFilter;
use std::fs;
use tempfile::tempdir;

#[test]
fn configure_logging_writes_app_and_metrics_in_dir() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("proc_logs");
    configure_logging(Some(&base), Some("debug"), Some(3), true).unwrap();
    log::info!("hello app");
    log::info!(target: "docshell::metrics", "metrics-marker-7f3");
    docshell::dev6!("dev line");
    assert!(base.join("app.log").exists());
    assert!(base.join("metrics.log").exists());
    assert!(base.join("dev6.log").exists());
    log::logger().flush();
    let app = fs::read_to_string(base.join("app.log")).unwrap();
    assert!(app.contains("hello app"));
    assert!(!app.contains("metrics-marker-7f3"), "metrics lines stay out of app.log");
}

#[test]
fn dev6_file_only_when_enabled() {
    let dir = tempdir().unwrap();
    build_config(dir.path(), LevelFilter::Info, None, false).unwrap();
    assert!(dir.path().join("app.log").exists());
    assert!(!dir.path().join("dev6.log").exists());
}

#[test]
fn unknown_levels_fall_back_to_info() {
    assert_eq!(parse_level(Some("verbose")), LevelFilter::Info);
    assert_eq!(parse_level(Some("off")), LevelFilter::Off);
}
