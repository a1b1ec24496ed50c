use docshell::config::{ALLOWED_PAGE_SIZES, ConfigError, QueryOptions, ShellConfig};
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn explicit_file_fills_what_flags_leave_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shell.toml");
    std::fs::write(&path, "page_size = 100\ntimeout_ms = 750\nslow_query_ms = 20\nlog_dir = \"/tmp/docshell-logs\"\n").unwrap();
    let flags = ShellConfig { timeout_ms: Some(1500), ..ShellConfig::default() };
    let cfg = ShellConfig::resolve(flags, Some(&path)).unwrap();
    assert_eq!(cfg.page_size, Some(100));
    assert_eq!(cfg.timeout_ms, Some(1500));
    assert_eq!(cfg.slow_query_ms, Some(20));
    assert_eq!(cfg.log_dir, Some(PathBuf::from("/tmp/docshell-logs")));
}

#[test]
fn lower_layers_never_override() {
    let mut top = ShellConfig { log_level: Some("warn".into()), ..ShellConfig::default() };
    top.fill_missing(ShellConfig { log_level: Some("trace".into()), page_size: Some(10), ..ShellConfig::default() });
    top.fill_from_env(|k| (k == "DOCSHELL_PAGE_SIZE").then(|| "500".to_string()));
    assert_eq!(top.log_level.as_deref(), Some("warn"));
    assert_eq!(top.page_size, Some(10));
}

#[test]
fn malformed_env_numbers_are_ignored() {
    let mut cfg = ShellConfig::default();
    cfg.fill_from_env(|k| (k == "DOCSHELL_TIMEOUT_MS").then(|| "soon".to_string()));
    assert_eq!(cfg.timeout_ms, None);
    assert_eq!(cfg.query_options(1).unwrap(), QueryOptions::default());
}

#[test]
fn wrong_value_type_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("typed.toml");
    std::fs::write(&path, "page_size = \"big\"\n").unwrap();
    assert!(matches!(ShellConfig::from_file(&path), Err(ConfigError::Parse { .. })));
}

#[test]
fn every_allowed_page_size_validates() {
    for size in ALLOWED_PAGE_SIZES {
        let o = QueryOptions { page_size: size, ..QueryOptions::default() };
        assert!(o.validate().is_ok());
    }
    assert!(QueryOptions { page_size: 1000, ..QueryOptions::default() }.validate().is_err());
}
