// Mirror src/utils plus the ambient config/logger modules
#[path = "mod_config.rs"]
mod config_tests;
#[path = "mod_devlog.rs"]
mod devlog_tests;
#[path = "mod_logger.rs"]
mod logger_tests;
