//! Utility modules: developer trace lines and value conversion.
pub mod devlog;
pub mod json;
