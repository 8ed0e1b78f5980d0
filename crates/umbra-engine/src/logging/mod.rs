//! Logging setup and log-once helpers for per-frame diagnostics.

mod init;
mod once;

pub use init::{init_logging, LoggingConfig};
pub use once::WarnOnce;
