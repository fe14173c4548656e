//! Logging utilities.
//!
//! This module centralizes logger initialization. The rest of the crate only
//! uses the `log` facade; `env_logger` is wired up here.

mod init;

pub use init::{init_logging, LoggingConfig};
