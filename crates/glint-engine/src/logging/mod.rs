//! Logging utilities.
//!
//! Engine code logs through the `log` facade only; binaries call
//! [`init_logging`] early in `main` to install `env_logger`.

mod init;

pub use init::{init_logging, LoggingConfig};
