//! Bulk transfer client library
//!
//! Uploads a file to a remote processing service over FTP or HTTP, polls
//! until the processed archive is ready and downloads it. The CLI in
//! `main.rs` is a thin layer over [`Operations`].

pub mod cli;
pub mod config;
pub mod error;
pub mod filename;
pub mod ftp_ops;
pub mod http_ops;
pub mod logging;
pub mod operations;
pub mod outcome;
pub mod poll;
pub mod protocols;
pub mod shutdown;

#[cfg(test)]
mod testing;

pub use cli::{parse_args, resolve_config, Args};
pub use config::{parse_config, ConnectionConfig, Protocol, Settings};
pub use error::{ConfigError, TransferError};
pub use logging::{log, log_with_context, set_log_file};
pub use operations::{Backend, Operations};
pub use outcome::TransferResult;
pub use shutdown::{install_signal_handler, CancelToken};

/// Name of the program, used in the CLI and log lines
pub const PROGRAM_NAME: &str = "bulkxfer";

/// Current version of the program (from Cargo.toml)
pub const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");
