//! Error types for transfers and configuration
//!
//! Every public operation of the workflow converts these into a
//! [`TransferResult`](crate::outcome::TransferResult) before returning, so
//! callers never see them unless they use the transport layer directly.

use thiserror::Error;

/// Failures raised while talking to the remote service or the local disk
#[derive(Debug, Error)]
pub enum TransferError {
    /// The session or HTTP connection could not be established or was lost
    #[error("{0}")]
    Connection(String),

    /// The server answered, but with a reply that is not a success
    #[error("{description}")]
    Rejected { code: u32, description: String },

    /// The server reported `status: "error"` in a JSON body
    #[error("{0}")]
    Server(String),

    /// A file that should exist locally does not
    #[error("{0} could not be saved.")]
    Local(String),

    /// Download or remove requested before any successful upload
    #[error("No file has been uploaded yet.")]
    NotUploaded,

    /// Operation requested before `init`
    #[error("{0} backend has not been initialized.")]
    NotInitialized(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ftp(#[from] suppaftp::FtpError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response from server: {0}")]
    Json(#[from] serde_json::Error),
}

/// Problems with the values supplied on the command line or in a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required value: {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
