//! Transport abstractions for the processing service
//!
//! The backends only talk to the network through the traits defined here,
//! so the real clients (`suppaftp` for FTP, `reqwest` for HTTP) can be
//! replaced by in-memory doubles in tests.

pub mod ftp;
pub mod http;

pub use ftp::{FtpOpener, FtpUploader};
pub use http::ReqwestClient;

use crate::error::TransferError;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection timeout used by the real clients
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to (re)open an FTP session
#[derive(Debug)]
pub struct SessionOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub timeout: Duration,
}

impl SessionOptions {
    pub fn new(username: &str, password: &str, host: &str, port: u16) -> Self {
        SessionOptions {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: SecretString::new(password.to_string()),
            timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

/// An open, logged-in session against the remote file area
pub trait RemoteSession: Send {
    /// Names of the entries in `path` (NLST)
    fn list_directory(&mut self, path: &str) -> Result<Vec<String>, TransferError>;

    /// Fetches `remote` into `local`, deleting the remote copy when `remove` is set
    fn get_file(&mut self, remote: &str, local: &Path, remove: bool) -> Result<(), TransferError>;

    /// Deletes `remote`
    fn remove_file(&mut self, remote: &str) -> Result<(), TransferError>;

    /// Closes the session; errors are ignored since the session is discarded anyway
    fn close(&mut self);
}

/// Opens sessions; called once at init and again before every existence check
pub trait SessionOpener: Send {
    fn open(&self, options: &SessionOptions) -> Result<Box<dyn RemoteSession>, TransferError>;
}

/// Final reply of a completed upload, e.g. `226` and its text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReply {
    pub code: u32,
    pub description: String,
}

/// Client that stores a single file and reports the server's closing reply
///
/// Positive replies (any code below 400) are returned as `Ok` so the caller
/// can interpret the code; negative ones come back as
/// [`TransferError::Rejected`].
pub trait FileTransferClient: Send {
    fn upload_file(
        &mut self,
        options: &SessionOptions,
        remote_path: &str,
        local: &Path,
    ) -> Result<TransferReply, TransferError>;
}

/// Raw HTTP response: status code and body bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Multipart form posted to the bulk endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    /// `single` or `multi`
    pub export_type: String,
    /// Omitted from the form when `None`
    pub notify_email: Option<String>,
    /// Sent as field `file` with content type `text/csv`
    pub file: PathBuf,
}

/// Minimal HTTP client used by the HTTP backend
pub trait HttpClient: Send {
    /// Sets the `x-authorization` header sent with every later request
    fn set_api_key(&mut self, api_key: &str) -> Result<(), TransferError>;

    fn post_multipart(&self, url: &str, form: &UploadForm) -> Result<HttpReply, TransferError>;

    fn get(&self, url: &str) -> Result<HttpReply, TransferError>;

    /// GETs `url` and streams a 2xx body into `dest`
    ///
    /// The returned body is empty for 2xx replies; for any other status
    /// nothing is written and the (error) body is returned instead.
    fn get_file(&self, url: &str, dest: &Path) -> Result<HttpReply, TransferError>;

    fn delete(&self, url: &str) -> Result<HttpReply, TransferError>;
}
