//! Protocol-independent entry point used by the CLI
//!
//! [`Operations`] owns the validated configuration and one backend, chosen
//! by protocol. The backend lives behind an `Arc<Mutex<_>>` so the poll
//! loop's timer threads can borrow it for one check at a time.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{ConnectionConfig, Protocol};
use crate::error::TransferError;
use crate::ftp_ops::FtpBackend;
use crate::http_ops::HttpBackend;
use crate::logging::log;
use crate::outcome::TransferResult;
use crate::poll::{self, Completion, DownloadRequest, PollStep, PollTarget};
use crate::shutdown::CancelToken;

/// Transfer backend chosen by the configured protocol
pub enum Backend {
    Ftp(FtpBackend),
    Http(HttpBackend),
}

impl Backend {
    /// Real backend for `protocol`
    pub fn for_protocol(protocol: Protocol) -> Result<Self, TransferError> {
        Ok(match protocol {
            Protocol::Ftp => Backend::Ftp(FtpBackend::connected()),
            Protocol::Http => Backend::Http(HttpBackend::connected()?),
        })
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Backend::Ftp(_) => Protocol::Ftp,
            Backend::Http(_) => Protocol::Http,
        }
    }

    /// For HTTP the password is the API key and the username is unused
    fn init(&mut self, config: &ConnectionConfig) -> TransferResult {
        match self {
            Backend::Ftp(ftp) => ftp.init(
                config.username(),
                config.password(),
                config.host(),
                config.port(),
            ),
            Backend::Http(http) => http.init(config.password(), config.host(), config.port()),
        }
    }

    fn upload(&mut self, file: &Path, single_file: bool, notify_email: Option<&str>) -> TransferResult {
        match self {
            Backend::Ftp(ftp) => ftp.upload(file, single_file),
            Backend::Http(http) => http.upload(file, single_file, notify_email),
        }
    }

    fn remove(&mut self) -> TransferResult {
        match self {
            Backend::Ftp(ftp) => ftp.remove(),
            Backend::Http(http) => http.remove(),
        }
    }
}

impl PollTarget for Backend {
    fn check(&mut self, request: &DownloadRequest) -> PollStep {
        match self {
            Backend::Ftp(ftp) => ftp.check(request),
            Backend::Http(http) => http.check(request),
        }
    }
}

/// Init, upload, download and remove over whichever backend the config selects
pub struct Operations {
    config: ConnectionConfig,
    backend: Arc<Mutex<Backend>>,
    cancel: CancelToken,
}

impl Operations {
    /// Creates the backend matching the configured protocol
    pub fn new(config: ConnectionConfig) -> Result<Self, TransferError> {
        let backend = Backend::for_protocol(config.protocol())?;
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: ConnectionConfig, backend: Backend) -> Self {
        Operations {
            config,
            backend: Arc::new(Mutex::new(backend)),
            cancel: CancelToken::new(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn protocol(&self) -> Protocol {
        self.config.protocol()
    }

    /// Token that aborts a pending download wait when cancelled
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn init(&self) -> TransferResult {
        let _ = log(&format!(
            "Connecting to {}://{}:{}",
            self.config.protocol(),
            self.config.host(),
            self.config.port()
        ));
        self.with_locked(|backend| backend.init(&self.config))
    }

    /// The notification address is only sent by the HTTP backend
    pub fn upload(&self, file: &Path, single_file: bool) -> TransferResult {
        let notify_email = self.config.notify_email();
        self.with_locked(|backend| backend.upload(file, single_file, notify_email))
    }

    /// Starts polling for the result; returns once the first check is done
    ///
    /// `callback` receives `(succeeded, message)` exactly once, either on
    /// this thread or on a timer thread.
    pub fn download(&self, local_dir: &Path, remove_after: bool, callback: Completion) {
        let request = DownloadRequest {
            local_dir: local_dir.to_path_buf(),
            poll_interval: self.config.poll_interval(),
            remove_after,
        };
        poll::download(
            Arc::clone(&self.backend),
            request,
            self.cancel.clone(),
            callback,
        );
    }

    pub fn remove(&self) -> TransferResult {
        self.with_locked(Backend::remove)
    }

    fn with_locked<F>(&self, op: F) -> TransferResult
    where
        F: FnOnce(&mut Backend) -> TransferResult,
    {
        match self.lock() {
            Some(mut backend) => op(&mut *backend),
            None => TransferResult::failure("Transfer state is unavailable after an earlier failure"),
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, Backend>> {
        self.backend.lock().ok()
    }
}
