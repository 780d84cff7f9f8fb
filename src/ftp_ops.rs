use std::path::Path;

use crate::error::TransferError;
use crate::filename::download_file_name;
use crate::logging::log_with_context;
use crate::outcome::TransferResult;
use crate::poll::{DownloadRequest, PollStep, PollTarget};
use crate::protocols::{
    FileTransferClient, FtpOpener, FtpUploader, RemoteSession, SessionOpener, SessionOptions,
};

/// Remote directory where processed archives appear
pub const COMPLETE_DIR: &str = "/complete";

/// FTP reply code for a successfully closed data transfer
const TRANSFER_COMPLETE: u32 = 226;

const TAG: Option<&str> = Some("ftp");

/// Upload/poll/download workflow over FTP
///
/// Holds the session used for fetching and deleting results, the options
/// needed to reopen it, and the name the server assigned to the last upload.
pub struct FtpBackend {
    opener: Box<dyn SessionOpener>,
    uploader: Box<dyn FileTransferClient>,
    options: Option<SessionOptions>,
    session: Option<Box<dyn RemoteSession>>,
    uploaded_name: Option<String>,
}

impl FtpBackend {
    pub fn new(opener: Box<dyn SessionOpener>, uploader: Box<dyn FileTransferClient>) -> Self {
        FtpBackend {
            opener,
            uploader,
            options: None,
            session: None,
            uploaded_name: None,
        }
    }

    /// Backend using the real `suppaftp` transports
    pub fn connected() -> Self {
        Self::new(Box::new(FtpOpener), Box::new(FtpUploader))
    }

    /// Opens the session used for listing, fetching and deleting results
    ///
    /// The options are kept even if the connection fails so later checks
    /// can retry with them.
    pub fn init(&mut self, username: &str, password: &str, host: &str, port: u16) -> TransferResult {
        self.close_session();
        self.options = Some(SessionOptions::new(username, password, host, port));

        match self.open_session() {
            Ok(()) => {
                let _ = log_with_context(
                    &format!("Connected to ftp://{}@{}:{}", username, host, port),
                    TAG,
                );
                TransferResult::success("Initialization succeeded.")
            }
            Err(e) => e.into(),
        }
    }

    /// Uploads `file` and records the name the server assigned to it
    ///
    /// Single-file uploads go to the `default` import directory, multi-file
    /// uploads to `splitfile`.
    pub fn upload(&mut self, file: &Path, single_file: bool) -> TransferResult {
        let options = match &self.options {
            Some(options) => options,
            None => return TransferError::NotInitialized("FTP").into(),
        };
        let local_name = match file.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                return TransferResult::failure(format!("{} is not a file", file.display()))
            }
        };

        let mode = if single_file { "default" } else { "splitfile" };
        let remote_path = format!("/import_{}_{}_config/{}", options.username, mode, local_name);
        let _ = log_with_context(&format!("Uploading {} to {}", file.display(), remote_path), TAG);

        let reply = match self.uploader.upload_file(options, &remote_path, file) {
            Ok(reply) => reply,
            Err(e) => return e.into(),
        };

        if reply.code != TRANSFER_COMPLETE {
            return TransferResult::failure(format!(
                "Failed to extract filename from: {}",
                reply.description
            ));
        }

        let server_name = reply
            .description
            .rsplit(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        let message = format!("{} has been uploaded as {}", local_name, server_name);
        self.uploaded_name = Some(server_name);
        TransferResult::success(message)
    }

    /// Server-assigned name of the last successful upload
    pub fn uploaded_name(&self) -> Option<&str> {
        self.uploaded_name.as_deref()
    }

    /// Name of the result archive expected for the last upload
    pub fn download_file_name(&self) -> String {
        download_file_name(self.uploaded_name.as_deref().unwrap_or_default())
    }

    /// Checks whether `remote_path` exists on the server
    ///
    /// The session is reopened first because an idle control connection may
    /// have been dropped by the server. An empty path is never found and
    /// causes no network traffic.
    pub fn remote_file_exists(&mut self, remote_path: &str) -> Result<bool, TransferError> {
        if remote_path.is_empty() {
            return Ok(false);
        }

        let (location, filename) = match remote_path.rsplit_once('/') {
            Some(("", name)) => ("/", name),
            Some((dir, name)) => (dir, name),
            None => (".", remote_path),
        };

        self.close_session();
        self.open_session()?;

        let listing = self.session()?.list_directory(location)?;
        Ok(listing.iter().any(|entry| entry == filename))
    }

    /// Deletes the result archive of the last upload from the server
    pub fn remove(&mut self) -> TransferResult {
        if self.uploaded_name.is_none() {
            return TransferError::NotUploaded.into();
        }
        let remote_path = format!("{}/{}", COMPLETE_DIR, self.download_file_name());

        let removed = self
            .session()
            .and_then(|session| session.remove_file(&remote_path));
        match removed {
            Ok(()) => {
                let _ = log_with_context(&format!("Removed {}", remote_path), TAG);
                TransferResult::success("")
            }
            Err(e) => e.into(),
        }
    }

    /// Fetches the result into the local directory and confirms it was saved
    fn fetch(&mut self, remote_path: &str, name: &str, request: &DownloadRequest) -> Result<String, TransferError> {
        let local_path = request.local_dir.join(name);
        self.session()?
            .get_file(remote_path, &local_path, request.remove_after)?;

        if !local_path.exists() {
            return Err(TransferError::Local(local_path.display().to_string()));
        }
        Ok(format!("{} downloaded to {}", name, request.local_dir.display()))
    }

    fn session(&mut self) -> Result<&mut Box<dyn RemoteSession>, TransferError> {
        self.session.as_mut().ok_or(TransferError::NotInitialized("FTP"))
    }

    fn open_session(&mut self) -> Result<(), TransferError> {
        let options = self.options.as_ref().ok_or(TransferError::NotInitialized("FTP"))?;
        self.session = Some(self.opener.open(options)?);
        Ok(())
    }

    fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}

impl PollTarget for FtpBackend {
    /// One download attempt: found -> fetch, error -> fail, missing -> wait
    fn check(&mut self, request: &DownloadRequest) -> PollStep {
        if self.uploaded_name.is_none() {
            return PollStep::Ready(TransferError::NotUploaded.into());
        }
        let name = self.download_file_name();
        let remote_path = format!("{}/{}", COMPLETE_DIR, name);

        match self.remote_file_exists(&remote_path) {
            Ok(true) => PollStep::Ready(self.fetch(&remote_path, &name, request).into()),
            Ok(false) => {
                let _ = log_with_context(&format!("Waiting for results file {}", name), TAG);
                PollStep::Waiting(name)
            }
            Err(e) => PollStep::Ready(e.into()),
        }
    }
}

impl Drop for FtpBackend {
    fn drop(&mut self) {
        self.close_session();
    }
}
