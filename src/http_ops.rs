//! Upload/poll/download workflow over the HTTP bulk API
//!
//! Replies are JSON objects keyed on `status`. A `status` of `"error"` always
//! carries a `msg`; every other reply is decoded into the struct for its
//! endpoint.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::TransferError;
use crate::logging::log_with_context;
use crate::outcome::TransferResult;
use crate::poll::{DownloadRequest, PollStep, PollTarget};
use crate::protocols::{HttpClient, HttpReply, ReqwestClient, UploadForm};

const STATUS_ERROR: &str = "error";
const STATUS_COMPLETED: &str = "completed";

const TAG: Option<&str> = Some("http");

/// Downloaded files larger than this are archives, not embedded error objects
const ERROR_BODY_LIMIT: u64 = 64 * 1024;

/// Just the `status` of a reply, read before choosing the full shape
#[derive(Debug, Deserialize)]
struct StatusTag {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    status_url: String,
}

/// Job ids arrive as strings or bare numbers depending on the server version
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum JobId {
    Text(String),
    Number(u64),
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Text(id) => f.write_str(id),
            JobId::Number(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    job: Option<JobId>,
    #[serde(default)]
    download_url: Option<String>,
}

/// What the last status poll reported about the job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    pub job_id: String,
    pub status_url: String,
    pub download_url: Option<String>,
}

/// Decodes a reply, turning `status: "error"` into [`TransferError::Server`]
///
/// Bodies that are not JSON are reported as such for 2xx replies; for other
/// replies the HTTP status is more useful than the parse error.
fn parse_reply<T: DeserializeOwned>(reply: &HttpReply) -> Result<T, TransferError> {
    let tag: StatusTag = match serde_json::from_slice(&reply.body) {
        Ok(tag) => tag,
        Err(e) if reply.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(TransferError::Server(format!(
                "Server returned HTTP {}",
                reply.status
            )))
        }
    };

    if tag.status.as_deref() == Some(STATUS_ERROR) {
        let error: ErrorResponse = serde_json::from_slice(&reply.body)?;
        return Err(TransferError::Server(error.msg));
    }
    Ok(serde_json::from_slice(&reply.body)?)
}

/// Message of an error object embedded in a downloaded body, if there is one
fn embedded_error(body: &[u8]) -> Option<String> {
    let tag: StatusTag = serde_json::from_slice(body).ok()?;
    if tag.status.as_deref() != Some(STATUS_ERROR) {
        return None;
    }
    let error: ErrorResponse = serde_json::from_slice(body).ok()?;
    Some(error.msg)
}

/// Like [`embedded_error`], for a body already saved to `path`
fn embedded_error_in_file(path: &Path) -> Option<String> {
    if fs::metadata(path).ok()?.len() > ERROR_BODY_LIMIT {
        return None;
    }
    embedded_error(&fs::read(path).ok()?)
}

pub struct HttpBackend {
    client: Box<dyn HttpClient>,
    base_url: Option<String>,
    status_url: Option<String>,
    last_poll: Option<PollState>,
}

impl HttpBackend {
    pub fn new(client: Box<dyn HttpClient>) -> Self {
        HttpBackend {
            client,
            base_url: None,
            status_url: None,
            last_poll: None,
        }
    }

    /// Backend using the blocking `reqwest` client
    pub fn connected() -> Result<Self, TransferError> {
        Ok(Self::new(Box::new(ReqwestClient::new()?)))
    }

    /// Sets the endpoint and API key; no request is made
    pub fn init(&mut self, api_key: &str, host: &str, port: u16) -> TransferResult {
        self.base_url = Some(format!("http://{}:{}/api/live/bulk/", host, port));
        match self.client.set_api_key(api_key) {
            Ok(()) => TransferResult::success(""),
            Err(e) => e.into(),
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn status_url(&self) -> Option<&str> {
        self.status_url.as_deref()
    }

    /// State reported by the most recent status poll
    pub fn poll_state(&self) -> Option<&PollState> {
        self.last_poll.as_ref()
    }

    /// Posts `file` to the bulk endpoint and stores the returned status URL
    pub fn upload(&mut self, file: &Path, single_file: bool, notify_email: Option<&str>) -> TransferResult {
        self.post(file, single_file, notify_email)
            .map(|()| format!("{} was uploaded.", file.display()))
            .into()
    }

    fn post(&mut self, file: &Path, single_file: bool, notify_email: Option<&str>) -> Result<(), TransferError> {
        let base_url = self.base_url.as_deref().ok_or(TransferError::NotInitialized("HTTP"))?;
        let form = UploadForm {
            export_type: if single_file { "single" } else { "multi" }.to_string(),
            notify_email: notify_email.map(str::to_string),
            file: file.to_path_buf(),
        };

        let _ = log_with_context(&format!("Posting {} to {}", file.display(), base_url), TAG);
        let reply = self.client.post_multipart(base_url, &form)?;
        let upload: UploadResponse = parse_reply(&reply)?;

        let _ = log_with_context(&format!("Job status at {}", upload.status_url), TAG);
        self.status_url = Some(upload.status_url);
        self.last_poll = None;
        Ok(())
    }

    /// GETs the status URL; `Ok(true, ..)` means the job has completed
    fn fetch_status(&mut self, status_url: &str) -> Result<(bool, PollState), TransferError> {
        let reply = self.client.get(status_url)?;
        let status: StatusResponse = parse_reply(&reply)?;

        let state = PollState {
            job_id: status.job.map(|job| job.to_string()).unwrap_or_default(),
            status_url: status_url.to_string(),
            download_url: status.download_url,
        };
        self.last_poll = Some(state.clone());
        Ok((status.status.as_deref() == Some(STATUS_COMPLETED), state))
    }

    /// Fetches the archive of a completed job to `{local_dir}/{job}.zip`
    ///
    /// With `remove_after` the job is deleted on the server afterwards, and a
    /// failed delete fails the whole download.
    pub fn download_and_delete(&mut self, state: &PollState, local_dir: &Path, remove_after: bool) -> TransferResult {
        let file_name = format!("{}.zip", state.job_id);
        if let Err(e) = self.fetch_archive(state, local_dir, &file_name) {
            return e.into();
        }

        if remove_after {
            let removed = self.remove();
            if !removed.succeeded {
                return removed;
            }
        }
        TransferResult::success(format!("{} downloaded to {}", file_name, local_dir.display()))
    }

    fn fetch_archive(&self, state: &PollState, local_dir: &Path, file_name: &str) -> Result<(), TransferError> {
        let download_url = state.download_url.as_deref().ok_or_else(|| {
            TransferError::Server("Completed job has no download_url".to_string())
        })?;
        if state.job_id.is_empty() {
            return Err(TransferError::Server("Completed job has no job id".to_string()));
        }

        let dest = local_dir.join(file_name);
        let _ = log_with_context(&format!("Fetching {} to {}", download_url, dest.display()), TAG);
        let reply = self.client.get_file(download_url, &dest)?;

        if !reply.is_success() {
            let msg = embedded_error(&reply.body)
                .unwrap_or_else(|| format!("Server returned HTTP {}", reply.status));
            return Err(TransferError::Server(msg));
        }
        if !dest.exists() {
            return Err(TransferError::Local(dest.display().to_string()));
        }
        if let Some(msg) = embedded_error_in_file(&dest) {
            let _ = fs::remove_file(&dest);
            return Err(TransferError::Server(msg));
        }
        Ok(())
    }

    /// Deletes the job on the server
    pub fn remove(&mut self) -> TransferResult {
        let status_url = match &self.status_url {
            Some(url) => url,
            None => return TransferError::NotUploaded.into(),
        };

        let deleted = self.client.delete(status_url).and_then(|reply| {
            // Some servers answer a DELETE with an empty 204
            if reply.is_success() && reply.body.iter().all(u8::is_ascii_whitespace) {
                return Ok(());
            }
            parse_reply::<StatusTag>(&reply).map(|_| ())
        });

        match deleted {
            Ok(()) => {
                let _ = log_with_context(&format!("Deleted job at {}", status_url), TAG);
                TransferResult::success("")
            }
            Err(e) => e.into(),
        }
    }
}

impl PollTarget for HttpBackend {
    fn check(&mut self, request: &DownloadRequest) -> PollStep {
        let status_url = match &self.status_url {
            Some(url) => url.clone(),
            None => return PollStep::Ready(TransferError::NotUploaded.into()),
        };

        match self.fetch_status(&status_url) {
            Ok((true, state)) => PollStep::Ready(self.download_and_delete(
                &state,
                &request.local_dir,
                request.remove_after,
            )),
            Ok((false, state)) => {
                let _ = log_with_context(&format!("Waiting for job {}", state.job_id), TAG);
                PollStep::Waiting(state.job_id)
            }
            Err(e) => PollStep::Ready(e.into()),
        }
    }
}
