//! Non-blocking poll loop shared by both backends
//!
//! A download is a chain of attempts. Each attempt runs a single check
//! against the backend on the current thread; if the result is not ready
//! yet, a one-shot timer thread waits for the poll interval and starts the
//! next attempt. The caller's thread is never blocked by the wait, and the
//! completion callback fires exactly once.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::logging::log_with_context;
use crate::outcome::TransferResult;
use crate::shutdown::CancelToken;

/// Called once with `(succeeded, message)` when the download finishes or fails
pub type Completion = Box<dyn FnOnce(bool, String) + Send + 'static>;

/// Parameters of a download, fixed for the whole poll sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub local_dir: PathBuf,
    pub poll_interval: Duration,
    pub remove_after: bool,
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// Terminal: report this result through the callback
    Ready(TransferResult),
    /// Not there yet; the string names what is being waited on
    Waiting(String),
}

/// A backend that can be asked whether its result is ready
pub trait PollTarget: Send + 'static {
    /// Performs one blocking check, downloading the result if it is available
    fn check(&mut self, request: &DownloadRequest) -> PollStep;
}

/// Runs one attempt now and schedules further attempts until a terminal step
///
/// The target stays locked only for the duration of [`PollTarget::check`];
/// the callback always runs with the lock released.
pub fn download<T: PollTarget>(
    target: Arc<Mutex<T>>,
    request: DownloadRequest,
    cancel: CancelToken,
    callback: Completion,
) {
    let step = match target.lock() {
        Ok(mut backend) => backend.check(&request),
        Err(_) => PollStep::Ready(TransferResult::failure(
            "Transfer state is unavailable after an earlier failure",
        )),
    };

    match step {
        PollStep::Ready(result) => callback(result.succeeded, result.message),
        PollStep::Waiting(key) => wait_and_download(target, request, cancel, callback, key),
    }
}

/// Waits one poll interval on a timer thread, then re-enters [`download`]
fn wait_and_download<T: PollTarget>(
    target: Arc<Mutex<T>>,
    request: DownloadRequest,
    cancel: CancelToken,
    callback: Completion,
    key: String,
) {
    if cancel.is_cancelled() {
        callback(false, format!("Download of {} cancelled.", key));
        return;
    }

    let _ = log_with_context(
        &format!(
            "Next check for {} in {}s",
            key,
            request.poll_interval.as_secs_f32()
        ),
        Some("poll"),
    );

    thread::spawn(move || {
        if cancel.wait_timeout(request.poll_interval) {
            download(target, request, cancel, callback);
        } else {
            callback(false, format!("Download of {} cancelled.", key));
        }
    });
}
