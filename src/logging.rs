use chrono::Local;
use once_cell::sync::Lazy;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Global log file path protected by Mutex
///
/// When None, logs go to stdout.
pub static LOG_FILE: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

/// Logs a message with timestamp to the configured output
///
/// # Example
/// ```text
/// // log("Uploading data.csv").unwrap();
/// ```
pub fn log(message: &str) -> io::Result<()> {
    log_with_context(message, None)
}

/// Logs a message with timestamp and an optional context tag
///
/// The tag names the part of the workflow emitting the line, e.g. `ftp`,
/// `http` or `poll`, and is rendered as `[ftp]`.
///
/// # Example
/// ```text
/// // log_with_context("Waiting for results file archive_a.zip", Some("ftp")).unwrap();
/// ```
pub fn log_with_context(message: &str, context: Option<&str>) -> io::Result<()> {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let line = match context {
        Some(tag) => format!("{} [{}] {}\n", timestamp, tag, message),
        None => format!("{} {}\n", timestamp, message),
    };

    let target = match LOG_FILE.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };

    match target {
        Some(path) => {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(line.as_bytes())?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(line.as_bytes())?;
        }
    }

    Ok(())
}

/// Sets the path for the log file
///
/// Subsequent calls to the log functions append to this file.
pub fn set_log_file<P: AsRef<Path>>(path: P) {
    let path = path.as_ref().to_path_buf();
    match LOG_FILE.lock() {
        Ok(mut guard) => *guard = Some(path),
        Err(poisoned) => *poisoned.into_inner() = Some(path),
    }
}
