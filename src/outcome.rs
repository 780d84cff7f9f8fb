use crate::error::TransferError;
use std::fmt;

/// Result of a synchronous workflow step (init, upload, remove)
///
/// A failed result always carries a non-empty message describing the
/// failure. Successful results carry a confirmation, except `remove` which
/// succeeds with an empty message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub succeeded: bool,
    pub message: String,
}

impl TransferResult {
    pub fn success(message: impl Into<String>) -> Self {
        TransferResult {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            "Unknown error".to_string()
        } else {
            message
        };
        TransferResult {
            succeeded: false,
            message,
        }
    }
}

impl From<TransferError> for TransferResult {
    fn from(err: TransferError) -> Self {
        TransferResult::failure(err.to_string())
    }
}

impl From<Result<String, TransferError>> for TransferResult {
    fn from(result: Result<String, TransferError>) -> Self {
        match result {
            Ok(message) => TransferResult::success(message),
            Err(e) => e.into(),
        }
    }
}

impl fmt::Display for TransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
