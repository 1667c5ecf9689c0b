/*!
 * Error types for the transbatch crate.
 *
 * This module contains custom error types for different parts of the system,
 * using the thiserror crate for ergonomic error definitions, plus the
 * retryability taxonomy used by the batch orchestrator and the task queue.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Retryability class of a failure.
///
/// File tasks and connector errors carry this structurally; the retry policy
/// never inspects message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid input (bad URL, unsupported format, not found, no permission).
    /// Never retried.
    Validation,
    /// Upstream API/network/timeout failure. Retried up to the configured
    /// maximum attempts.
    Transient,
    /// Anything that could not be classified. Retried exactly once.
    Unclassified,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Unclassified => write!(f, "unclassified"),
        }
    }
}

impl ErrorKind {
    /// Classify a human-readable error message from an upstream API.
    ///
    /// This is a boundary adapter for collaborators that only surface
    /// localized text (Japanese or English). Everything past this point works
    /// with the structured kind.
    pub fn classify_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        const VALIDATION_MARKERS: &[&str] = &[
            "無効なurl",
            "サポートされていない",
            "ファイルが見つかりません",
            "権限",
            "アクセスできません",
            "invalid url",
            "unsupported format",
            "not found",
            "permission",
            "access denied",
        ];
        const TRANSIENT_MARKERS: &[&str] = &[
            "apiエラー",
            "api エラー",
            "ネットワーク",
            "タイムアウト",
            "一時的",
            "api error",
            "network",
            "timeout",
            "timed out",
            "temporarily unavailable",
            "rate limit",
        ];

        if VALIDATION_MARKERS.iter().any(|m| lower.contains(m)) {
            ErrorKind::Validation
        } else if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
            ErrorKind::Transient
        } else {
            ErrorKind::Unclassified
        }
    }
}

/// Decide whether a failed unit of work should be retried.
///
/// `retry_count` is the number of retries already consumed at evaluation time.
pub fn should_retry(kind: ErrorKind, retry_count: u32, max_retry_attempts: u32) -> bool {
    match kind {
        ErrorKind::Validation => false,
        ErrorKind::Transient => retry_count < max_retry_attempts,
        ErrorKind::Unclassified => retry_count == 0,
    }
}

/// Errors returned by external collaborators (file resolution, translation
/// setup, job advancement, dictionary access).
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ConnectorError {
    /// Retryability class of the failure
    pub kind: ErrorKind,
    /// Human-readable message from the collaborator
    pub message: String,
}

impl ConnectorError {
    /// Create a connector error with an explicit kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a validation error (never retried)
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a transient error (retried up to the maximum)
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Adapt a free-text upstream message, classifying it at the boundary
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::classify_message(&message),
            message,
        }
    }
}

/// Errors from the TTL state store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Compare-and-swap found a different version than expected
    #[error("version conflict on '{key}': expected {expected}, found {found}")]
    VersionConflict {
        /// Store key being written
        key: String,
        /// Version the writer read
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Compare-and-swap target vanished (expired or removed)
    #[error("record '{0}' no longer exists")]
    Missing(String),

    /// Record could not be serialized or deserialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the task queue
#[derive(Error, Debug)]
pub enum QueueError {
    /// Task id not present in the active set
    #[error("task '{0}' is not active")]
    NotActive(String),
}

/// Errors from batch orchestration
#[derive(Error, Debug)]
pub enum BatchError {
    /// No batch stored under the given id
    #[error("batch '{0}' not found")]
    NotFound(String),

    /// No file task matches the given correlation id
    #[error("no file with correlation id '{correlation_id}' in batch '{batch_id}'")]
    FileNotFound {
        /// Batch id
        batch_id: String,
        /// Correlation id reported by the caller
        correlation_id: String,
    },

    /// Operation is not valid in the batch's current state
    #[error("batch '{id}' is {status}: {reason}")]
    InvalidState {
        /// Batch id
        id: String,
        /// Current batch status
        status: String,
        /// Why the operation was refused
        reason: String,
    },

    /// The persistence substrate failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// CAS retries exhausted under contention
    #[error("batch '{0}' is being modified concurrently")]
    Contention(String),
}
