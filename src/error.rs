//! Error taxonomy surfaced by inventory synchronization.
//!
//! Every type here is `Clone` so one failed population pass can be reported to all
//! coalesced callers.

use std::fmt;

use thiserror::Error;

/// What: Classify storage-engine failures.
///
/// Details:
/// - `Io` covers file/device errors, `Serialization` covers unreadable persisted state,
///   `Unavailable` covers engines that refuse work (closed, injected faults).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Underlying I/O failed.
    Io,
    /// Persisted data could not be encoded or decoded.
    Serialization,
    /// Engine is unavailable.
    Unavailable,
}

impl StoreErrorKind {
    /// Stable lowercase name used in messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::Serialization => "serialization",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single repository operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{kind}] {message}")]
pub struct StoreError {
    /// Failure class.
    pub kind: StoreErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl StoreError {
    /// Build an error of `kind` with `message`.
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for [`StoreErrorKind::Io`].
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Io, message)
    }

    /// Shorthand for [`StoreErrorKind::Serialization`].
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Serialization, message)
    }

    /// Shorthand for [`StoreErrorKind::Unavailable`].
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {err}"))
    }
}

/// The package-enumeration collaborator failed or timed out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnumerationError {
    /// Enumeration did not finish within the configured bound.
    #[error("package enumeration timed out after {0:?}")]
    TimedOut(std::time::Duration),
    /// Enumeration reported a terminal failure.
    #[error("package enumeration failed: {0}")]
    Failed(String),
}

/// What: Failure reported to the caller of a synchronizer operation.
///
/// Details:
/// - Nothing is retried internally; the caller decides whether to re-drive.
/// - `Interrupted` means the background task running the operation panicked or was torn
///   down with the runtime; the operation's committed steps stay committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Package enumeration failed (`EnumerationFailure`).
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
    /// A repository operation failed (`StorageFailure`).
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
    /// The background task did not run to completion.
    #[error("operation interrupted: {0}")]
    Interrupted(String),
}

/// Result alias for repository operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result alias for synchronizer operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
