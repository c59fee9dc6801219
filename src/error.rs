use thiserror::Error;

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Failures of the local durable store. These are the only local errors that
/// reach callers; corruption is absorbed on read.
#[derive(Debug, Error)]
pub enum StorageError {
    /// `limit` is known for hosts with an explicit budget, `None` when the
    /// host only reported that it is full.
    #[error("Device storage full: writing \"{key}\" needs {needed} bytes")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: Option<usize>,
    },

    #[error("Host storage error: {message}")]
    Host {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to serialize collection: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
            source: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

/// Errors raised by a remote document or blob store. Never surfaced by the
/// facade: they become a [`FallbackReason`] and the operation completes locally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote store unavailable")]
    Unavailable,

    #[error("Remote connection lost")]
    Disconnected,

    #[error("Remote document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Remote store rejected the request: {0}")]
    Rejected(String),

    #[error("Remote transport error: {0}")]
    Transport(String),
}

// ---------------------------------------------------------------------------
// MediaError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("File could not be read: {0}")]
    Decode(#[source] image::ImageError),

    #[error("File could not be re-encoded: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),
}

// ---------------------------------------------------------------------------
// FallbackReason
// ---------------------------------------------------------------------------

/// Why an operation completed against the local store instead of the remote one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FallbackReason {
    /// The mode selector declined remote (offline, or no remote configured).
    #[error("remote unavailable")]
    RemoteUnavailable,

    /// A remote call was attempted and failed.
    #[error("remote operation failed: {0}")]
    RemoteFailed(#[source] RemoteError),
}

// ---------------------------------------------------------------------------
// Error — top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Short, actionable text suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Storage(StorageError::QuotaExceeded { .. }) => "device storage full",
            Self::Storage(_) => "device storage could not be written",
            Self::Media(_) => "file could not be read",
            Self::Config(_) => "the app is misconfigured",
        }
    }
}

/// Convenience alias — the default error type is [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
