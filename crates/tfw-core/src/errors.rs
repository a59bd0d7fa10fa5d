use std::path::PathBuf;

/// Core error type for the forwarder.
///
/// Adapter crates map their specific errors into this type so command handlers
/// can report failures consistently. Per-message delivery failures are not part
/// of this enum; see [`crate::transport::DeliveryError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("no forwarding progress has been recorded yet")]
    NoCursor,

    #[error("a forwarding job is already running")]
    AlreadyRunning,

    #[error("failed to persist cursor to {path}: {reason}")]
    CursorPersistence { path: PathBuf, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
