//! Session store error types.

/// Errors that can occur while persisting or watching the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file watcher could not be created or attached.
    #[error("session watcher error: {0}")]
    Watch(#[from] notify::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
