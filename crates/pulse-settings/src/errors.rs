//! Settings errors.

use std::path::PathBuf;

/// Why settings could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not JSON, or its values do not fit the settings schema.
    #[error("invalid settings in {}: {source}", path.display())]
    Json {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is outside what the client accepts.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Settings key in camelCase dotted form, e.g. `realtime.url`.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl SettingsError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_names_the_key() {
        let err = SettingsError::invalid("realtime.reconnectDelayMs", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid value for realtime.reconnectDelayMs: must be positive"
        );
    }

    #[test]
    fn file_errors_name_the_path() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SettingsError::Json {
            path: PathBuf::from("/home/u/.pulse/settings.json"),
            source,
        };
        assert!(err.to_string().starts_with("invalid settings in /home/u/.pulse/settings.json"));
    }
}
