//! Durable session file I/O.
//!
//! Reads and writes `<data_dir>/session.json` with secure file permissions
//! (0o600). Writes go to a temporary file in the same directory that is
//! renamed over the target, so readers never see a partial file. The file wraps the session in a versioned envelope so an
//! incompatible layout is ignored instead of misread.

use std::io::Write;
use std::path::{Path, PathBuf};

use pulse_core::AuthUser;
use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// Durable session file name.
pub const SESSION_FILE_NAME: &str = "session.json";

/// Current envelope version.
const STORAGE_VERSION: u32 = 1;

/// On-disk envelope around the session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    /// Envelope version.
    pub version: u32,
    /// The persisted session.
    pub session: AuthUser,
    /// RFC 3339 timestamp of the last write.
    pub saved_at: String,
}

/// Get the session file path under the given data directory.
pub fn session_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SESSION_FILE_NAME)
}

/// Read the raw file contents.
///
/// Returns `None` if the file doesn't exist or can't be read.
pub fn read_raw(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(d) => Some(d),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!("failed to read session file: {e}");
            None
        }
    }
}

/// Parse raw file contents into a session.
///
/// Returns `None` for invalid JSON or an unsupported version.
pub fn parse_stored(data: &str) -> Option<AuthUser> {
    match serde_json::from_str::<StoredSession>(data) {
        Ok(stored) if stored.version == STORAGE_VERSION => Some(stored.session),
        Ok(stored) => {
            tracing::warn!("unsupported session storage version: {}", stored.version);
            None
        }
        Err(e) => {
            tracing::warn!("failed to parse session file: {e}");
            None
        }
    }
}

#[cfg(test)]
fn load_session(path: &Path) -> Option<AuthUser> {
    parse_stored(&read_raw(path)?)
}

/// Save the session to file.
///
/// Creates parent directories if needed. Sets file permissions to 0o600 and
/// replaces the target atomically. Returns the exact contents written.
pub fn save_session(path: &Path, session: &AuthUser) -> Result<String, SessionError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let stored = StoredSession {
        version: STORAGE_VERSION,
        session: session.clone(),
        saved_at: chrono::Utc::now().to_rfc3339(),
    };
    let json = serde_json::to_string_pretty(&stored)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    let _ = tmp.persist(path).map_err(|e| SessionError::Io(e.error))?;
    Ok(json)
}

/// Delete the session file. Missing files are not an error.
pub fn remove_session(path: &Path) -> Result<(), SessionError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SessionError::Io(e)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
