//! Cross-process session change detection.
//!
//! Watches the data directory for modifications to the session file made by
//! other processes sharing it, and feeds them back into the store through
//! [`SessionStore::reload_from_disk`]. Our own writes are filtered out there
//! by comparing file contents.

use std::path::Path;
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::errors::SessionError;
use crate::storage::SESSION_FILE_NAME;
use crate::store::SessionStore;

/// Keeps a filesystem watch on the session file alive. Dropping it stops the
/// watch.
pub struct SessionFileWatcher {
    _watcher: RecommendedWatcher,
}

impl SessionFileWatcher {
    /// Start watching the store's session file.
    pub fn spawn(store: Arc<SessionStore>) -> Result<Self, SessionError> {
        let path = store.file_path().to_path_buf();
        let Some(dir) = path.parent().map(Path::to_path_buf) else {
            return Err(SessionError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "session file has no parent directory",
            )));
        };
        std::fs::create_dir_all(&dir)?;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if !is_relevant(&event) {
                        return;
                    }
                    if store.reload_from_disk() {
                        debug!(kind = ?event.kind, "applied external session change");
                    }
                }
                Err(e) => warn!("session watcher error: {e}"),
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!(dir = %dir.display(), "watching session file");

        Ok(Self { _watcher: watcher })
    }
}

fn is_relevant(event: &Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p.file_name().is_some_and(|n| n == SESSION_FILE_NAME))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{ChangeOrigin, SessionChange};
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use pulse_core::{AuthTokens, AuthUser, UserId};
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::sync::broadcast;

    const KEY: &str = "pulse.auth.session";

    fn make_user(token: &str) -> AuthUser {
        AuthUser {
            id: UserId::new(4),
            username: "dana".into(),
            role: "USER".into(),
            email: None,
            full_name: None,
            avatar: None,
            tokens: AuthTokens::new(token),
        }
    }

    async fn next_external(rx: &mut broadcast::Receiver<SessionChange>) -> SessionChange {
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(change) if change.origin == ChangeOrigin::External => return change,
                    Ok(_) => {}
                    Err(e) => panic!("session channel failed: {e}"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("no external session change within 5s")
    }

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn session_file_writes_are_relevant() {
        assert!(is_relevant(&event(
            EventKind::Modify(ModifyKind::Any),
            "/data/session.json"
        )));
        assert!(is_relevant(&event(
            EventKind::Create(CreateKind::File),
            "/data/session.json"
        )));
    }

    #[test]
    fn other_files_and_reads_are_ignored() {
        assert!(!is_relevant(&event(
            EventKind::Modify(ModifyKind::Any),
            "/data/settings.json"
        )));
        assert!(!is_relevant(&event(
            EventKind::Access(AccessKind::Any),
            "/data/session.json"
        )));
    }

    #[test]
    fn spawn_creates_missing_data_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let data_dir = dir.path().join("nested");
        let store = Arc::new(SessionStore::new(&data_dir, "pulse.auth.session"));
        let _watcher = SessionFileWatcher::spawn(store).unwrap();
        assert!(data_dir.is_dir());
    }

    #[tokio::test]
    async fn writes_from_another_store_reach_subscribers() {
        let dir = tempfile::TempDir::new().unwrap();
        let ours = Arc::new(SessionStore::new(dir.path(), KEY));
        assert!(ours.get().is_none());
        let mut rx = ours.subscribe();
        let _watcher = SessionFileWatcher::spawn(Arc::clone(&ours)).unwrap();

        let theirs = SessionStore::new(dir.path(), KEY);
        theirs.persist(&make_user("tok-ext"), true).unwrap();

        let login = next_external(&mut rx).await;
        assert_eq!(login.key, KEY);
        assert_eq!(login.session().unwrap().tokens.access_token, "tok-ext");
        assert_eq!(ours.access_token().as_deref(), Some("tok-ext"));

        theirs.clear().unwrap();
        assert!(next_external(&mut rx).await.is_removal());
        assert!(ours.get().is_none());
    }
}
