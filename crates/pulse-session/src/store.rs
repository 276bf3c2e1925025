//! The session store.
//!
//! Holds at most one [`AuthUser`]. A session persisted with
//! `remember_me = true` lives in the durable file and survives restarts; with
//! `remember_me = false` it lives only in process memory. Reads are served
//! from an in-memory cache that is filled from the durable file on first use.
//!
//! All writes go through [`SessionStore::persist`],
//! [`SessionStore::update_tokens`] and [`SessionStore::clear`], and each one
//! publishes a [`SessionChange`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use pulse_core::{AuthUser, TokenUpdate};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::broadcast::{ChangeOrigin, ChannelBroadcast, SessionBroadcast, SessionChange};
use crate::errors::SessionError;
use crate::storage;

/// Where the current session is held.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Persistence {
    /// Session file on disk.
    Durable,
    /// Process memory only.
    Ephemeral,
}

#[derive(Default)]
struct State {
    /// Current session, if any.
    current: Option<AuthUser>,
    /// Where `current` lives.
    scope: Option<Persistence>,
    /// Whether the durable file has been read into `current`.
    loaded: bool,
    /// Exact contents of the durable file as last written or read by us.
    last_durable: Option<String>,
}

/// Session store shared by the request client and the realtime layer.
pub struct SessionStore {
    key: String,
    path: PathBuf,
    state: Mutex<State>,
    broadcast: Arc<dyn SessionBroadcast>,
}

impl SessionStore {
    /// Create a store over `data_dir` with an in-process broadcast channel.
    pub fn new(data_dir: &Path, key: impl Into<String>) -> Self {
        Self::with_broadcast(data_dir, key, Arc::new(ChannelBroadcast::new()))
    }

    /// Create a store with a custom broadcast mechanism.
    pub fn with_broadcast(
        data_dir: &Path,
        key: impl Into<String>,
        broadcast: Arc<dyn SessionBroadcast>,
    ) -> Self {
        Self {
            key: key.into(),
            path: storage::session_file_path(data_dir),
            state: Mutex::new(State::default()),
            broadcast,
        }
    }

    /// Session key used in change notifications.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path of the durable session file.
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Current session, if any.
    pub fn get(&self) -> Option<AuthUser> {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state);
        state.current.clone()
    }

    /// Current access token, if a session exists.
    pub fn access_token(&self) -> Option<String> {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state);
        state.current.as_ref().map(|u| u.tokens.access_token.clone())
    }

    /// Where the current session is held.
    pub fn persistence(&self) -> Option<Persistence> {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state);
        state.scope
    }

    /// Whether a session exists.
    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    /// Store a new session.
    ///
    /// `remember_me = true` writes the durable file; `false` keeps the session
    /// in memory and removes any durable file left by an earlier login.
    pub fn persist(&self, user: &AuthUser, remember_me: bool) -> Result<(), SessionError> {
        {
            let mut state = self.state.lock();
            if remember_me {
                let written = storage::save_session(&self.path, user)?;
                state.last_durable = Some(written);
                state.scope = Some(Persistence::Durable);
            } else {
                storage::remove_session(&self.path)?;
                state.last_durable = None;
                state.scope = Some(Persistence::Ephemeral);
            }
            state.current = Some(user.clone());
            state.loaded = true;
        }
        info!(user_id = %user.id, remember_me, "session persisted");
        self.publish(Some(user), ChangeOrigin::Local);
        Ok(())
    }

    /// Replace token fields of the existing session, preserving identity.
    ///
    /// No-op when there is no session.
    pub fn update_tokens(&self, update: &TokenUpdate) -> Result<(), SessionError> {
        let updated = {
            let mut state = self.state.lock();
            self.ensure_loaded(&mut state);
            let Some(mut user) = state.current.clone() else {
                debug!("token update ignored, no active session");
                return Ok(());
            };
            update.apply(&mut user.tokens);
            if state.scope == Some(Persistence::Durable) {
                let written = storage::save_session(&self.path, &user)?;
                state.last_durable = Some(written);
            }
            state.current = Some(user.clone());
            user
        };
        debug!(user_id = %updated.id, "session tokens updated");
        self.publish(Some(&updated), ChangeOrigin::Local);
        Ok(())
    }

    /// Remove the session from every storage layer.
    pub fn clear(&self) -> Result<(), SessionError> {
        let had_session = {
            let mut state = self.state.lock();
            storage::remove_session(&self.path)?;
            let had = state.current.is_some();
            *state = State {
                loaded: true,
                ..State::default()
            };
            had
        };
        if had_session {
            info!("session cleared");
        }
        self.publish(None, ChangeOrigin::Local);
        Ok(())
    }

    /// Subscribe to session changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.broadcast.subscribe()
    }

    /// Re-read the durable file after an external modification.
    ///
    /// Publishes an [`ChangeOrigin::External`] change when the file contents
    /// differ from what this store last wrote or read. An ephemeral session
    /// is left alone unless another context persisted a durable one. A file
    /// that exists but does not parse, such as one caught mid-write, is not a
    /// logout and changes nothing.
    /// Returns whether a change was published.
    pub fn reload_from_disk(&self) -> bool {
        let raw = storage::read_raw(&self.path);
        let new_session = {
            let mut state = self.state.lock();
            if raw == state.last_durable {
                return false;
            }
            let parsed = match raw.as_deref().map(storage::parse_stored) {
                Some(None) => {
                    debug!("session file unreadable, keeping current session");
                    return false;
                }
                other => other.flatten(),
            };
            match (&parsed, state.scope) {
                (Some(user), _) => {
                    state.current = Some(user.clone());
                    state.scope = Some(Persistence::Durable);
                }
                (None, Some(Persistence::Durable)) => {
                    state.current = None;
                    state.scope = None;
                }
                (None, _) => {
                    state.last_durable = raw;
                    return false;
                }
            }
            state.last_durable = raw;
            state.loaded = true;
            parsed
        };
        debug!(present = new_session.is_some(), "session changed externally");
        self.publish(new_session.as_ref(), ChangeOrigin::External);
        true
    }

    fn ensure_loaded(&self, state: &mut State) {
        if state.loaded {
            return;
        }
        state.loaded = true;
        let raw = storage::read_raw(&self.path);
        if let Some(user) = raw.as_deref().and_then(storage::parse_stored) {
            debug!(user_id = %user.id, "session restored from disk");
            state.current = Some(user);
            state.scope = Some(Persistence::Durable);
        }
        state.last_durable = raw;
    }

    fn publish(&self, user: Option<&AuthUser>, origin: ChangeOrigin) {
        let new_value = match user.map(serde_json::to_string).transpose() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("failed to serialize session change: {e}");
                return;
            }
        };
        self.broadcast.publish(SessionChange {
            key: self.key.clone(),
            new_value,
            origin,
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
