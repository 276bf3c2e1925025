//! # pulse-session
//!
//! Single source of truth for the signed-in user's session.
//!
//! - [`SessionStore`]: durable (`remember_me`) or process-only persistence,
//!   token updates that keep identity fields, and full clear on logout
//! - [`SessionBroadcast`]: change notifications keyed by the session key
//! - [`SessionFileWatcher`]: picks up changes written by other processes
//!   sharing the data directory
//!
//! The durable file is `<data_dir>/session.json`, written with 0o600
//! permissions.

#![deny(unsafe_code)]

pub mod broadcast;
pub mod errors;
pub mod storage;
pub mod store;
pub mod watcher;

pub use broadcast::{ChangeOrigin, ChannelBroadcast, SessionBroadcast, SessionChange};
pub use errors::SessionError;
pub use store::{Persistence, SessionStore};
pub use watcher::SessionFileWatcher;
