//! # pulse-core
//!
//! Shared vocabulary for the Pulse chat client crates.
//!
//! - **IDs**: [`RoomId`] and [`UserId`] as integer newtypes so a room can
//!   never be passed where a user is expected
//! - **Session types**: [`AuthUser`] and [`AuthTokens`], the identity and
//!   credential material held for the signed-in user
//! - **Chat types**: [`ChatMessage`], the record carried by inbound frames
//! - **API envelope**: [`ApiResponse`], the `{success, message, data, status}`
//!   wrapper every REST endpoint returns
//! - **Logging**: subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod types;

pub use ids::{RoomId, UserId};
pub use types::{ApiResponse, AuthTokens, AuthUser, ChatMessage, TokenUpdate};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _room = RoomId::new(1);
        let _user = UserId::new(2);
        let _update = TokenUpdate::default();
    }
}
