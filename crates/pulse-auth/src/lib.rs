//! # pulse-auth
//!
//! HTTP access to the Pulse backend.
//!
//! - [`ApiClient`]: bearer-authenticated calls with a single
//!   refresh-and-retry on 401
//! - [`RefreshCoordinator`]: at most one refresh request in flight; joined
//!   callers share its outcome, failures clear the session and raise
//!   [`ReauthSignal`]
//! - [`AuthService`]: public register, login, OTP and OAuth endpoints
//!
//! All three share one `reqwest::Client` with a cookie store, which carries
//! the refresh credential.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod refresh;
pub mod service;
pub mod signal;

use std::sync::Arc;

use pulse_session::SessionStore;
use pulse_settings::ApiSettings;

pub use client::{ApiClient, build_http_client};
pub use errors::{AuthError, RefreshError};
pub use refresh::RefreshCoordinator;
pub use service::{
    AuthService, LoginPayload, LoginResult, LoginTokens, OAuthLoginRequest, OAuthProvider,
    RegisterPayload, RegisterResult, VerifyOtpPayload,
};
pub use signal::ReauthSignal;

/// Build the authenticated client, its refresh coordinator and the public
/// auth service over one shared HTTP client.
pub fn from_settings(
    settings: &ApiSettings,
    session: Arc<SessionStore>,
) -> Result<(ApiClient, AuthService), AuthError> {
    let http = build_http_client()?;
    let refresher = RefreshCoordinator::new(
        http.clone(),
        settings.refresh_url(),
        settings.refresh_timeout(),
        Arc::clone(&session),
        ReauthSignal::new(),
    );
    let client = ApiClient::new(http.clone(), settings.base_url.clone(), session, refresher);
    let service = AuthService::new(http, settings.base_url.clone());
    Ok((client, service))
}
