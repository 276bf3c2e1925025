//! Deduplicated access-token refresh.
//!
//! At most one refresh request is in flight per coordinator. Callers that ask
//! for a refresh while one is running join it and receive the same outcome.
//! The in-flight slot is filled before the first await and emptied inside the
//! shared future once it settles, so a caller arriving after settlement
//! starts a fresh refresh.
//!
//! The refresh credential is the cookie held by the shared HTTP client's
//! cookie store; no body is sent.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use pulse_core::{ApiResponse, TokenUpdate};
use pulse_session::SessionStore;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::RefreshError;
use crate::signal::ReauthSignal;

type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// `data` payload of a refresh response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

struct Inner {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
    session: Arc<SessionStore>,
    signal: ReauthSignal,
    in_flight: Mutex<Option<SharedRefresh>>,
}

/// Coordinates token refreshes for one session store.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    /// Create a coordinator posting to `url`.
    ///
    /// `http` should be the client whose cookie store holds the refresh
    /// credential.
    pub fn new(
        http: reqwest::Client,
        url: impl Into<String>,
        timeout: Duration,
        session: Arc<SessionStore>,
        signal: ReauthSignal,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                url: url.into(),
                timeout,
                session,
                signal,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Signal raised when a refresh fails.
    pub fn reauth_signal(&self) -> &ReauthSignal {
        &self.inner.signal
    }

    /// Whether a refresh is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Obtain a new access token, joining an in-flight refresh if one exists.
    ///
    /// On success the session's tokens are updated before any caller sees the
    /// token. On failure the session is cleared and the re-auth signal is
    /// raised once, whatever the number of joined callers.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        let shared = {
            let mut slot = self.inner.in_flight.lock();
            if let Some(existing) = slot.as_ref() {
                debug!("joining in-flight token refresh");
                existing.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let fut: BoxFuture<'static, Result<String, RefreshError>> =
                    async move { inner.run().await }.boxed();
                let shared = fut.shared();
                *slot = Some(shared.clone());
                shared
            }
        };
        shared.await
    }
}

impl Inner {
    async fn run(self: Arc<Self>) -> Result<String, RefreshError> {
        info!("refreshing access token");
        let result = match tokio::time::timeout(self.timeout, self.call()).await {
            Ok(result) => result,
            Err(_) => Err(RefreshError::TimedOut(self.timeout)),
        };

        let result = match result {
            Ok((token, expires_in)) => {
                let update = TokenUpdate::access_token(token.clone()).with_expires_in(expires_in);
                if let Err(e) = self.session.update_tokens(&update) {
                    warn!("failed to store refreshed token: {e}");
                }
                info!(expires_in, "access token refreshed");
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, clearing session");
                if let Err(clear_err) = self.session.clear() {
                    warn!("failed to clear session: {clear_err}");
                }
                self.signal.raise();
                Err(e)
            }
        };

        let _ = self.in_flight.lock().take();
        result
    }

    #[tracing::instrument(skip_all)]
    async fn call(&self) -> Result<(String, Option<i64>), RefreshError> {
        let resp = self
            .http
            .post(&self.url)
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RefreshError::Http {
                status,
                message: text,
            });
        }

        let body: ApiResponse<RefreshData> = resp
            .json()
            .await
            .map_err(|e| RefreshError::InvalidPayload(e.to_string()))?;
        if !body.success {
            return Err(RefreshError::InvalidPayload(body.message));
        }
        let Some(data) = body.data else {
            return Err(RefreshError::InvalidPayload("missing data".into()));
        };
        match data.access_token {
            Some(token) if !token.is_empty() => Ok((token, data.expires_in)),
            _ => Err(RefreshError::InvalidPayload("missing accessToken".into())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
