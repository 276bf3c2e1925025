//! Authenticated request client.
//!
//! Attaches the current bearer token to every call. A 401 triggers one
//! refresh-and-retry; a second 401 is returned to the caller.

use std::sync::Arc;

use pulse_session::SessionStore;
use pulse_settings::join_url;
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::AuthError;
use crate::refresh::RefreshCoordinator;

/// Build the HTTP client shared by public, authenticated and refresh calls.
///
/// The cookie store carries the refresh credential set by the login
/// endpoints.
pub fn build_http_client() -> Result<reqwest::Client, AuthError> {
    let client = reqwest::Client::builder().cookie_store(true).build()?;
    Ok(client)
}

/// Turn a non-success response into [`AuthError::Status`].
pub(crate) async fn check_status(resp: Response) -> Result<Response, AuthError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(AuthError::Status {
        status: status.as_u16(),
        message: error_message(resp).await,
    })
}

/// Prefer the envelope's `message`, falling back to the raw body.
pub(crate) async fn error_message(resp: Response) -> String {
    let text = resp.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or(text)
}

/// HTTP client for endpoints that require a session.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    refresher: RefreshCoordinator,
}

impl ApiClient {
    /// Create a client rooted at `base_url`.
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        refresher: RefreshCoordinator,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            session,
            refresher,
        }
    }

    /// Base URL all paths are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Session store the bearer token is read from.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Refresh coordinator used on 401.
    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    /// Send a request, refreshing and retrying once on 401.
    #[tracing::instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, AuthError> {
        let sent_token = self.session.access_token();
        let resp = self
            .send(method.clone(), path, body, sent_token.as_deref())
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp).await;
        }

        let token = match self.session.access_token() {
            Some(current) if sent_token.as_deref() != Some(current.as_str()) => {
                debug!("token changed while request was in flight, retrying");
                current
            }
            _ => {
                debug!("received 401, refreshing token");
                self.refresher.refresh().await?
            }
        };

        let retry = self.send(method, path, body, Some(&token)).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            let status = retry.status().as_u16();
            warn!(status, "still unauthorized after refresh");
            return Err(AuthError::Unauthorized {
                status,
                message: error_message(retry).await,
            });
        }
        check_status(retry).await
    }

    /// Send a request and decode the JSON response.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, AuthError> {
        let resp = self.request(method, path, body).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `GET` and decode.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        self.request_json(Method::GET, path, None).await
    }

    /// `POST` a serializable body and decode.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        let value = serde_json::to_value(body)?;
        self.request_json(Method::POST, path, Some(&value)).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Response, AuthError> {
        let mut req = self
            .http
            .request(method, join_url(&self.base_url, path))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
