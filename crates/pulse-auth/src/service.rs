//! Public authentication endpoints.
//!
//! These calls carry no bearer token. They share the HTTP client with the
//! refresh coordinator so the refresh cookie set at login is reused.

use pulse_core::{ApiResponse, AuthTokens, AuthUser, UserId};
use pulse_settings::join_url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::error_message;
use crate::errors::AuthError;

/// `POST /auth/register` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    /// Requested login name.
    pub username: String,
    /// Contact email; receives the OTP.
    pub email: String,
    /// Password.
    pub password: String,
    /// Password confirmation.
    pub confirm_password: String,
    /// Display name.
    pub full_name: String,
}

/// `POST /auth/register` result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResult {
    /// Registered email.
    pub email: String,
    /// Whether the email is already verified.
    pub verified: bool,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: String,
}

/// `POST /auth/login` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginPayload {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

/// `POST /auth/verify-otp` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyOtpPayload {
    /// Email the code was sent to.
    pub email: String,
    /// One-time code.
    pub otp: String,
}

/// Third-party identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    /// Facebook login.
    Facebook,
    /// Google login.
    Google,
}

/// `POST /auth/oauth/login` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthLoginRequest {
    /// Provider that issued `access_token`.
    pub provider: OAuthProvider,
    /// Provider access token.
    pub access_token: String,
}

/// Tokens returned by a login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginTokens {
    /// Bearer token.
    pub access_token: String,
    /// Refresh token, when echoed in the body. The cookie is authoritative.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Login result: identity plus tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    /// Account ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Authorization role.
    pub role: String,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Issued tokens.
    pub token: LoginTokens,
}

impl LoginResult {
    /// Convert into a session. The refresh token stays in the cookie store.
    pub fn into_auth_user(self) -> AuthUser {
        AuthUser {
            id: self.id,
            username: self.username,
            role: self.role,
            email: self.email,
            full_name: self.full_name,
            avatar: self.avatar,
            tokens: AuthTokens {
                access_token: self.token.access_token,
                expires_in: self.token.expires_in,
            },
        }
    }
}

/// Client for the public `/auth/*` endpoints.
#[derive(Clone)]
pub struct AuthService {
    http: reqwest::Client,
    base_url: String,
}

impl AuthService {
    /// Create a service rooted at `base_url`.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Create an account.
    #[tracing::instrument(skip_all, fields(username = %payload.username))]
    pub async fn register(
        &self,
        payload: &RegisterPayload,
    ) -> Result<ApiResponse<RegisterResult>, AuthError> {
        self.post("/auth/register", payload).await
    }

    /// Sign in with username and password.
    #[tracing::instrument(skip_all, fields(username = %payload.username))]
    pub async fn login(
        &self,
        payload: &LoginPayload,
    ) -> Result<ApiResponse<LoginResult>, AuthError> {
        self.post("/auth/login", payload).await
    }

    /// Confirm a registration with the emailed code.
    #[tracing::instrument(skip_all)]
    pub async fn verify_otp(
        &self,
        payload: &VerifyOtpPayload,
    ) -> Result<ApiResponse<Value>, AuthError> {
        self.post("/auth/verify-otp", payload).await
    }

    /// Sign in with a third-party provider token.
    #[tracing::instrument(skip_all, fields(provider = ?request.provider))]
    pub async fn oauth_login(
        &self,
        request: &OAuthLoginRequest,
    ) -> Result<ApiResponse<LoginResult>, AuthError> {
        self.post("/auth/oauth/login", request).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, AuthError> {
        let resp = self
            .http
            .post(join_url(&self.base_url, path))
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let message = error_message(resp).await;
            tracing::warn!(status = status.as_u16(), %message, "auth request rejected");
            return Err(AuthError::Status {
                status: status.as_u16(),
                message,
            });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
