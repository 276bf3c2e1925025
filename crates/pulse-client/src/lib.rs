//! # pulse-client
//!
//! One handle over the Pulse client stack.
//!
//! [`PulseClient`] wires the session store, the refresh coordinator, the
//! authenticated API client and the realtime connection manager from a single
//! [`PulseSettings`]. Login persists the session; logout closes the realtime
//! connection and clears it.

#![deny(unsafe_code)]

pub mod chat;
pub mod errors;

use std::sync::Arc;

use pulse_auth::{ApiClient, AuthService, LoginPayload, OAuthLoginRequest, ReauthSignal};
use pulse_core::{ApiResponse, AuthUser};
use pulse_realtime::{ConnectedCallback, ConnectionManager, Connector, ErrorCallback, WsConnector};
use pulse_session::{SessionFileWatcher, SessionStore};
use pulse_settings::{LoggingSettings, PulseSettings};
use tracing::{info, warn};

pub use chat::{ChatService, Conversation, CreateRoomRequest, UserSearchResult};
pub use errors::ClientError;

/// Install the global tracing subscriber described by `settings`.
pub fn init_logging(settings: &LoggingSettings) {
    if settings.json {
        pulse_core::logging::init_json_subscriber(&settings.level);
    } else {
        pulse_core::logging::init_subscriber(&settings.level);
    }
}

/// The assembled client.
pub struct PulseClient {
    settings: PulseSettings,
    session: Arc<SessionStore>,
    api: ApiClient,
    auth: AuthService,
    chat: ChatService,
    realtime: ConnectionManager,
    _watcher: Option<SessionFileWatcher>,
}

impl PulseClient {
    /// Load settings from `~/.pulse/settings.json` and the environment, then
    /// build the client.
    pub fn load() -> Result<Self, ClientError> {
        let settings = pulse_settings::load_settings()?;
        Self::from_settings(settings)
    }

    /// Build a client that reaches the broker over WebSocket.
    pub fn from_settings(settings: PulseSettings) -> Result<Self, ClientError> {
        Self::with_connector(settings, Arc::new(WsConnector::new()))
    }

    /// Build a client over a custom realtime transport.
    pub fn with_connector(
        settings: PulseSettings,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ClientError> {
        let data_dir = settings.session.resolved_data_dir();
        let session = Arc::new(SessionStore::new(&data_dir, settings.session.key.clone()));

        let watcher = if settings.session.watch_file {
            match SessionFileWatcher::spawn(Arc::clone(&session)) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!(error = %e, "session file watch unavailable");
                    None
                }
            }
        } else {
            None
        };

        let (api, auth) = pulse_auth::from_settings(&settings.api, Arc::clone(&session))?;
        let chat = ChatService::new(api.clone());
        let realtime = ConnectionManager::new(settings.realtime.clone(), connector)
            .with_session(Arc::clone(&session));

        info!(
            base_url = %settings.api.base_url,
            realtime_url = %settings.realtime.url,
            data_dir = %data_dir.display(),
            "pulse client ready"
        );
        Ok(Self {
            settings,
            session,
            api,
            auth,
            chat,
            realtime,
            _watcher: watcher,
        })
    }

    /// Sign in with username and password and persist the session.
    ///
    /// `remember_me` keeps the session on disk across restarts.
    #[tracing::instrument(skip_all, fields(username = %payload.username))]
    pub async fn login(
        &self,
        payload: &LoginPayload,
        remember_me: bool,
    ) -> Result<AuthUser, ClientError> {
        let resp = self.auth.login(payload).await?;
        self.establish(resp, remember_me)
    }

    /// Sign in with a third-party provider token and persist the session.
    #[tracing::instrument(skip_all, fields(provider = ?request.provider))]
    pub async fn oauth_login(
        &self,
        request: &OAuthLoginRequest,
        remember_me: bool,
    ) -> Result<AuthUser, ClientError> {
        let resp = self.auth.oauth_login(request).await?;
        self.establish(resp, remember_me)
    }

    fn establish(
        &self,
        resp: ApiResponse<pulse_auth::LoginResult>,
        remember_me: bool,
    ) -> Result<AuthUser, ClientError> {
        if !resp.success {
            return Err(ClientError::Rejected(resp.message));
        }
        let Some(result) = resp.data else {
            return Err(ClientError::Rejected(resp.message));
        };
        let user = result.into_auth_user();
        self.session.persist(&user, remember_me)?;
        info!(user_id = %user.id, remember_me, "signed in");
        Ok(user)
    }

    /// Close the realtime connection and clear the session.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.realtime.disconnect();
        self.session.clear()?;
        info!("signed out");
        Ok(())
    }

    /// Start the realtime connection with the current session's token.
    pub fn connect_realtime(
        &self,
        on_connected: Option<ConnectedCallback>,
        on_error: Option<ErrorCallback>,
    ) {
        self.realtime.connect(on_connected, on_error);
    }

    /// Signed-in user, if any.
    pub fn current_user(&self) -> Option<AuthUser> {
        self.session.get()
    }

    /// Raised whenever a refresh fails and the user must sign in again.
    pub fn reauth_signal(&self) -> &ReauthSignal {
        self.api.refresher().reauth_signal()
    }

    /// Settings the client was built from.
    pub fn settings(&self) -> &PulseSettings {
        &self.settings
    }

    /// Session store.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Authenticated API client.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Public auth endpoints.
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Chat REST endpoints.
    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    /// Realtime connection.
    pub fn realtime(&self) -> &ConnectionManager {
        &self.realtime
    }
}
