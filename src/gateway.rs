//! Auth gateway: the single writer of session state.
//!
//! ARCHITECTURE
//! ============
//! `AuthGateway` is a cheap `Clone` handle created once by the application
//! root and handed to guards, the request interceptor and UI bindings. It
//! drives the backend through [`AuthApi`], persists results through
//! [`TokenStore`], publishes them on the [`SessionHolder`] and keeps the
//! [`RefreshScheduler`] armed for the current token.
//!
//! TRADE-OFFS
//! ==========
//! Calls are not serialized. Two refreshes in flight at once both write
//! their result, and whichever settles last wins.

#[cfg(test)]
#[path = "gateway_test.rs"]
mod gateway_test;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::{AuthApi, HttpAuthApi};
use crate::config::SessionConfig;
use crate::error::AuthError;
use crate::guard::{Navigator, Route};
use crate::models::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, User};
use crate::refresh::RefreshScheduler;
use crate::session::{SessionHolder, SessionState, Subscription};
use crate::storage::{FileStorage, TokenStore};
use crate::token;

#[derive(Clone)]
pub struct AuthGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    api: Arc<dyn AuthApi>,
    store: TokenStore,
    session: SessionHolder,
    scheduler: RefreshScheduler,
    navigator: Arc<dyn Navigator>,
    /// Bumped by every logout; an in-flight refresh that sees it change
    /// drops its result.
    epoch: AtomicU64,
}

impl Drop for GatewayInner {
    fn drop(&mut self) {
        self.scheduler.cancel();
    }
}

impl AuthGateway {
    /// Create the gateway and restore any valid persisted session.
    ///
    /// A persisted token and user that are both present and unexpired make
    /// the session authenticated and arm a refresh; anything else clears the
    /// store. Arming needs a tokio runtime; without one the restored session
    /// simply has no scheduled refresh.
    #[must_use]
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: TokenStore,
        navigator: Arc<dyn Navigator>,
        refresh_lead: Duration,
    ) -> Self {
        let gateway = Self {
            inner: Arc::new(GatewayInner {
                api,
                store,
                session: SessionHolder::default(),
                scheduler: RefreshScheduler::new(refresh_lead),
                navigator,
                epoch: AtomicU64::new(0),
            }),
        };
        gateway.restore();
        gateway
    }

    /// Gateway over HTTP and a file-backed store, both taken from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn from_config(config: &SessionConfig, navigator: Arc<dyn Navigator>) -> Result<Self, AuthError> {
        let api = Arc::new(HttpAuthApi::from_config(config)?);
        let store = TokenStore::new(Arc::new(FileStorage::new(&config.storage_path)));
        Ok(Self::new(api, store, navigator, config.refresh_lead))
    }

    fn restore(&self) {
        let store = &self.inner.store;
        match (store.load_token(), store.load_user()) {
            (Some(token), Some(user)) if token::is_valid(&token) => {
                info!(user = %user.username, "restored persisted session");
                self.inner.session.update(SessionState::authenticated(user, token.clone()));
                self.arm_refresh(&token);
            }
            _ => {
                debug!("no valid persisted session; clearing store");
                if let Err(e) = store.clear() {
                    warn!(error = %e, "failed to clear persisted session");
                }
            }
        }
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Exchange credentials for a token and authenticate the session.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport [`AuthError`]; its user message is
    /// also published as the session `error`.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        self.begin_call(true);
        let request = LoginRequest { username: username.to_owned(), password: password.to_owned() };
        match self.inner.api.login(&request).await {
            Ok(response) => {
                self.handle_auth_success(&response);
                info!(user = %response.user.username, expires_in = response.expires_in, "login succeeded");
                Ok(response)
            }
            Err(e) => {
                warn!(user = %username, error = %e, "login failed");
                self.handle_auth_error(&e);
                Err(e)
            }
        }
    }

    /// Create an account. Never authenticates the session.
    ///
    /// # Errors
    ///
    /// Same as [`AuthGateway::login`].
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, AuthError> {
        self.begin_call(true);
        match self.inner.api.register(request).await {
            Ok(response) => {
                let mut state = self.inner.session.current();
                state.loading = false;
                self.inner.session.update(state);
                info!(user = %response.user.username, "registration succeeded");
                Ok(response)
            }
            Err(e) => {
                warn!(user = %request.username, error = %e, "registration failed");
                self.handle_auth_error(&e);
                Err(e)
            }
        }
    }

    /// Drop the session: cancel the pending refresh, clear the store, reset
    /// state and send the user to login.
    pub fn logout(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.scheduler.cancel();
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "failed to clear persisted session");
        }
        self.inner.session.update(SessionState::default());
        self.inner.navigator.navigate(Route::Login { return_url: None });
        info!("logged out");
    }

    /// Exchange the persisted token for a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NoToken`] without touching state when nothing is
    /// persisted. Any backend failure logs the user out before returning.
    /// Returns [`AuthError::Superseded`] without touching state when the
    /// session was logged out while the call was in flight.
    pub async fn refresh(&self) -> Result<LoginResponse, AuthError> {
        let Some(current_token) = self.inner.store.load_token() else {
            debug!("refresh requested with no persisted token");
            return Err(AuthError::NoToken);
        };

        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        self.begin_call(false);
        let result = self.inner.api.refresh(&current_token).await;
        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!(succeeded = result.is_ok(), "session ended during refresh; discarding result");
            return Err(AuthError::Superseded);
        }

        match result {
            Ok(response) => {
                self.handle_auth_success(&response);
                info!(user = %response.user.username, expires_in = response.expires_in, "token refreshed");
                Ok(response)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed; logging out");
                self.logout();
                Err(e)
            }
        }
    }

    // =========================================================================
    // READERS
    // =========================================================================

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.session.current().is_authenticated
    }

    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.inner.session.current().user
    }

    /// In-memory bearer token of the current session.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.session.current().token
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.inner.session.current().has_role(role)
    }

    #[must_use]
    pub fn session(&self) -> &SessionHolder {
        &self.inner.session
    }

    /// Shorthand for [`SessionHolder::subscribe`].
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.inner.session.subscribe(listener)
    }

    /// When the pending proactive refresh will fire, if one is armed.
    #[must_use]
    pub fn refresh_deadline(&self) -> Option<tokio::time::Instant> {
        self.inner.scheduler.pending_deadline()
    }

    // =========================================================================
    // STATE TRANSITIONS
    // =========================================================================

    fn begin_call(&self, clear_error: bool) {
        let mut state = self.inner.session.current();
        state.loading = true;
        if clear_error {
            state.error = None;
        }
        self.inner.session.update(state);
    }

    fn handle_auth_success(&self, response: &LoginResponse) {
        if let Err(e) = self.inner.store.save(&response.token, &response.user) {
            warn!(error = %e, "failed to persist session; it will not survive a restart");
        }
        self.inner
            .session
            .update(SessionState::authenticated(response.user.clone(), response.token.clone()));
        self.arm_refresh(&response.token);
    }

    fn handle_auth_error(&self, error: &AuthError) {
        let mut state = self.inner.session.current();
        state.loading = false;
        if error.is_self_healing() {
            debug!(error = %error, "self-healing error kept out of session state");
        } else {
            state.error = Some(error.user_message());
        }
        self.inner.session.update(state);
    }

    fn arm_refresh(&self, token: &str) {
        self.inner
            .scheduler
            .arm(token, scheduled_refresh(Arc::downgrade(&self.inner)));
    }
}

/// Work performed when the refresh timer fires. Boxed so the refresh path
/// can re-arm itself without a recursive future type.
fn scheduled_refresh(inner: Weak<GatewayInner>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let gateway = AuthGateway { inner };
        if !gateway.is_authenticated() {
            debug!("session ended before scheduled refresh");
            return;
        }
        match gateway.refresh().await {
            Ok(_) => {}
            // Backend failures already logged out inside `refresh`.
            Err(AuthError::NoToken) => gateway.logout(),
            Err(e) => debug!(error = %e, "scheduled refresh ended the session"),
        }
    })
}
