//! Shared fixtures for unit tests: token minting, sample users, a scripted
//! backend and a navigator that records redirects.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::api::AuthApi;
use crate::error::AuthError;
use crate::guard::{Navigator, Route};
use crate::models::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, User};

// =============================================================================
// TOKENS & USERS
// =============================================================================

/// Mint an unsigned JWT carrying the given claims.
#[must_use]
pub fn make_token_with_claims(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Mint a token for `alice` expiring at `exp` (seconds since epoch).
#[must_use]
pub fn make_token(exp: i64) -> String {
    make_token_with_claims(&serde_json::json!({
        "sub": "1",
        "username": "alice",
        "roles": ["USER"],
        "iat": exp - 3600,
        "exp": exp
    }))
}

#[must_use]
pub fn sample_user(username: &str) -> User {
    User {
        id: 1,
        username: username.to_owned(),
        email: format!("{username}@bank.test"),
        first_name: "Test".to_owned(),
        last_name: "User".to_owned(),
        roles: BTreeSet::from(["USER".to_owned()]),
        created_at: None,
        updated_at: None,
    }
}

#[must_use]
pub fn login_response(token: &str, user: User) -> LoginResponse {
    LoginResponse { token: token.to_owned(), token_type: "Bearer".to_owned(), user, expires_in: 3600 }
}

// =============================================================================
// MOCK BACKEND
// =============================================================================

type Scripted<T> = Mutex<VecDeque<(Duration, Result<T, AuthError>)>>;

/// Backend double. Each endpoint pops scripted replies in order; an empty
/// script answers with a 500.
#[derive(Default)]
pub struct MockAuthApi {
    logins: Scripted<LoginResponse>,
    registers: Scripted<RegisterResponse>,
    refreshes: Scripted<LoginResponse>,
    pub login_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub refreshed_tokens: Mutex<Vec<String>>,
}

impl MockAuthApi {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_login(&self, reply: Result<LoginResponse, AuthError>) {
        self.logins.lock().unwrap().push_back((Duration::ZERO, reply));
    }

    pub fn push_register(&self, reply: Result<RegisterResponse, AuthError>) {
        self.registers.lock().unwrap().push_back((Duration::ZERO, reply));
    }

    pub fn push_refresh(&self, reply: Result<LoginResponse, AuthError>) {
        self.push_refresh_delayed(Duration::ZERO, reply);
    }

    /// Script a refresh reply that settles only after `delay`.
    pub fn push_refresh_delayed(&self, delay: Duration, reply: Result<LoginResponse, AuthError>) {
        self.refreshes.lock().unwrap().push_back((delay, reply));
    }

    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    async fn reply<T>(script: &Scripted<T>) -> Result<T, AuthError> {
        let next = script.lock().unwrap().pop_front();
        let Some((delay, reply)) = next else {
            return Err(AuthError::from_status(500, None));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

#[async_trait::async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Self::reply(&self.logins).await
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<RegisterResponse, AuthError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        Self::reply(&self.registers).await
    }

    async fn refresh(&self, token: &str) -> Result<LoginResponse, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshed_tokens.lock().unwrap().push(token.to_owned());
        Self::reply(&self.refreshes).await
    }
}

// =============================================================================
// NAVIGATOR
// =============================================================================

#[derive(Default)]
pub struct RecordingNavigator {
    pub routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn taken(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}
