//! Backend `/auth` transport.
//!
//! `AuthApi` is the seam between the gateway and the network so the session
//! lifecycle can be exercised without a server. `HttpAuthApi` is the
//! `reqwest` implementation; body parsing lives in pure functions.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::{HttpTimeouts, SessionConfig};
use crate::error::AuthError;
use crate::models::{LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, RegisterResponse};

/// Calls the backend auth endpoints.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/login`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] classified from the HTTP status, or
    /// `NetworkUnreachable` when no response arrives.
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError>;

    /// `POST /auth/register`.
    ///
    /// # Errors
    ///
    /// Same classification as [`AuthApi::login`].
    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, AuthError>;

    /// `POST /auth/refresh` with the current token in the body.
    ///
    /// # Errors
    ///
    /// Same classification as [`AuthApi::login`].
    async fn refresh(&self, token: &str) -> Result<LoginResponse, AuthError>;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpAuthApi {
    http: reqwest::Client,
    auth_url: String,
}

impl HttpAuthApi {
    /// Build a client rooted at `auth_url` (e.g. `http://localhost:8080/auth`).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HttpClientBuild`] if the TLS backend fails to
    /// initialize.
    pub fn new(auth_url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| AuthError::HttpClientBuild(e.to_string()))?;
        let auth_url = auth_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, auth_url })
    }

    /// # Errors
    ///
    /// See [`HttpAuthApi::new`].
    pub fn from_config(config: &SessionConfig) -> Result<Self, AuthError> {
        Self::new(config.auth_url(), config.timeouts)
    }

    #[must_use]
    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, AuthError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = endpoint_url(&self.auth_url, endpoint);
        let response = self.http.post(&url).json(body).send().await.map_err(classify_send_error)?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::NetworkUnreachable(e.to_string()))?;

        if !(200..300).contains(&status) {
            tracing::debug!(%url, status, "auth endpoint rejected request");
            return Err(error_from_response(status, &text));
        }
        parse_body(&text)
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        self.post("login", request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, AuthError> {
        self.post("register", request).await
    }

    async fn refresh(&self, token: &str) -> Result<LoginResponse, AuthError> {
        self.post("refresh", &RefreshRequest { token }).await
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn endpoint_url(auth_url: &str, endpoint: &str) -> String {
    format!("{auth_url}/{endpoint}")
}

pub(crate) fn classify_send_error(e: reqwest::Error) -> AuthError {
    if e.is_builder() {
        AuthError::HttpClientBuild(e.to_string())
    } else {
        AuthError::NetworkUnreachable(e.to_string())
    }
}

/// The `message` field of an error body, if it carries a non-empty one.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
}

fn error_from_response(status: u16, body: &str) -> AuthError {
    AuthError::from_status(status, server_message(body))
}

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, AuthError> {
    serde_json::from_str(text).map_err(|e| AuthError::InvalidResponse(e.to_string()))
}
