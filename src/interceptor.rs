//! Outbound request interceptor.
//!
//! `AuthorizedClient` wraps a `reqwest::Client` for calls to protected
//! backend resources. Requests outside `/auth/` carry the session's bearer
//! token; a 401 on such a request ends the session.

#[cfg(test)]
#[path = "interceptor_test.rs"]
mod interceptor_test;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::api::classify_send_error;
use crate::error::AuthError;
use crate::gateway::AuthGateway;

/// URL fragment identifying the auth endpoints, which never carry a token.
const AUTH_PATH_FRAGMENT: &str = "/auth/";

#[derive(Clone)]
pub struct AuthorizedClient {
    http: reqwest::Client,
    gateway: AuthGateway,
}

impl AuthorizedClient {
    #[must_use]
    pub fn new(http: reqwest::Client, gateway: AuthGateway) -> Self {
        Self { http, gateway }
    }

    /// Start a request. Authorization is applied by [`AuthorizedClient::send`].
    #[must_use]
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url)
    }

    #[must_use]
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    #[must_use]
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Build and send `builder` through the interceptor.
    ///
    /// # Errors
    ///
    /// See [`AuthorizedClient::execute`].
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, AuthError> {
        let request = builder.build().map_err(classify_send_error)?;
        self.execute(request).await
    }

    /// Attach the bearer token when applicable, send, and log out on a 401
    /// to an authorized request. The response is returned unchanged, 401
    /// included.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NetworkUnreachable`] when no response arrives.
    pub async fn execute(&self, mut request: Request) -> Result<Response, AuthError> {
        let authorized = attach_bearer(&mut request, self.gateway.token().as_deref());
        let url = request.url().to_string();
        let response = self.http.execute(request).await.map_err(classify_send_error)?;

        if forces_logout(authorized, response.status()) {
            warn!(%url, "authorized request rejected with 401; ending session");
            self.gateway.logout();
        }
        Ok(response)
    }
}

// =============================================================================
// DECISIONS
// =============================================================================

fn should_authorize(url: &str) -> bool {
    !url.contains(AUTH_PATH_FRAGMENT)
}

/// Insert `Authorization: Bearer <token>` unless the request targets the auth
/// endpoints or no token is held. Returns whether the header was attached.
fn attach_bearer(request: &mut Request, token: Option<&str>) -> bool {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return false;
    };
    if !should_authorize(request.url().as_str()) {
        return false;
    }
    match HeaderValue::from_str(&format!("Bearer {token}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
            true
        }
        Err(e) => {
            debug!(error = %e, "token is not a valid header value; sending unauthenticated");
            false
        }
    }
}

fn forces_logout(authorized: bool, status: StatusCode) -> bool {
    authorized && status == StatusCode::UNAUTHORIZED
}
