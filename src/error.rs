//! Auth error taxonomy and the user-facing messages derived from it.
//!
//! ERROR HANDLING
//! ==============
//! Every failure is recovered locally: the gateway turns an `AuthError` into
//! a message via [`AuthError::user_message`] and stores it in the session
//! state. Stale client state (`TokenDecode`, `CorruptedPersistedUser`) is
//! healed silently and never reaches the UI.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

pub const MSG_INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const MSG_ACCESS_DENIED: &str = "Access denied";
pub const MSG_UNREACHABLE: &str = "Unable to connect to server";
pub const MSG_GENERIC: &str = "An error occurred during authentication";
pub const MSG_NO_TOKEN: &str = "No token available";

/// Errors produced by the auth gateway and its transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The backend answered 401 on an auth call.
    #[error("invalid credentials")]
    InvalidCredentials { message: Option<String> },

    /// The backend answered 403.
    #[error("access denied")]
    AccessDenied { message: Option<String> },

    /// The backend never answered (connect failure, timeout, DNS).
    #[error("backend unreachable: {0}")]
    NetworkUnreachable(String),

    /// Any other non-success status.
    #[error("backend rejected request: status {status}")]
    Rejected { status: u16, message: Option<String> },

    /// A bearer token could not be decoded.
    #[error("token decode failed: {0}")]
    TokenDecode(String),

    /// Refresh was requested with no persisted token.
    #[error("no token available")]
    NoToken,

    /// The session was ended while a refresh was in flight; its result was
    /// discarded.
    #[error("session ended while refresh was in flight")]
    Superseded,

    /// The persisted user entry is not valid JSON.
    #[error("persisted user is corrupted: {0}")]
    CorruptedPersistedUser(String),

    /// A success response body could not be decoded.
    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl AuthError {
    /// Classify a non-success HTTP status, keeping any server-provided message.
    #[must_use]
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            0 => Self::NetworkUnreachable(message.unwrap_or_default()),
            401 => Self::InvalidCredentials { message },
            403 => Self::AccessDenied { message },
            _ => Self::Rejected { status, message },
        }
    }

    /// Message shown to the user. A server-provided message always wins.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials { message: Some(m) }
            | Self::AccessDenied { message: Some(m) }
            | Self::Rejected { message: Some(m), .. } => m.clone(),
            Self::InvalidCredentials { message: None } => MSG_INVALID_CREDENTIALS.to_owned(),
            Self::AccessDenied { message: None } => MSG_ACCESS_DENIED.to_owned(),
            Self::NetworkUnreachable(_) => MSG_UNREACHABLE.to_owned(),
            Self::NoToken => MSG_NO_TOKEN.to_owned(),
            Self::Rejected { message: None, .. }
            | Self::Superseded
            | Self::TokenDecode(_)
            | Self::CorruptedPersistedUser(_)
            | Self::InvalidResponse(_)
            | Self::HttpClientBuild(_) => MSG_GENERIC.to_owned(),
        }
    }

    /// Whether this error reflects stale client state that is healed
    /// silently instead of being shown to the user.
    #[must_use]
    pub fn is_self_healing(&self) -> bool {
        matches!(self, Self::TokenDecode(_) | Self::CorruptedPersistedUser(_))
    }
}

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised while building configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}
