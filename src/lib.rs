//! # ebank-session
//!
//! Client-side authentication session layer for the e-banking backend.
//!
//! The crate keeps the process's notion of "who is signed in": it exchanges
//! credentials for a JWT against `/auth`, persists the token and user across
//! restarts, refreshes the token shortly before it expires, and publishes
//! every transition to observers. Route guards and an outbound request
//! interceptor read the same session state.
//!
//! Entry point is [`AuthGateway`], created once and cloned into every
//! consumer.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod interceptor;
pub mod models;
pub mod refresh;
pub mod session;
pub mod storage;
pub mod token;

#[cfg(test)]
mod test_helpers;

pub use api::{AuthApi, HttpAuthApi};
pub use config::SessionConfig;
pub use error::{AuthError, ConfigError, StorageError};
pub use gateway::AuthGateway;
pub use guard::{GuardDecision, LogNavigator, Navigator, Route, RouteGuard};
pub use interceptor::AuthorizedClient;
pub use models::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, User};
pub use session::{SessionHolder, SessionPhase, SessionState, Subscription};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, TokenStore};
