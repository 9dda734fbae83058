//! Persisted token + user record.
//!
//! The token and the serialized user live under two independent keys. Loads
//! never fail; malformed or sentinel entries read as absent, and a corrupted
//! user entry is removed on sight.

#[cfg(test)]
#[path = "token_store_test.rs"]
mod token_store_test;

use std::sync::Arc;

use tracing::warn;

use super::KeyValueStorage;
use crate::error::{AuthError, StorageError};
use crate::models::User;
use crate::token::is_sentinel;

pub const TOKEN_KEY: &str = "e-banking-token";
pub const USER_KEY: &str = "e-banking-user";

/// Sole reader/writer of the persisted session keys.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl TokenStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Persist token then user.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if either write fails.
    pub fn save(&self, token: &str, user: &User) -> Result<(), StorageError> {
        let user_json = serde_json::to_string(user)?;
        self.storage.set(TOKEN_KEY, token)?;
        self.storage.set(USER_KEY, &user_json)
    }

    #[must_use]
    pub fn load_token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).filter(|raw| !is_sentinel(raw))
    }

    #[must_use]
    pub fn load_user(&self) -> Option<User> {
        let raw = self.storage.get(USER_KEY).filter(|raw| !is_sentinel(raw))?;
        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                let err = AuthError::CorruptedPersistedUser(e.to_string());
                warn!(error = %err, "clearing stored user");
                if let Err(e) = self.storage.remove(USER_KEY) {
                    warn!(error = %e, "failed to clear corrupted user entry");
                }
                None
            }
        }
    }

    /// Remove both keys. Both removals are attempted even if the first fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`StorageError`] encountered.
    pub fn clear(&self) -> Result<(), StorageError> {
        let token = self.storage.remove(TOKEN_KEY);
        let user = self.storage.remove(USER_KEY);
        token.and(user)
    }
}
