//! Session state holder.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `SessionHolder` exists per application root. The auth gateway is its
//! only writer; route guards, the request interceptor and UI bindings read
//! snapshots or subscribe to transitions.
//!
//! DESIGN
//! ======
//! The current value lives in a `tokio::sync::watch` sender so async
//! consumers can await changes. Synchronous observers register callbacks
//! that receive every transition, and each new observer is handed the
//! current state immediately on subscribe.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;

use crate::models::User;

// =============================================================================
// STATE
// =============================================================================

/// Authentication status for the current process.
///
/// `is_authenticated` implies both `user` and `token` are present;
/// [`SessionHolder::update`] enforces this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub token: Option<String>,
    /// A login/register/refresh call is in flight.
    pub loading: bool,
    /// Message from the last failed call, cleared when the next one starts.
    pub error: Option<String>,
}

/// Collapsed view of [`SessionState`] used by guards and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Authenticated,
}

impl SessionState {
    #[must_use]
    pub fn authenticated(user: User, token: String) -> Self {
        Self { is_authenticated: true, user: Some(user), token: Some(token), loading: false, error: None }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.is_authenticated { SessionPhase::Authenticated } else { SessionPhase::Unauthenticated }
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_role(role))
    }

    fn satisfies_invariant(&self) -> bool {
        !self.is_authenticated || (self.user.is_some() && self.token.is_some())
    }
}

// =============================================================================
// HOLDER
// =============================================================================

type Listener = Arc<dyn Fn(&SessionState) + Send + Sync>;

/// Shared, cloneable handle to the session state.
#[derive(Clone)]
pub struct SessionHolder {
    inner: Arc<HolderInner>,
}

struct HolderInner {
    tx: watch::Sender<SessionState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl HolderInner {
    fn detach(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(listener_id, _)| *listener_id != id);
    }
}

impl SessionHolder {
    #[must_use]
    pub fn new(initial: SessionState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { inner: Arc::new(HolderInner { tx, listeners: Mutex::new(Vec::new()), next_id: AtomicU64::new(0) }) }
    }

    /// Synchronous snapshot of the current state.
    #[must_use]
    pub fn current(&self) -> SessionState {
        self.inner.tx.borrow().clone()
    }

    /// Replace the state and notify every observer.
    ///
    /// An authenticated state missing its user or token is downgraded to
    /// unauthenticated before publishing.
    pub fn update(&self, mut next: SessionState) {
        if !next.satisfies_invariant() {
            tracing::warn!("authenticated state without user or token; publishing as unauthenticated");
            next.is_authenticated = false;
        }
        tracing::debug!(phase = ?next.phase(), loading = next.loading, error = ?next.error, "session state updated");
        self.inner.tx.send_replace(next.clone());

        // Callbacks run outside the lock so they may subscribe or read freely.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&next);
        }
    }

    /// Register `listener` for every future transition. It is called once
    /// right away with the current state. The listener stays attached until
    /// the returned [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        // Snapshot and registration share one critical section: any update
        // published after the snapshot finds the listener registered.
        let snapshot = {
            let mut listeners = self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.push((id, Arc::clone(&listener)));
            self.current()
        };
        listener(&snapshot);
        Subscription { holder: Arc::downgrade(&self.inner), id }
    }

    /// Async receiver with latest-value semantics. The receiver starts with
    /// the current state marked as seen.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.tx.subscribe()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for SessionHolder {
    fn default() -> Self {
        Self::new(SessionState::default())
    }
}

/// Handle returned by [`SessionHolder::subscribe`]. Dropping it detaches the
/// listener.
#[must_use = "dropping a Subscription immediately detaches its listener"]
pub struct Subscription {
    holder: Weak<HolderInner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(holder) = self.holder.upgrade() {
            holder.detach(self.id);
        }
    }
}
