//! Navigation guards and the navigator seam.
//!
//! SYSTEM CONTEXT
//! ==============
//! Protected views consult a guard before activation. Guards read a session
//! snapshot synchronously; when access is refused they name the route to
//! send the user to instead.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::sync::Arc;

use crate::gateway::AuthGateway;
use crate::session::SessionState;

/// Unauthenticated entry points the session layer can redirect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Login page, optionally carrying the URL to return to afterwards.
    Login { return_url: Option<String> },
    /// Shown to authenticated users lacking a required role.
    Unauthorized,
}

impl Route {
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::Login { .. } => "/login",
            Self::Unauthorized => "/unauthorized",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login { return_url: Some(url) } => write!(f, "/login?returnUrl={url}"),
            other => f.write_str(other.path()),
        }
    }
}

/// Performs redirects on behalf of the session layer.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that only logs; used where no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: Route) {
        tracing::info!(route = %route, "navigate");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Route),
}

/// Allow authenticated sessions; send everyone else to login.
#[must_use]
pub fn auth_guard(state: &SessionState, url: &str) -> GuardDecision {
    if state.is_authenticated {
        GuardDecision::Allow
    } else {
        GuardDecision::Redirect(Route::Login { return_url: Some(url.to_owned()) })
    }
}

/// Allow authenticated sessions holding `role`. Authenticated users without
/// it go to [`Route::Unauthorized`]; unauthenticated ones go to login.
#[must_use]
pub fn role_guard(role: &str, state: &SessionState, url: &str) -> GuardDecision {
    if !state.is_authenticated {
        return auth_guard(state, url);
    }
    if state.has_role(role) { GuardDecision::Allow } else { GuardDecision::Redirect(Route::Unauthorized) }
}

/// Guards bound to a live gateway and navigator.
#[derive(Clone)]
pub struct RouteGuard {
    gateway: AuthGateway,
    navigator: Arc<dyn Navigator>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(gateway: AuthGateway, navigator: Arc<dyn Navigator>) -> Self {
        Self { gateway, navigator }
    }

    /// Whether `url` may be activated; redirects otherwise.
    pub fn can_activate(&self, url: &str) -> bool {
        self.apply(auth_guard(&self.gateway.session().current(), url))
    }

    /// Child routes share the parent's check.
    pub fn can_activate_child(&self, url: &str) -> bool {
        self.can_activate(url)
    }

    /// Whether `url` may be activated by a user holding `role`.
    pub fn can_activate_with_role(&self, role: &str, url: &str) -> bool {
        self.apply(role_guard(role, &self.gateway.session().current(), url))
    }

    fn apply(&self, decision: GuardDecision) -> bool {
        match decision {
            GuardDecision::Allow => true,
            GuardDecision::Redirect(route) => {
                tracing::debug!(route = %route, "navigation blocked by guard");
                self.navigator.navigate(route);
                false
            }
        }
    }
}
