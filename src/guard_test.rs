use super::*;
use crate::api::AuthApi;
use crate::refresh::DEFAULT_REFRESH_LEAD;
use crate::storage::{MemoryStorage, TokenStore};
use crate::test_helpers::{MockAuthApi, RecordingNavigator, make_token, sample_user};
use crate::token::now_secs;

fn signed_in(roles: &[&str]) -> SessionState {
    let mut user = sample_user("alice");
    user.roles = roles.iter().map(|r| (*r).to_owned()).collect();
    SessionState::authenticated(user, "tok".into())
}

// =============================================================================
// Route
// =============================================================================

#[test]
fn route_display() {
    assert_eq!(Route::Login { return_url: None }.to_string(), "/login");
    assert_eq!(
        Route::Login { return_url: Some("/accounts/42".into()) }.to_string(),
        "/login?returnUrl=/accounts/42"
    );
    assert_eq!(Route::Unauthorized.to_string(), "/unauthorized");
    assert_eq!(Route::Login { return_url: Some("/x".into()) }.path(), "/login");
}

// =============================================================================
// Pure decisions
// =============================================================================

#[test]
fn auth_guard_allows_authenticated() {
    assert_eq!(auth_guard(&signed_in(&["USER"]), "/dashboard"), GuardDecision::Allow);
}

#[test]
fn auth_guard_redirects_anonymous_with_return_url() {
    assert_eq!(
        auth_guard(&SessionState::default(), "/dashboard"),
        GuardDecision::Redirect(Route::Login { return_url: Some("/dashboard".into()) })
    );
}

#[test]
fn role_guard_matrix() {
    assert_eq!(role_guard("ADMIN", &signed_in(&["USER", "ADMIN"]), "/admin"), GuardDecision::Allow);
    assert_eq!(
        role_guard("ADMIN", &signed_in(&["USER"]), "/admin"),
        GuardDecision::Redirect(Route::Unauthorized)
    );
    assert_eq!(
        role_guard("ADMIN", &SessionState::default(), "/admin"),
        GuardDecision::Redirect(Route::Login { return_url: Some("/admin".into()) })
    );
}

#[test]
fn role_guard_is_case_sensitive() {
    assert_eq!(
        role_guard("admin", &signed_in(&["ADMIN"]), "/admin"),
        GuardDecision::Redirect(Route::Unauthorized)
    );
}

// =============================================================================
// RouteGuard
// =============================================================================

fn route_guard(signed_in: bool) -> (RouteGuard, Arc<RecordingNavigator>) {
    let storage = Arc::new(MemoryStorage::new());
    if signed_in {
        TokenStore::new(storage.clone())
            .save(&make_token(now_secs() + 3600), &sample_user("alice"))
            .unwrap();
    }
    let api: Arc<dyn AuthApi> = MockAuthApi::new();
    let navigator = RecordingNavigator::new();
    let gateway = AuthGateway::new(api, TokenStore::new(storage), navigator.clone(), DEFAULT_REFRESH_LEAD);
    (RouteGuard::new(gateway, navigator.clone()), navigator)
}

#[tokio::test]
async fn route_guard_redirects_anonymous_to_login() {
    let (guard, navigator) = route_guard(false);
    assert!(!guard.can_activate("/accounts"));
    assert!(!guard.can_activate_child("/accounts/7"));
    assert_eq!(
        navigator.taken(),
        vec![
            Route::Login { return_url: Some("/accounts".into()) },
            Route::Login { return_url: Some("/accounts/7".into()) },
        ]
    );
}

#[tokio::test]
async fn route_guard_allows_signed_in_user_without_navigating() {
    let (guard, navigator) = route_guard(true);
    assert!(guard.can_activate("/accounts"));
    assert!(guard.can_activate_child("/accounts/7"));
    assert!(guard.can_activate_with_role("USER", "/transfers"));
    assert!(navigator.taken().is_empty());
}

#[tokio::test]
async fn route_guard_sends_missing_role_to_unauthorized() {
    let (guard, navigator) = route_guard(true);
    assert!(!guard.can_activate_with_role("ADMIN", "/admin"));
    assert_eq!(navigator.taken(), vec![Route::Unauthorized]);
}
