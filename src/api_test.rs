use super::*;

#[test]
fn endpoint_url_joins_with_slash() {
    assert_eq!(endpoint_url("http://localhost:8080/auth", "login"), "http://localhost:8080/auth/login");
}

#[test]
fn new_trims_trailing_slash() {
    let api = HttpAuthApi::new("http://localhost:8080/auth/", HttpTimeouts::default()).unwrap();
    assert_eq!(api.auth_url(), "http://localhost:8080/auth");
}

#[test]
fn from_config_uses_auth_base() {
    let api = HttpAuthApi::from_config(&SessionConfig::default()).unwrap();
    assert_eq!(api.auth_url(), "http://localhost:8080/auth");
}

// =============================================================================
// error bodies
// =============================================================================

#[test]
fn server_message_extracted() {
    assert_eq!(server_message(r#"{"message":"Username already taken"}"#).as_deref(), Some("Username already taken"));
}

#[test]
fn server_message_ignores_blank_and_non_string() {
    assert_eq!(server_message(r#"{"message":"   "}"#), None);
    assert_eq!(server_message(r#"{"message":42}"#), None);
    assert_eq!(server_message("<html>Bad Gateway</html>"), None);
    assert_eq!(server_message(""), None);
}

#[test]
fn error_from_401_without_body_is_invalid_credentials() {
    let err = error_from_response(401, "");
    assert_eq!(err.user_message(), "Invalid credentials");
}

#[test]
fn error_from_400_keeps_server_message() {
    let err = error_from_response(400, r#"{"message":"Email already registered"}"#);
    assert_eq!(err, AuthError::Rejected { status: 400, message: Some("Email already registered".into()) });
}

// =============================================================================
// success bodies
// =============================================================================

#[test]
fn parse_login_body() {
    let body = serde_json::json!({
        "token": "a.b.c",
        "type": "Bearer",
        "user": {
            "id": 3, "username": "alice", "email": "a@bank.test",
            "firstName": "Alice", "lastName": "Martin", "roles": ["USER"]
        },
        "expiresIn": 3600
    })
    .to_string();
    let resp: LoginResponse = parse_body(&body).unwrap();
    assert_eq!(resp.token, "a.b.c");
    assert_eq!(resp.user.id, 3);
}

#[test]
fn parse_invalid_body() {
    let result: Result<LoginResponse, _> = parse_body("not json");
    assert!(matches!(result, Err(AuthError::InvalidResponse(_))));
}

#[tokio::test]
async fn unreachable_backend_is_classified() {
    // Port 9 (discard) on localhost is closed in test environments.
    let api = HttpAuthApi::new("http://127.0.0.1:9/auth", HttpTimeouts { request_secs: 2, connect_secs: 1 }).unwrap();
    let err = api.refresh("tok").await.unwrap_err();
    assert!(matches!(err, AuthError::NetworkUnreachable(_)), "{err:?}");
    assert_eq!(err.user_message(), "Unable to connect to server");
}
