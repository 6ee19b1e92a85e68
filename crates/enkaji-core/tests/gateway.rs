//! Auth gateway calls in isolation.

mod common;

use common::{user_json, Harness};
use enkaji_core::{AuthError, Credential, LoginCredentials};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_refresh_returns_new_bearer_token() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T9"})))
        .mount(&harness.server)
        .await;

    let credential = harness.console.gateway().refresh().await.unwrap();
    assert_eq!(credential, Credential::bearer("T9"));
}

#[tokio::test]
async fn test_refresh_without_token_means_cookie() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Token refreshed"))
        .mount(&harness.server)
        .await;

    let credential = harness.console.gateway().refresh().await.unwrap();
    assert_eq!(credential, Credential::Cookie);
}

#[tokio::test]
async fn test_refresh_rejection_is_refresh_failed() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&harness.server)
        .await;

    let err = harness.console.gateway().refresh().await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshFailed(_)));
}

#[tokio::test]
async fn test_verify_rejection_is_session_invalid() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/verify"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&harness.server)
        .await;

    let err = harness
        .console
        .gateway()
        .verify(&Credential::bearer("T1"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::SessionInvalid);
}

#[tokio::test]
async fn test_verify_returns_identity() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/auth/verify"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": user_json(true)})))
        .mount(&harness.server)
        .await;

    let identity = harness
        .console
        .gateway()
        .verify(&Credential::bearer("T1"))
        .await
        .unwrap();
    assert_eq!(identity.id, "u-admin");
    assert!(identity.is_admin);
}

#[tokio::test]
async fn test_login_response_without_user_is_access_denied() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "T1"})))
        .mount(&harness.server)
        .await;

    let err = harness
        .console
        .gateway()
        .login(&LoginCredentials::new("admin@x.com", "correct"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::AdminPrivilegeRequired);
}

#[tokio::test]
async fn test_logout_reports_server_failure() {
    let harness = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/auth/logout"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&harness.server)
        .await;

    let result = harness.console.gateway().logout(&Credential::Cookie).await;
    assert!(result.is_err());
}
