mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{bearer, token, TestApp, TEST_KEY};
use internhub_core::auth::{
    CredentialPair, CredentialStore, HttpRefreshTransport, RefreshCoordinator, Vault,
};
use internhub_core::storage::{CookieJar, FileStorage};
use internhub_core::{ApiClient, ApiError, CredentialStatus, Role};

#[tokio::test]
async fn test_login_uses_role_endpoint() {
    for (role, route) in [
        (Role::Admin, "/auth/login"),
        (Role::Student, "/auth/student/login"),
        (Role::Teacher, "/auth/teacher/login"),
        (Role::Company, "/auth/company/login"),
    ] {
        let app = TestApp::start().await;
        let access = token("maria");

        Mock::given(method("POST"))
            .and(path(route))
            .and(body_json(json!({ "email": "maria@uni.edu", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access,
                "refresh_token": token("maria-refresh"),
            })))
            .expect(1)
            .mount(&app.server)
            .await;

        let profile = app
            .api
            .login(role, "maria@uni.edu", "pw")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.email.as_deref(), Some("maria@uni.edu"));
        assert_eq!(app.access(), Some(access));
        assert!(app.api.credential_status().is_live());
    }
}

#[tokio::test]
async fn test_login_accepts_camel_case_tokens() {
    let app = TestApp::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/company/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": token("acme"),
            "refreshToken": token("acme-refresh"),
        })))
        .mount(&app.server)
        .await;

    app.api
        .login(Role::Company, "hr@acme.test", "pw")
        .await
        .unwrap();
    assert_eq!(app.api.current_user().unwrap().display_name(), "ACME");
}

#[tokio::test]
async fn test_failed_login_stores_nothing() {
    let app = TestApp::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/student/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&app.server)
        .await;

    let err = app
        .api
        .login(Role::Student, "ana@uni.edu", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(app.api.credential_status(), CredentialStatus::Absent);
    assert!(app.storage.is_empty());
}

#[tokio::test]
async fn test_logout_then_requests_go_unauthenticated() {
    let app = TestApp::start().await;
    let access = token("ana");
    app.seed(&access, &token("ana-refresh"));

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", bearer(&access).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ana" })))
        .expect(1)
        .mount(&app.server)
        .await;

    let me: serde_json::Value = app.api.get("/me").await.unwrap();
    assert_eq!(me["id"], "ana");

    app.api.end_session().unwrap();
    assert_eq!(app.api.credential_status(), CredentialStatus::Absent);
    assert!(app.api.current_user().is_none());
}

#[tokio::test]
async fn test_file_storage_and_cookies_survive_restart() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let (access, refresh) = (token("ana"), token("ana-refresh"));

    let open = || {
        let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
        let store = Arc::new(CredentialStore::new(
            Vault::new(TEST_KEY).unwrap(),
            storage,
            CookieJar::open(dir.path()).unwrap(),
        ));
        let client = reqwest::Client::new();
        let transport = Arc::new(HttpRefreshTransport::new(client.clone(), &server.uri()));
        let refresher = Arc::new(RefreshCoordinator::new(store.clone(), transport, None));
        ApiClient::new(client, &server.uri(), store, refresher)
    };

    open()
        .establish_session(CredentialPair::new(access.as_str(), refresh.as_str()))
        .unwrap();

    let contents = std::fs::read_to_string(dir.path().join("credentials.json")).unwrap();
    assert!(!contents.contains(&access));
    assert!(!contents.contains(&refresh));

    let reopened = open();
    assert!(reopened.has_session_cookie());
    match reopened.credential_status() {
        CredentialStatus::Live { claims } => assert_eq!(claims.sub.as_deref(), Some("ana")),
        other => panic!("expected live session, got {:?}", other),
    }

    reopened.end_session().unwrap();
    assert!(!dir.path().join("credentials.json").exists());
    assert!(!dir.path().join("cookies.json").exists());
    assert!(!open().has_session_cookie());
}

#[tokio::test]
async fn test_wrong_key_reads_as_logged_out() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());

    let writer = CredentialStore::new(
        Vault::new(TEST_KEY).unwrap(),
        storage.clone(),
        CookieJar::new(),
    );
    writer
        .save(&CredentialPair::new(token("a"), token("r")))
        .unwrap();

    let reader = CredentialStore::new(
        Vault::new("a-different-key").unwrap(),
        storage,
        CookieJar::new(),
    );
    assert!(reader.load().is_empty());
}
