//! Shared fixtures for the pipeline integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde_json::json;
use wiremock::MockServer;

use internhub_core::auth::{
    Credential, CredentialPair, CredentialStore, HttpRefreshTransport, RefreshCoordinator, Vault,
};
use internhub_core::storage::{CookieJar, MemoryStorage};
use internhub_core::ApiClient;

pub const TEST_KEY: &str = "integration-test-passphrase";

/// JWT-shaped token valid for an hour. The signature is never checked client side.
pub fn token(subject: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = json!({
        "exp": Utc::now().timestamp() + 3600,
        "sub": subject,
        "email": format!("{}@uni.edu", subject),
        "name": subject.to_uppercase(),
    });
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.sig-{}", header, payload, subject)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub struct TestApp {
    pub server: MockServer,
    pub api: ApiClient,
    pub store: Arc<CredentialStore>,
    pub storage: MemoryStorage,
    pub refresher: Arc<RefreshCoordinator>,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::start_with_timeout(None).await
    }

    pub async fn start_with_timeout(refresh_timeout: Option<Duration>) -> Self {
        let server = MockServer::start().await;
        let storage = MemoryStorage::new();
        let vault = Vault::new(TEST_KEY).unwrap();
        let store = Arc::new(CredentialStore::new(
            vault,
            Arc::new(storage.clone()),
            CookieJar::new(),
        ));

        let client = reqwest::Client::new();
        let transport = Arc::new(HttpRefreshTransport::new(client.clone(), &server.uri()));
        let refresher = Arc::new(RefreshCoordinator::new(
            store.clone(),
            transport,
            refresh_timeout,
        ));
        let api = ApiClient::new(client, &server.uri(), store.clone(), refresher.clone());

        Self {
            server,
            api,
            store,
            storage,
            refresher,
        }
    }

    /// Store a session as if a login had just happened
    pub fn seed(&self, access: &str, refresh: &str) {
        self.api
            .establish_session(CredentialPair::new(access, refresh))
            .unwrap();
    }

    pub fn access(&self) -> Option<String> {
        self.store.access().map(|c| c.as_str().to_string())
    }

    pub fn refresh(&self) -> Option<String> {
        self.store.refresh().map(|c| c.as_str().to_string())
    }

    pub fn stored(&self) -> Option<(Credential, Credential)> {
        self.store.load().into_pair().map(|p| (p.access, p.refresh))
    }
}
