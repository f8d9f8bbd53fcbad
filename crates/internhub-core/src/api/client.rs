//! API client for communicating with the internhub REST API.
//!
//! This module provides the `ApiClient` struct. Every request goes through
//! [`ApiClient::send`], which attaches the stored access credential and
//! recovers from a 401 by refreshing once and resending once.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{ApiError, ApiRequest};
use crate::auth::{Credential, CredentialStore, HttpRefreshTransport, RefreshCoordinator, Vault};
use crate::config::Config;
use crate::storage;

/// API client for internhub.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and the store and refresh coordinator are shared.
#[derive(Clone)]
pub struct ApiClient {
    pub(super) client: Client,
    pub(super) base_url: String,
    pub(super) store: Arc<CredentialStore>,
    refresher: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(
        client: Client,
        base_url: &str,
        store: Arc<CredentialStore>,
        refresher: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            refresher,
        }
    }

    /// Wire up vault, storage, refresh coordinator and HTTP client from config.
    ///
    /// Fails when the token key is missing; that is a startup error.
    pub fn from_config(config: &Config) -> Result<Self> {
        let key = Config::token_key()?;
        let vault = Vault::new(&key).context("Failed to initialize token vault")?;

        let cache_dir = config.cache_dir()?;
        let slots = storage::open(config.storage, &cache_dir)?;
        let cookies = storage::open_cookies(config.storage, &cache_dir)?;
        let store = Arc::new(CredentialStore::new(vault, slots, cookies));

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let transport = Arc::new(HttpRefreshTransport::new(client.clone(), &config.api_base_url));
        let refresher = Arc::new(RefreshCoordinator::new(
            store.clone(),
            transport,
            config.refresh_timeout(),
        ));

        Ok(Self::new(client, &config.api_base_url, store, refresher))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(super) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request with the current credential attached.
    ///
    /// Only a 401 on an authenticated request is handled here: the refresh
    /// coordinator is asked for a new credential and the request is resent
    /// exactly once. Whatever the resend returns, including another 401, goes
    /// back to the caller. Every other status is returned untouched.
    ///
    /// # Errors
    ///
    /// `SessionExpired` when the refresh failed (stored credentials are gone
    /// by then), `NetworkError` when the request could not be sent.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ApiError> {
        let credential = self.store.access();
        let response = self.dispatch(&request, credential.as_ref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(stale) = credential else {
            debug!(path = %request.path, "401 on unauthenticated request");
            return Ok(response);
        };

        if request.retried {
            return Ok(response);
        }
        request.retried = true;

        debug!(path = %request.path, "401 received, refreshing credentials");
        let fresh = self.refresher.refresh(Some(&stale)).await?;

        let response = self.dispatch(&request, Some(&fresh)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %request.path, "Still unauthorized after refresh, giving up");
        }
        Ok(response)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        credential: Option<&Credential>,
    ) -> Result<Response, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        if let Some(credential) = credential {
            builder = builder.bearer_auth(credential.as_str());
        }

        let response = builder.send().await?;
        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status().as_u16(),
            authenticated = credential.is_some(),
            retried = request.retried,
            "API response"
        );
        Ok(response)
    }

    /// Check if response is successful, returning an error with body if not.
    pub(super) async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let response = Self::check_response(self.send(request).await?).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.fetch(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.fetch(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        Self::check_response(self.send(ApiRequest::delete(path)).await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialPair, RefreshError, RefreshTransport};
    use crate::test_utils::{live_token, memory_store};
    use async_trait::async_trait;

    struct NoRefresh;

    #[async_trait]
    impl RefreshTransport for NoRefresh {
        async fn refresh(&self, _refresh: &Credential) -> Result<CredentialPair, RefreshError> {
            Err(RefreshError::Transport("unreachable in this test".to_string()))
        }
    }

    fn client(base_url: &str) -> ApiClient {
        let (store, _, _) = memory_store();
        let refresher = Arc::new(RefreshCoordinator::new(store.clone(), Arc::new(NoRefresh), None));
        ApiClient::new(Client::new(), base_url, store, refresher)
    }

    #[test]
    fn test_url_joining() {
        let api = client("https://api.internhub.test/api/");
        assert_eq!(api.base_url(), "https://api.internhub.test/api");
        assert_eq!(api.url("/students"), "https://api.internhub.test/api/students");
        assert_eq!(api.url("students/7"), "https://api.internhub.test/api/students/7");
    }

    #[test]
    fn test_clone_shares_store() {
        let api = client("http://localhost");
        let other = api.clone();
        api.store
            .save(&CredentialPair::new(live_token("a"), live_token("r")))
            .unwrap();
        assert!(other.store.access().is_some());
    }
}
