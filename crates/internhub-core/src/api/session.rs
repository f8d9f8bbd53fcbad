//! Session operations exposed to the rest of the application.
//!
//! Nothing outside this crate touches the credential slots directly; the
//! UI logs in, checks status and logs out through these methods.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ApiClient, ApiError};
use crate::auth::clock::{self, Claims};
use crate::auth::{CredentialPair, Role, UserProfile};

/// Result of a session check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub enum CredentialStatus {
    /// Nothing stored
    Absent,
    Live { claims: Claims },
    /// The stored access credential was expired or unreadable and has
    /// been discarded
    Expired,
}

impl CredentialStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, CredentialStatus::Live { .. })
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "accessToken")]
    access_token: String,
    #[serde(alias = "refreshToken")]
    refresh_token: String,
}

impl ApiClient {
    /// Authenticate against the role's login endpoint and store the session
    pub async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, ApiError> {
        let response = self
            .client
            .post(self.url(role.login_path()))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let tokens: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("login: {}", e)))?;

        info!(%role, "Login succeeded");
        self.establish_session(CredentialPair::new(tokens.access_token, tokens.refresh_token))
    }

    /// Persist a freshly issued pair and cache the identity it carries
    pub fn establish_session(&self, pair: CredentialPair) -> Result<Option<UserProfile>, ApiError> {
        self.store.save(&pair)?;

        let profile = clock::decode_claims(&pair.access).map(|claims| UserProfile::from_claims(&claims));
        if let Some(ref profile) = profile {
            if let Err(e) = self.store.save_profile(profile) {
                warn!(error = %e, "Failed to cache user profile");
            }
        }

        info!(user = profile.as_ref().map(|p| p.display_name()), "Session established");
        Ok(profile)
    }

    /// Forget the session. Safe to call when already logged out.
    pub fn end_session(&self) -> Result<(), ApiError> {
        self.store.clear()?;
        info!("Session ended");
        Ok(())
    }

    /// Check the stored access credential.
    ///
    /// An expired or unparseable credential is discarded on the spot, so
    /// the caller sees `Expired` once and `Absent` afterwards.
    pub fn credential_status(&self) -> CredentialStatus {
        let Some(access) = self.store.access() else {
            return CredentialStatus::Absent;
        };

        match clock::decode_claims(&access) {
            Some(claims) if claims.is_live_at(Utc::now()) => CredentialStatus::Live { claims },
            _ => {
                info!("Stored access token expired or unreadable, clearing session");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "Failed to clear expired session");
                }
                CredentialStatus::Expired
            }
        }
    }

    /// Cached profile of the logged-in user
    pub fn current_user(&self) -> Option<UserProfile> {
        self.store.load_profile()
    }

    /// Whether the cookie mirror signals a session
    pub fn has_session_cookie(&self) -> bool {
        self.store.has_session()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::auth::{Credential, RefreshCoordinator, RefreshError, RefreshTransport};
    use crate::test_utils::{expired_token, live_token, memory_store, token_with_payload};
    use async_trait::async_trait;
    use serde_json::json;

    struct NoRefresh;

    #[async_trait]
    impl RefreshTransport for NoRefresh {
        async fn refresh(&self, _refresh: &Credential) -> Result<CredentialPair, RefreshError> {
            Err(RefreshError::MissingRefreshToken)
        }
    }

    fn client() -> ApiClient {
        let (store, _, _) = memory_store();
        let refresher = Arc::new(RefreshCoordinator::new(store.clone(), Arc::new(NoRefresh), None));
        ApiClient::new(reqwest::Client::new(), "http://localhost", store, refresher)
    }

    #[test]
    fn test_establish_session_caches_profile() {
        let api = client();
        let profile = api
            .establish_session(CredentialPair::new(live_token("ana"), live_token("r")))
            .unwrap()
            .unwrap();
        assert_eq!(profile.id.as_deref(), Some("ana"));
        assert_eq!(api.current_user(), Some(profile));
        assert!(api.has_session_cookie());
        assert!(api.credential_status().is_live());
    }

    #[test]
    fn test_establish_session_rejects_partial_pair() {
        let api = client();
        let result = api.establish_session(CredentialPair::new(live_token("a"), ""));
        assert!(matches!(result, Err(ApiError::Store(_))));
        assert_eq!(api.credential_status(), CredentialStatus::Absent);
    }

    #[test]
    fn test_numeric_subject_keeps_session_live() {
        let api = client();
        let access = token_with_payload(&json!({
            "exp": Utc::now().timestamp() + 3600,
            "sub": 17,
            "role": "student"
        }));
        let profile = api
            .establish_session(CredentialPair::new(access, live_token("r")))
            .unwrap()
            .unwrap();
        assert_eq!(profile.id.as_deref(), Some("17"));

        assert!(api.credential_status().is_live());
        assert!(api.credential_status().is_live());
        assert_eq!(api.current_user(), Some(profile));
    }

    #[test]
    fn test_status_discards_expired_credential() {
        let api = client();
        api.establish_session(CredentialPair::new(expired_token("old"), live_token("r")))
            .unwrap();

        assert_eq!(api.credential_status(), CredentialStatus::Expired);
        assert_eq!(api.credential_status(), CredentialStatus::Absent);
        assert!(api.current_user().is_none());
    }

    #[test]
    fn test_status_discards_opaque_credential() {
        let api = client();
        api.establish_session(CredentialPair::new("not-a-jwt", "r")).unwrap();
        assert_eq!(api.current_user(), None);
        assert_eq!(api.credential_status(), CredentialStatus::Expired);
    }

    #[test]
    fn test_end_session_is_idempotent() {
        let api = client();
        api.establish_session(CredentialPair::new(live_token("a"), live_token("r")))
            .unwrap();
        api.end_session().unwrap();
        api.end_session().unwrap();
        assert_eq!(api.credential_status(), CredentialStatus::Absent);
        assert!(!api.has_session_cookie());
    }

    #[test]
    fn test_status_serializes_with_state_tag() {
        let json = serde_json::to_value(CredentialStatus::Absent).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "absent" }));
    }
}
