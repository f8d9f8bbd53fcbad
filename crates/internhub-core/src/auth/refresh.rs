//! Single-flight refresh of the access credential.
//!
//! The backend's refresh tokens are single use: whichever refresh call lands
//! first invalidates the token for everyone else. When a burst of requests
//! all fail with 401 at once, exactly one of them (the driver) performs the
//! refresh. The rest queue up and receive the driver's outcome, success or
//! failure, in the order they arrived.
//!
//! State is `{in_progress, waiters}` behind a single mutex. The lock is
//! never held across an `.await`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::error::RefreshError;
use super::{Credential, CredentialPair, CredentialStore};

/// Maximum length for error response bodies kept in refresh errors
const MAX_ERROR_BODY_LENGTH: usize = 500;

// ============================================================================
// Transport
// ============================================================================

/// Exchanges a refresh credential for a new pair.
#[async_trait]
pub trait RefreshTransport: Send + Sync {
    async fn refresh(&self, refresh: &Credential) -> Result<CredentialPair, RefreshError>;
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "access_token")]
    access_token: String,
    #[serde(rename = "refreshToken", alias = "refresh_token")]
    refresh_token: String,
}

/// `POST {base}/auth/refresh` against the backend.
#[derive(Clone)]
pub struct HttpRefreshTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpRefreshTransport {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/auth/refresh", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl RefreshTransport for HttpRefreshTransport {
    async fn refresh(&self, refresh: &Credential) -> Result<CredentialPair, RefreshError> {
        let response = self
            .client
            .post(&self.url)
            .json(&RefreshRequest {
                refresh_token: refresh.as_str(),
            })
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY_LENGTH {
                let cut = (0..=MAX_ERROR_BODY_LENGTH)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: RefreshResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::Transport(format!("Invalid refresh response: {}", e)))?;

        Ok(CredentialPair::new(tokens.access_token, tokens.refresh_token))
    }
}

// ============================================================================
// Coordinator
// ============================================================================

type Outcome = Result<Credential, RefreshError>;

#[derive(Default)]
struct RefreshState {
    in_progress: bool,
    waiters: VecDeque<oneshot::Sender<Outcome>>,
}

/// What a caller does after looking at the shared state
enum Turn {
    Drive,
    Wait(oneshot::Receiver<Outcome>),
    /// The credential that failed is already superseded
    Reuse(Credential),
}

/// Shared by every API client of the process, usually behind an `Arc`.
pub struct RefreshCoordinator {
    store: Arc<CredentialStore>,
    transport: Arc<dyn RefreshTransport>,
    timeout: Option<Duration>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        transport: Arc<dyn RefreshTransport>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            transport,
            timeout,
            state: Mutex::new(RefreshState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_refreshing(&self) -> bool {
        self.state().in_progress
    }

    /// Number of callers queued behind the current driver
    pub fn waiting(&self) -> usize {
        self.state().waiters.len()
    }

    /// Obtain a fresh access credential after `stale` was rejected.
    ///
    /// Joins the in-flight refresh if there is one, otherwise drives a new
    /// one. If the store already holds a different access credential than
    /// `stale`, that one is returned without contacting the backend.
    ///
    /// A failed refresh is terminal for the session: stored credentials are
    /// cleared and every queued caller receives the same error.
    pub async fn refresh(&self, stale: Option<&Credential>) -> Outcome {
        loop {
            match self.take_turn(stale) {
                Turn::Reuse(current) => {
                    debug!("Access token already refreshed by another caller");
                    return Ok(current);
                }
                Turn::Wait(rx) => match rx.await {
                    // Driver went away without an answer; try again, possibly as driver
                    Ok(Err(RefreshError::Abandoned)) | Err(_) => continue,
                    Ok(outcome) => return outcome,
                },
                Turn::Drive => {
                    let guard = DriverGuard::new(self);
                    let outcome = self.drive().await;
                    if let Err(ref e) = outcome {
                        self.end_session(e);
                    }
                    return guard.settle(outcome);
                }
            }
        }
    }

    fn take_turn(&self, stale: Option<&Credential>) -> Turn {
        let mut state = self.state();
        if state.in_progress {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(position = state.waiters.len(), "Refresh in progress, queued");
            return Turn::Wait(rx);
        }

        if let Some(stale) = stale {
            if let Some(current) = self.store.access() {
                if current != *stale {
                    return Turn::Reuse(current);
                }
            }
        }

        state.in_progress = true;
        Turn::Drive
    }

    async fn drive(&self) -> Outcome {
        let refresh = self
            .store
            .refresh()
            .ok_or(RefreshError::MissingRefreshToken)?;

        info!("Refreshing access token");
        let call = self.transport.refresh(&refresh);
        let pair = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RefreshError::TimedOut(limit))??,
            None => call.await?,
        };

        self.store
            .save(&pair)
            .map_err(|e| RefreshError::Persistence(e.to_string()))?;
        Ok(pair.access)
    }

    fn end_session(&self, error: &RefreshError) {
        warn!(error = %error, "Refresh failed, clearing stored credentials");
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credentials after refresh failure");
        }
    }

    /// Reset the state and hand the outcome to every waiter, oldest first.
    fn settle(&self, outcome: Outcome) -> Outcome {
        let waiters = {
            let mut state = self.state();
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };

        let count = waiters.len();
        for waiter in waiters {
            // A waiter that gave up has dropped its receiver
            let _ = waiter.send(outcome.clone());
        }

        match &outcome {
            Ok(_) => info!(waiters = count, "Refresh completed"),
            Err(e) => debug!(waiters = count, error = %e, "Refresh settled with error"),
        }
        outcome
    }
}

/// Settles the cycle even if the driving future is dropped mid-refresh.
struct DriverGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl<'a> DriverGuard<'a> {
    fn new(coordinator: &'a RefreshCoordinator) -> Self {
        Self {
            coordinator,
            settled: false,
        }
    }

    fn settle(mut self, outcome: Outcome) -> Outcome {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for DriverGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh driver dropped before completing");
            let _ = self.coordinator.settle(Err(RefreshError::Abandoned));
        }
    }
}
