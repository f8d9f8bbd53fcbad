//! Helpers shared by unit tests.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::{Credential, CredentialStore, Vault};
use crate::storage::{CookieJar, MemoryStorage};

pub const TEST_KEY: &str = "unit-test-passphrase";

/// Unsigned JWT-shaped token around an arbitrary payload
pub fn token_with_payload(payload: &Value) -> Credential {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    Credential::new(format!("{}.{}.sig", header, body))
}

/// Token valid for another hour; `tag` keeps tokens distinguishable
pub fn live_token(tag: &str) -> Credential {
    token_with_payload(&json!({
        "exp": Utc::now().timestamp() + 3600,
        "sub": tag,
        "email": format!("{}@example.edu", tag),
    }))
}

pub fn expired_token(tag: &str) -> Credential {
    token_with_payload(&json!({
        "exp": Utc::now().timestamp() - 60,
        "sub": tag,
    }))
}

/// In-memory store with its backing storage and cookie jar exposed
pub fn memory_store() -> (Arc<CredentialStore>, MemoryStorage, CookieJar) {
    let storage = MemoryStorage::new();
    let cookies = CookieJar::new();
    let vault = Vault::new(TEST_KEY).expect("test vault");
    let store = CredentialStore::new(vault, Arc::new(storage.clone()), cookies.clone());
    (Arc::new(store), storage, cookies)
}
