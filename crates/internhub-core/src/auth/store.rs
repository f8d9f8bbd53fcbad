use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use super::error::StoreError;
use super::{Credential, CredentialPair, LoadedCredentials, UserProfile, Vault};
use crate::storage::{CookieJar, SlotStorage};

pub const ACCESS_SLOT: &str = "accessToken";
pub const REFRESH_SLOT: &str = "refreshToken";

/// Cached identity side data. Shares the credentials' lifecycle.
pub const PROFILE_SLOT: &str = "user";

/// Lifetime of the mirrored session cookies.
/// Matches the backend's refresh token lifetime.
const COOKIE_MAX_AGE_DAYS: i64 = 7;

/// Sole owner of the persisted credential pair.
///
/// Everything written is encrypted first; everything handed out is a
/// fresh decrypted copy.
pub struct CredentialStore {
    vault: Vault,
    storage: Arc<dyn SlotStorage>,
    cookies: CookieJar,
}

impl CredentialStore {
    pub fn new(vault: Vault, storage: Arc<dyn SlotStorage>, cookies: CookieJar) -> Self {
        Self {
            vault,
            storage,
            cookies,
        }
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Encrypt and persist both tokens, then mirror them into the cookie jar.
    pub fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        if pair.access.is_empty() || pair.refresh.is_empty() {
            return Err(StoreError::PartialPair);
        }

        // Encrypt both before touching storage so a vault failure writes nothing
        let access = self.vault.encrypt(pair.access.as_str())?;
        let refresh = self.vault.encrypt(pair.refresh.as_str())?;

        let written = self
            .storage
            .set(ACCESS_SLOT, &access)
            .and_then(|()| self.storage.set(REFRESH_SLOT, &refresh));
        if let Err(e) = written {
            // Slots may now hold halves of two different pairs
            self.discard_pair();
            return Err(e.into());
        }

        let max_age = Duration::days(COOKIE_MAX_AGE_DAYS);
        self.cookies.set(ACCESS_SLOT, &access, max_age);
        self.cookies.set(REFRESH_SLOT, &refresh, max_age);

        debug!("Credential pair saved");
        Ok(())
    }

    /// Read both slots. Each decrypts on its own; a bad slot comes back as `None`.
    pub fn load(&self) -> LoadedCredentials {
        LoadedCredentials {
            access: self.read_slot(ACCESS_SLOT),
            refresh: self.read_slot(REFRESH_SLOT),
        }
    }

    pub fn access(&self) -> Option<Credential> {
        self.read_slot(ACCESS_SLOT)
    }

    pub fn refresh(&self) -> Option<Credential> {
        self.read_slot(REFRESH_SLOT)
    }

    /// Remove both slots from both channels along with the cached profile.
    /// Clearing an empty store is a no-op.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.cookies.remove(ACCESS_SLOT);
        self.cookies.remove(REFRESH_SLOT);

        let mut first_err = None;
        for slot in [ACCESS_SLOT, REFRESH_SLOT, PROFILE_SLOT] {
            if let Err(e) = self.storage.remove(slot) {
                warn!(slot, error = %e, "Failed to remove credential slot");
                first_err.get_or_insert(e);
            }
        }

        debug!("Credential store cleared");
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Whether the cookie mirror currently signals a session
    pub fn has_session(&self) -> bool {
        self.cookies.has_all(&[ACCESS_SLOT, REFRESH_SLOT])
    }

    pub fn save_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let json = serde_json::to_string(profile).map_err(anyhow::Error::from)?;
        let sealed = self.vault.encrypt(&json)?;
        self.storage.set(PROFILE_SLOT, &sealed)?;
        Ok(())
    }

    pub fn load_profile(&self) -> Option<UserProfile> {
        let json = self.read_raw(PROFILE_SLOT)?;
        match serde_json::from_str(&json) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cached profile");
                None
            }
        }
    }

    /// Best-effort removal of both halves after a failed save
    fn discard_pair(&self) {
        self.cookies.remove(ACCESS_SLOT);
        self.cookies.remove(REFRESH_SLOT);
        for slot in [ACCESS_SLOT, REFRESH_SLOT] {
            if let Err(e) = self.storage.remove(slot) {
                warn!(slot, error = %e, "Failed to roll back credential slot");
            }
        }
    }

    fn read_slot(&self, slot: &str) -> Option<Credential> {
        self.read_raw(slot)
            .filter(|token| !token.is_empty())
            .map(Credential::new)
    }

    fn read_raw(&self, slot: &str) -> Option<String> {
        let sealed = match self.storage.get(slot) {
            Ok(Some(sealed)) => sealed,
            Ok(None) => return None,
            Err(e) => {
                warn!(slot, error = %e, "Failed to read credential slot");
                return None;
            }
        };

        let plain = self.vault.decrypt(&sealed);
        if plain.is_none() {
            warn!(slot, "Credential slot did not decrypt, treating as absent");
        }
        plain
    }
}
