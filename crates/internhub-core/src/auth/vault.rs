//! Symmetric encryption for tokens at rest.
//!
//! The key is a static passphrase shipped with the client, so this protects
//! persisted tokens against casual inspection only. Anyone holding the
//! passphrase can decrypt.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;

use super::error::VaultError;

/// Application salt for key derivation.
/// Fixed so the same passphrase always yields the same key across runs.
const KEY_SALT: &[u8] = b"internhub.token-vault.v1";

/// ChaCha20-Poly1305 nonce length in bytes
const NONCE_LEN: usize = 12;

/// Argon2 memory cost in KiB.
/// Derivation runs once per process, so a modest cost keeps startup fast.
const KDF_MEMORY_KIB: u32 = 8 * 1024;

/// Argon2 iteration count
const KDF_ITERATIONS: u32 = 2;

#[derive(Clone)]
pub struct Vault {
    cipher: ChaCha20Poly1305,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Vault { .. }")
    }
}

impl Vault {
    /// Derive the vault key from the configured passphrase
    pub fn new(passphrase: &str) -> Result<Self, VaultError> {
        if passphrase.is_empty() {
            return Err(VaultError::MissingKey);
        }

        let params = Params::new(KDF_MEMORY_KIB, KDF_ITERATIONS, 1, Some(32))
            .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
        let mut key = [0u8; 32];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(passphrase.as_bytes(), KEY_SALT, &mut key)
            .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    /// Encrypt to base64(nonce || ciphertext || tag)
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        if plaintext.is_empty() {
            return Err(VaultError::EmptyInput);
        }

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| VaultError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(STANDARD.encode(out))
    }

    /// Decrypt a value produced by [`Vault::encrypt`].
    ///
    /// Returns `None` for anything that does not authenticate: bad base64,
    /// truncated input, a different key, or tampered bytes. Stale or
    /// foreign-format data in storage is expected, not exceptional.
    pub fn decrypt(&self, ciphertext: &str) -> Option<String> {
        let raw = STANDARD.decode(ciphertext.trim()).ok()?;
        if raw.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let plain = self.cipher.decrypt(Nonce::from_slice(nonce), sealed).ok()?;
        String::from_utf8(plain).ok()
    }
}
