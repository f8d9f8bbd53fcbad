use std::fmt;

use serde::{Deserialize, Serialize};

use super::clock::Claims;

/// An opaque signed token (JWT shaped).
///
/// Only the expiry and identity claims are ever decoded; everything else
/// is passed through to the backend untouched.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Tokens end up in logs far too easily; print a short fingerprint instead.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = self
            .0
            .char_indices()
            .rev()
            .nth(5)
            .map(|(i, _)| &self.0[i..])
            .unwrap_or("");
        write!(f, "Credential(..{})", tail)
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Access and refresh credentials, always stored and loaded together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: Credential,
    pub refresh: Credential,
}

impl CredentialPair {
    pub fn new(access: impl Into<Credential>, refresh: impl Into<Credential>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

/// What came back from storage. Each slot is decrypted on its own, so one
/// corrupted slot does not take the other down with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedCredentials {
    pub access: Option<Credential>,
    pub refresh: Option<Credential>,
}

impl LoadedCredentials {
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }

    /// Both halves, or nothing.
    pub fn into_pair(self) -> Option<CredentialPair> {
        match (self.access, self.refresh) {
            (Some(access), Some(refresh)) => Some(CredentialPair { access, refresh }),
            _ => None,
        }
    }
}

/// Login audience. Each role authenticates against its own endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub enum Role {
    Admin,
    Student,
    Teacher,
    Company,
}

impl Role {
    pub fn login_path(&self) -> &'static str {
        match self {
            Role::Admin => "/auth/login",
            Role::Student => "/auth/student/login",
            Role::Teacher => "/auth/teacher/login",
            Role::Company => "/auth/company/login",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "company" => Some(Role::Company),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Company => "company",
        };
        f.write_str(name)
    }
}

/// Identity side data cached alongside the credentials for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct UserProfile {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl UserProfile {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            id: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            role: claims.role.clone(),
        }
    }

    /// Best available label for display
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("unknown user")
    }
}
