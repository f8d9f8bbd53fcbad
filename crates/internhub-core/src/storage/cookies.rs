//! Cookie mirror of the credential slots.
//!
//! Contexts that cannot run the client (server-rendered guards, edge
//! middleware, shell prompts) only need to know whether a session is
//! present. They read these cookies; they never decrypt them. A jar opened
//! on a cache directory keeps its cookies in `cookies.json` there, so the
//! mirror outlives the process.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cookie file name in cache directory
const COOKIES_FILE: &str = "cookies.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => f.write_str("Strict"),
            SameSite::Lax => f.write_str("Lax"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    #[serde(rename = "max_age_secs", with = "seconds")]
    pub max_age: Duration,
    pub same_site: SameSite,
    pub set_at: DateTime<Utc>,
}

mod seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::seconds(i64::deserialize(deserializer)?))
    }
}

impl SessionCookie {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.set_at + self.max_age
    }

    /// Render as a `Set-Cookie` header value
    pub fn to_set_cookie(&self) -> String {
        format!(
            "{}={}; Path={}; Max-Age={}; SameSite={}",
            self.name,
            self.value,
            self.path,
            self.max_age.num_seconds(),
            self.same_site
        )
    }
}

/// Shared cookie jar. Clone is cheap and shares the same cookies.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Arc<Mutex<BTreeMap<String, SessionCookie>>>,
    /// Backing file; `None` keeps the jar in memory only
    file: Option<Arc<PathBuf>>,
}

impl CookieJar {
    /// In-memory jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Jar backed by `<cache_dir>/cookies.json`, loading what is already there.
    ///
    /// An unreadable file is discarded; the jar only mirrors the slots.
    pub fn open(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        let path = cache_dir.join(COOKIES_FILE);

        let cookies = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Discarding unreadable cookie file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read cookie file {}", path.display()))
            }
        };

        Ok(Self {
            cookies: Arc::new(Mutex::new(cookies)),
            file: Some(Arc::new(path)),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_deref().map(PathBuf::as_path)
    }

    fn cookies(&self) -> MutexGuard<'_, BTreeMap<String, SessionCookie>> {
        self.cookies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a change and write the jar back while still holding the lock
    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, SessionCookie>)) {
        let mut cookies = self.cookies();
        f(&mut cookies);
        if let Some(path) = self.file.as_deref() {
            if let Err(e) = Self::persist(path, &cookies) {
                warn!(path = %path.display(), error = %e, "Failed to persist session cookies");
            }
        }
    }

    fn persist(path: &Path, cookies: &BTreeMap<String, SessionCookie>) -> Result<()> {
        if cookies.is_empty() {
            if path.exists() {
                std::fs::remove_file(path).context("Failed to remove cookie file")?;
            }
            return Ok(());
        }

        let contents = serde_json::to_string_pretty(cookies)?;
        let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
        std::fs::write(&tmp, contents).context("Failed to write cookie file")?;
        std::fs::rename(&tmp, path).context("Failed to replace cookie file")?;
        Ok(())
    }

    /// Set a root-path, same-site-strict cookie
    pub fn set(&self, name: &str, value: &str, max_age: Duration) {
        let cookie = SessionCookie {
            name: name.to_string(),
            value: value.to_string(),
            path: "/".to_string(),
            max_age,
            same_site: SameSite::Strict,
            set_at: Utc::now(),
        };
        self.update(|cookies| {
            cookies.insert(name.to_string(), cookie);
        });
    }

    pub fn remove(&self, name: &str) {
        self.update(|cookies| {
            cookies.remove(name);
        });
    }

    /// Value of an unexpired cookie
    pub fn get(&self, name: &str) -> Option<String> {
        let now = Utc::now();
        self.cookies()
            .get(name)
            .filter(|c| !c.is_expired_at(now))
            .map(|c| c.value.clone())
    }

    pub fn cookie(&self, name: &str) -> Option<SessionCookie> {
        self.cookies().get(name).cloned()
    }

    /// True when every named cookie is present and unexpired
    pub fn has_all(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.get(name).is_some())
    }

    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.cookies().values().map(SessionCookie::to_set_cookie).collect()
    }

    /// `Cookie` request header built from unexpired cookies
    pub fn cookie_header(&self) -> Option<String> {
        let now = Utc::now();
        let pairs: Vec<String> = self
            .cookies()
            .values()
            .filter(|c| !c.is_expired_at(now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}
