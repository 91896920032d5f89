//! Best-effort file-backed token store.
//!
//! Lets the server and the widget reuse one bearer token across processes.
//! Readers always re-validate expiry themselves, so a stale or corrupt
//! file is just a cache miss and a lost write only costs an extra
//! (harmless) refresh exchange. No locking.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Upper bound on how long a stored entry may outlive its write,
/// independent of what the exchange reported.
const MAX_STORE_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the stored token if one exists and has not expired.
    pub fn load(&self) -> Option<StoredToken> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let stored: StoredToken = serde_json::from_str(&content).ok()?;
        if Utc::now() < stored.expires_at {
            Some(stored)
        } else {
            None
        }
    }

    /// Persists a token. Failures are logged and swallowed; absence of the
    /// store only removes the cross-process reuse benefit.
    pub fn save(&self, access_token: &str, expires_at: DateTime<Utc>) {
        let cap = Utc::now() + Duration::seconds(MAX_STORE_TTL_SECS);
        let stored = StoredToken {
            access_token: access_token.to_string(),
            expires_at: expires_at.min(cap),
        };

        if let Err(e) = self.write(&stored) {
            warn!("token store write failed: {}", e);
        }
    }

    fn write(&self, stored: &StoredToken) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(stored)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save("abc", Utc::now() + Duration::seconds(120));
        let loaded = store.load().unwrap();
        assert_eq!(loaded.access_token, "abc");
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save("abc", Utc::now() - Duration::seconds(1));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_missing_file_is_a_miss() {
        let store = TokenStore::new(PathBuf::from("/nonexistent/nowplay/token.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(TokenStore::new(path).load().is_none());
    }

    #[test]
    fn test_ttl_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save("abc", Utc::now() + Duration::seconds(86_400));
        let loaded = store.load().unwrap();
        assert!(loaded.expires_at <= Utc::now() + Duration::seconds(MAX_STORE_TTL_SECS + 5));
    }
}
