/// In-process token revocation list
///
/// Logout adds the presented tokens here; the JWT guard and the realtime
/// gateways reject any token found in the list. Entries are keyed by the
/// SHA-256 digest of the token, so raw tokens are never held in memory
/// longer than the request that revoked them.
///
/// Each entry remembers the token's `exp`. Once that passes, signature
/// validation rejects the token on its own, so expired entries are purged
/// whenever a new one is inserted.
///
/// The list is not persisted: a process restart forgets revocations.
///
/// # Example
///
/// ```
/// use planboard_shared::auth::blacklist::TokenBlacklist;
///
/// # async fn example() {
/// let blacklist = TokenBlacklist::new();
/// let exp = chrono::Utc::now().timestamp() + 3600;
///
/// blacklist.revoke("some.jwt.token", exp).await;
/// assert!(blacklist.is_revoked("some.jwt.token").await);
/// # }
/// ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Hex-encoded SHA-256 digest of a token
pub fn token_fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Shared set of revoked tokens; cloning shares the same set
#[derive(Debug, Clone, Default)]
pub struct TokenBlacklist {
    entries: Arc<RwLock<HashMap<String, i64>>>,
}

impl TokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revokes a token until its expiry timestamp (seconds since epoch)
    pub async fn revoke(&self, token: &str, expires_at: i64) {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.write().await;

        let before = entries.len();
        entries.retain(|_, exp| *exp > now);
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired blacklist entries");
        }

        if expires_at > now {
            entries.insert(token_fingerprint(token), expires_at);
        }
    }

    /// True when the token has been revoked and has not yet expired
    pub async fn is_revoked(&self, token: &str) -> bool {
        let fingerprint = token_fingerprint(token);
        let entries = self.entries.read().await;

        entries
            .get(&fingerprint)
            .is_some_and(|exp| *exp > Utc::now().timestamp())
    }

    /// Number of entries currently held
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_one_hour() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_fingerprint_is_stable_sha256_hex() {
        let a = token_fingerprint("token");
        let b = token_fingerprint("token");

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, token_fingerprint("other"));
    }

    #[tokio::test]
    async fn test_revoke_and_check() {
        let blacklist = TokenBlacklist::new();

        assert!(!blacklist.is_revoked("a.b.c").await);
        blacklist.revoke("a.b.c", in_one_hour()).await;

        assert!(blacklist.is_revoked("a.b.c").await);
        assert!(!blacklist.is_revoked("x.y.z").await);
        assert_eq!(blacklist.len().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let blacklist = TokenBlacklist::new();
        let clone = blacklist.clone();

        clone.revoke("shared", in_one_hour()).await;
        assert!(blacklist.is_revoked("shared").await);
    }

    #[tokio::test]
    async fn test_already_expired_token_is_not_stored() {
        let blacklist = TokenBlacklist::new();

        blacklist.revoke("old", Utc::now().timestamp() - 10).await;
        assert!(blacklist.is_empty().await);
        assert!(!blacklist.is_revoked("old").await);
    }

    #[tokio::test]
    async fn test_expired_entries_are_purged_on_insert() {
        let blacklist = TokenBlacklist::new();

        blacklist
            .entries
            .write()
            .await
            .insert(token_fingerprint("stale"), Utc::now().timestamp() - 1);
        assert_eq!(blacklist.len().await, 1);

        blacklist.revoke("fresh", in_one_hour()).await;

        assert_eq!(blacklist.len().await, 1);
        assert!(blacklist.is_revoked("fresh").await);
        assert!(!blacklist.is_revoked("stale").await);
    }
}
