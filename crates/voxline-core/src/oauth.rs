//! Single-use, TTL-bound OAuth state map.
//!
//! Each entry binds an anti-CSRF state token to a user id for the duration of
//! an authorization redirect. `pop` is the only read, and it deletes in the
//! same atomic step, so a retried webhook delivery can never redeem a state
//! twice. The backing tree has no native TTL; entries carry an expiry epoch
//! checked lazily on pop, with [`purge_expired`](OAuthStateMap::purge_expired)
//! available to the periodic maintenance job.

use crate::error::EngineResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Key prefix for state entries within the oauth tree.
const OAUTH_PREFIX: &str = "oauth:";

/// Default lifetime of an authorization state.
pub const DEFAULT_OAUTH_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Serialize, Deserialize)]
struct StateEntry {
    user_id: String,
    expires_at: i64,
}

/// TTL-bound `state -> user_id` map with atomic single-use pop.
pub struct OAuthStateMap {
    tree: sled::Tree,
    ttl: Duration,
}

impl OAuthStateMap {
    pub fn new(tree: sled::Tree, ttl: Duration) -> Self {
        Self { tree, ttl }
    }

    fn storage_key(state: &str) -> String {
        format!("{}{}", OAUTH_PREFIX, state)
    }

    /// Stores `state -> user_id` with the configured TTL.
    pub fn put(&self, state: &str, user_id: &str) -> EngineResult<()> {
        let entry = StateEntry {
            user_id: user_id.to_string(),
            expires_at: Utc::now().timestamp() + self.ttl.as_secs() as i64,
        };
        self.tree
            .insert(Self::storage_key(state), serde_json::to_vec(&entry)?)?;
        debug!(target: "voxline::oauth", user_id, "authorization state stored");
        Ok(())
    }

    /// Generates a fresh random state token, stores it, and returns it.
    pub fn issue(&self, user_id: &str) -> EngineResult<String> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        self.put(&state, user_id)?;
        Ok(state)
    }

    /// Redeems a state token exactly once.
    ///
    /// The remove returns the previous value in the same atomic step, so two
    /// concurrent callback deliveries cannot both succeed. Unknown, expired,
    /// and already-redeemed states all come back as `None`.
    pub fn pop(&self, state: &str) -> EngineResult<Option<String>> {
        let Some(raw) = self.tree.remove(Self::storage_key(state))? else {
            return Ok(None);
        };
        let entry: StateEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(target: "voxline::oauth", error = %e, "discarding malformed state entry");
                return Ok(None);
            }
        };
        if entry.expires_at < Utc::now().timestamp() {
            debug!(target: "voxline::oauth", "state expired before redemption");
            return Ok(None);
        }
        Ok(Some(entry.user_id))
    }

    /// Removes entries past their expiry. Returns how many were purged.
    pub fn purge_expired(&self) -> EngineResult<usize> {
        let now = Utc::now().timestamp();
        let mut purged = 0;
        for item in self.tree.scan_prefix(OAUTH_PREFIX.as_bytes()) {
            let (key, raw) = item?;
            let expired = serde_json::from_slice::<StateEntry>(&raw)
                .map(|entry| entry.expires_at < now)
                .unwrap_or(true);
            if !expired {
                continue;
            }
            // Guard against a state re-issued between scan and delete
            if self
                .tree
                .compare_and_swap(&key, Some(&raw), None::<&[u8]>)?
                .is_ok()
            {
                purged += 1;
            }
        }
        if purged > 0 {
            debug!(target: "voxline::oauth", purged, "expired authorization states purged");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_map(ttl: Duration) -> (OAuthStateMap, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = sled::open(dir.path()).expect("open sled");
        let tree = db.open_tree("oauth").expect("open tree");
        (OAuthStateMap::new(tree, ttl), dir)
    }

    fn insert_expired(map: &OAuthStateMap, state: &str, user_id: &str) {
        let entry = StateEntry {
            user_id: user_id.to_string(),
            expires_at: Utc::now().timestamp() - 5,
        };
        map.tree
            .insert(
                OAuthStateMap::storage_key(state),
                serde_json::to_vec(&entry).unwrap(),
            )
            .unwrap();
    }

    #[test]
    fn pop_is_single_use() {
        let (map, _dir) = open_map(DEFAULT_OAUTH_TTL);
        map.put("abc", "user1").unwrap();

        assert_eq!(map.pop("abc").unwrap().as_deref(), Some("user1"));
        assert_eq!(map.pop("abc").unwrap(), None, "second pop must find nothing");
    }

    #[test]
    fn unknown_state_is_none() {
        let (map, _dir) = open_map(DEFAULT_OAUTH_TTL);
        assert_eq!(map.pop("never-issued").unwrap(), None);
    }

    #[test]
    fn expired_state_is_not_redeemable() {
        let (map, _dir) = open_map(DEFAULT_OAUTH_TTL);
        insert_expired(&map, "old", "user1");
        assert_eq!(map.pop("old").unwrap(), None);
    }

    #[test]
    fn issue_returns_poppable_state() {
        let (map, _dir) = open_map(DEFAULT_OAUTH_TTL);
        let state = map.issue("user9").unwrap();
        assert_eq!(map.pop(&state).unwrap().as_deref(), Some("user9"));
    }

    #[test]
    fn concurrent_pops_redeem_exactly_once() {
        let (map, _dir) = open_map(DEFAULT_OAUTH_TTL);
        map.put("race", "user1").unwrap();

        let winners = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| map.pop("race").unwrap().is_some()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });
        assert_eq!(winners, 1, "exactly one concurrent pop may succeed");
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let (map, _dir) = open_map(DEFAULT_OAUTH_TTL);
        map.put("live", "user1").unwrap();
        insert_expired(&map, "dead1", "user2");
        insert_expired(&map, "dead2", "user3");

        assert_eq!(map.purge_expired().unwrap(), 2);
        assert_eq!(
            map.pop("live").unwrap().as_deref(),
            Some("user1"),
            "live entry must survive the sweep"
        );
    }
}
