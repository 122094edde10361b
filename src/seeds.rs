//! Seed pair lifecycle management.
//!
//! A user has at most one active seed pair at any instant. The server seed
//! is committed by its SHA-256 hash before the first bet and only becomes
//! revealable once the pair is retired by rotation. Nonce reservation is
//! serialized per pair; different users reserve independently.
//!
//! Hot state lives in concurrent maps in front of the record store, with
//! read-through on cache miss so restarts pick up persisted pairs.

use crate::errors::{CoreResult, GameError, SeedError};
use crate::storage::RecordStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const SEED_PAIR_PREFIX: &str = "seed:pair:";
const ACTIVE_INDEX_PREFIX: &str = "seed:active:";

/// Server seed length in bytes (256 bits).
const SERVER_SEED_LEN: usize = 32;
/// Attempts to win or observe a concurrent first-creation race.
const CREATE_ATTEMPTS: u32 = 3;

fn pair_key(id: &str) -> Vec<u8> {
    format!("{}{}", SEED_PAIR_PREFIX, id).into_bytes()
}

fn active_key(user_id: &str) -> Vec<u8> {
    format!("{}{}", ACTIVE_INDEX_PREFIX, user_id).into_bytes()
}

/// A server/client seed pair with its monotonic nonce counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedPair {
    pub id: String,
    pub user_id: String,
    /// Secret until the pair is retired. Handlers must go through
    /// [`SeedPairManager::reveal_and_verify`], never read this directly.
    pub server_seed: Vec<u8>,
    /// SHA-256 commitment, public from creation.
    pub server_seed_hash: String,
    pub client_seed: String,
    /// Last issued nonce; 0 means never used. Issued nonces are a gapless
    /// prefix of the naturals starting at 1.
    pub nonce: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SeedPair {
    fn generate(user_id: &str, client_seed: String) -> Self {
        let mut server_seed = vec![0u8; SERVER_SEED_LEN];
        rand::rngs::OsRng.fill_bytes(&mut server_seed);
        let server_seed_hash = hex::encode(Sha256::digest(&server_seed));
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            server_seed,
            server_seed_hash,
            client_seed,
            nonce: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Recompute the commitment and compare. Holds for every pair the
    /// manager ever creates; replays rely on it after reveal.
    pub fn hash_matches(&self) -> bool {
        hex::encode(Sha256::digest(&self.server_seed)) == self.server_seed_hash
    }
}

/// Result of a reveal request on a retired pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealedSeed {
    pub seed_pair_id: String,
    pub server_seed_hex: String,
    pub server_seed_hash: String,
    pub hash_matches: bool,
}

pub struct SeedPairManager {
    store: RecordStore,
    pairs: DashMap<String, SeedPair>,
    active_by_user: DashMap<String, String>,
}

impl SeedPairManager {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            pairs: DashMap::new(),
            active_by_user: DashMap::new(),
        }
    }

    fn persist(&self, pair: &SeedPair) -> CoreResult<()> {
        self.store.put_record(&pair_key(&pair.id), pair)
    }

    /// Read-through load of a pair into the hot map.
    fn ensure_cached(&self, seed_pair_id: &str) -> CoreResult<bool> {
        if self.pairs.contains_key(seed_pair_id) {
            return Ok(true);
        }
        if let Some(pair) = self
            .store
            .get_record::<SeedPair>(&pair_key(seed_pair_id))?
        {
            self.pairs.entry(seed_pair_id.to_string()).or_insert(pair);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn get_pair(&self, seed_pair_id: &str) -> CoreResult<SeedPair> {
        if !self.ensure_cached(seed_pair_id)? {
            return Err(SeedError::NotFound {
                seed_pair_id: seed_pair_id.to_string(),
            }
            .into());
        }
        Ok(self
            .pairs
            .get(seed_pair_id)
            .map(|p| p.clone())
            .expect("cached above"))
    }

    fn active_pair_id(&self, user_id: &str) -> CoreResult<Option<String>> {
        if let Some(id) = self.active_by_user.get(user_id) {
            return Ok(Some(id.clone()));
        }
        if let Some(bytes) = self.store.get_raw(&active_key(user_id))? {
            let id = String::from_utf8_lossy(&bytes).to_string();
            self.active_by_user
                .entry(user_id.to_string())
                .or_insert(id.clone());
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Return the user's active pair, creating one on first use.
    ///
    /// Concurrent first-bet races are the one structurally racy path: each
    /// loser of the index insert treats it as a `SeedConflict`, re-reads,
    /// and uses the winning row. The conflict never reaches the caller.
    pub fn get_or_create_active(&self, user_id: &str) -> CoreResult<SeedPair> {
        for attempt in 0..CREATE_ATTEMPTS {
            if let Some(id) = self.active_pair_id(user_id)? {
                return self.get_pair(&id);
            }

            let candidate = SeedPair::generate(user_id, String::new());
            match self.active_by_user.entry(user_id.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(_) => {
                    // Someone else won the race; re-read their row.
                    tracing::debug!(
                        user_id,
                        attempt,
                        "seed creation race lost, re-reading winner"
                    );
                    continue;
                }
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    self.persist(&candidate)?;
                    self.store
                        .put_raw(&active_key(user_id), candidate.id.as_bytes())?;
                    self.pairs.insert(candidate.id.clone(), candidate.clone());
                    slot.insert(candidate.id.clone());
                    tracing::info!(
                        user_id,
                        seed_pair_id = %candidate.id,
                        "created active seed pair"
                    );
                    return Ok(candidate);
                }
            }
        }
        Err(SeedError::SeedConflict {
            user_id: user_id.to_string(),
        }
        .into())
    }

    /// Atomically increment and return the next nonce for a pair.
    ///
    /// The exclusive map guard serializes reservations per pair; the new
    /// value is persisted before it is handed out. Retired pairs refuse:
    /// their server seed may already be revealed, and a revealed seed must
    /// never produce another outcome.
    pub fn reserve_next_nonce(&self, seed_pair_id: &str) -> CoreResult<u64> {
        if !self.ensure_cached(seed_pair_id)? {
            return Err(SeedError::NotFound {
                seed_pair_id: seed_pair_id.to_string(),
            }
            .into());
        }
        let mut pair = self
            .pairs
            .get_mut(seed_pair_id)
            .expect("cached above");
        if !pair.is_active {
            return Err(SeedError::SeedRetired {
                seed_pair_id: seed_pair_id.to_string(),
            }
            .into());
        }
        let next = pair.nonce.checked_add(1).ok_or(GameError::NonceExhausted {
            seed_pair_id: seed_pair_id.to_string(),
        })?;
        pair.nonce = next;
        self.persist(&pair)?;
        Ok(next)
    }

    /// Retire the current active pair (making its server seed revealable)
    /// and create a fresh one. Fails if the user has no active pair.
    ///
    /// The whole retire-and-replace runs under the user's index entry guard,
    /// so concurrent rotations serialize: the second retires the first one's
    /// replacement rather than re-retiring the same pair, and exactly one
    /// pair per user is active afterwards.
    pub fn rotate(
        &self,
        user_id: &str,
        new_client_seed: Option<String>,
    ) -> CoreResult<(SeedPair, SeedPair)> {
        // Warm the index from the store so a post-restart rotate still sees
        // the persisted active pair.
        self.active_pair_id(user_id)?;

        match self.active_by_user.entry(user_id.to_string()) {
            dashmap::mapref::entry::Entry::Vacant(_) => Err(SeedError::NoActivePair {
                user_id: user_id.to_string(),
            }
            .into()),
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                let active_id = slot.get().clone();
                if !self.ensure_cached(&active_id)? {
                    return Err(SeedError::NotFound {
                        seed_pair_id: active_id,
                    }
                    .into());
                }
                let retired = {
                    let mut pair = self.pairs.get_mut(&active_id).expect("cached above");
                    pair.is_active = false;
                    self.persist(&pair)?;
                    pair.clone()
                };

                let replacement =
                    SeedPair::generate(user_id, new_client_seed.unwrap_or_default());
                self.persist(&replacement)?;
                self.store
                    .put_raw(&active_key(user_id), replacement.id.as_bytes())?;
                self.pairs
                    .insert(replacement.id.clone(), replacement.clone());
                slot.insert(replacement.id.clone());

                tracing::info!(
                    user_id,
                    retired = %retired.id,
                    replacement = %replacement.id,
                    "rotated seed pair"
                );
                Ok((retired, replacement))
            }
        }
    }

    /// Update the client seed on the active pair without rotating.
    pub fn set_client_seed(&self, user_id: &str, client_seed: String) -> CoreResult<SeedPair> {
        let Some(active_id) = self.active_pair_id(user_id)? else {
            return Err(SeedError::NoActivePair {
                user_id: user_id.to_string(),
            }
            .into());
        };
        let mut pair = self
            .pairs
            .get_mut(&active_id)
            .ok_or_else(|| SeedError::NotFound {
                seed_pair_id: active_id.clone(),
            })?;
        pair.client_seed = client_seed;
        self.persist(&pair)?;
        Ok(pair.clone())
    }

    /// Reveal the server seed of a retired pair. Revealing an active pair is
    /// refused by policy, not by accident.
    pub fn reveal_and_verify(&self, seed_pair_id: &str) -> CoreResult<RevealedSeed> {
        let pair = self.get_pair(seed_pair_id)?;
        if pair.is_active {
            return Err(SeedError::SeedStillActive {
                seed_pair_id: seed_pair_id.to_string(),
            }
            .into());
        }
        Ok(RevealedSeed {
            seed_pair_id: pair.id.clone(),
            server_seed_hex: hex::encode(&pair.server_seed),
            server_seed_hash: pair.server_seed_hash.clone(),
            hash_matches: pair.hash_matches(),
        })
    }

    /// Operational escape hatch: overwrite a pair's nonce outside the normal
    /// reservation path. Bypasses the monotonicity invariant; only reachable
    /// through the separately gated admin route, never from bet placement.
    pub fn admin_override_nonce(&self, seed_pair_id: &str, nonce: u64) -> CoreResult<SeedPair> {
        if !self.ensure_cached(seed_pair_id)? {
            return Err(SeedError::NotFound {
                seed_pair_id: seed_pair_id.to_string(),
            }
            .into());
        }
        let mut pair = self.pairs.get_mut(seed_pair_id).expect("cached above");
        tracing::warn!(
            seed_pair_id,
            old_nonce = pair.nonce,
            new_nonce = nonce,
            "admin nonce override applied"
        );
        pair.nonce = nonce;
        self.persist(&pair)?;
        Ok(pair.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreError;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn manager() -> (Arc<SeedPairManager>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path(), false).unwrap();
        (Arc::new(SeedPairManager::new(store)), dir)
    }

    #[test]
    fn test_create_commits_hash() {
        let (mgr, _dir) = manager();
        let pair = mgr.get_or_create_active("alice").unwrap();
        assert!(pair.is_active);
        assert_eq!(pair.nonce, 0);
        assert_eq!(pair.server_seed.len(), 32);
        assert!(pair.hash_matches());
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (mgr, _dir) = manager();
        let first = mgr.get_or_create_active("alice").unwrap();
        let second = mgr.get_or_create_active("alice").unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_single_active_pair_under_concurrent_creation() {
        let (mgr, _dir) = manager();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let mgr = mgr.clone();
            handles.push(std::thread::spawn(move || {
                mgr.get_or_create_active("bob").unwrap().id
            }));
        }
        let ids: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 1, "concurrent creation produced multiple pairs");
    }

    #[test]
    fn test_nonce_reservation_is_gapless_and_unique() {
        let (mgr, _dir) = manager();
        let pair = mgr.get_or_create_active("carol").unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mgr = mgr.clone();
            let id = pair.id.clone();
            handles.push(std::thread::spawn(move || {
                (0..25)
                    .map(|_| mgr.reserve_next_nonce(&id).unwrap())
                    .collect::<Vec<u64>>()
            }));
        }
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        let expected: Vec<u64> = (1..=200).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_rotate_retires_and_replaces() {
        let (mgr, _dir) = manager();
        let original = mgr.get_or_create_active("dave").unwrap();
        let (retired, replacement) = mgr
            .rotate("dave", Some("my-lucky-seed".to_string()))
            .unwrap();

        assert_eq!(retired.id, original.id);
        assert!(!retired.is_active);
        assert!(replacement.is_active);
        assert_eq!(replacement.client_seed, "my-lucky-seed");
        assert_ne!(retired.server_seed, replacement.server_seed);

        let active = mgr.get_or_create_active("dave").unwrap();
        assert_eq!(active.id, replacement.id);
    }

    #[test]
    fn test_concurrent_rotations_leave_one_active_pair() {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path(), false).unwrap();
        let mgr = Arc::new(SeedPairManager::new(store.clone()));
        mgr.get_or_create_active("iris").unwrap();

        let barrier = Arc::new(std::sync::Barrier::new(8));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let mgr = mgr.clone();
            let barrier = barrier.clone();
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                mgr.rotate("iris", None).unwrap()
            }));
        }
        let rotations: Vec<(SeedPair, SeedPair)> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Rotations serialized: each retired a distinct pair.
        let retired: HashSet<String> = rotations.iter().map(|(r, _)| r.id.clone()).collect();
        assert_eq!(retired.len(), 8);

        // Exactly one persisted row stays active, and the index points at it.
        let rows = store.scan_prefix(b"seed:pair:", None, 100);
        assert_eq!(rows.len(), 9);
        let active: Vec<SeedPair> = rows
            .iter()
            .map(|(_, v)| bincode::deserialize::<SeedPair>(v).unwrap())
            .filter(|p| p.is_active)
            .collect();
        assert_eq!(active.len(), 1, "rotation left multiple active pairs");
        assert_eq!(mgr.get_or_create_active("iris").unwrap().id, active[0].id);
    }

    #[test]
    fn test_retired_pair_refuses_nonces() {
        let (mgr, _dir) = manager();
        let pair = mgr.get_or_create_active("judy").unwrap();
        mgr.reserve_next_nonce(&pair.id).unwrap();
        mgr.rotate("judy", None).unwrap();

        let err = mgr.reserve_next_nonce(&pair.id).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Seed(SeedError::SeedRetired { .. })
        ));
        // The retired counter is untouched.
        assert_eq!(mgr.get_pair(&pair.id).unwrap().nonce, 1);
    }

    #[test]
    fn test_rotate_without_active_pair_fails() {
        let (mgr, _dir) = manager();
        let err = mgr.rotate("nobody", None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Seed(SeedError::NoActivePair { .. })
        ));
    }

    #[test]
    fn test_reveal_refused_while_active() {
        let (mgr, _dir) = manager();
        let pair = mgr.get_or_create_active("erin").unwrap();
        let err = mgr.reveal_and_verify(&pair.id).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Seed(SeedError::SeedStillActive { .. })
        ));
    }

    #[test]
    fn test_reveal_after_rotation_verifies() {
        let (mgr, _dir) = manager();
        let pair = mgr.get_or_create_active("frank").unwrap();
        mgr.rotate("frank", None).unwrap();

        let revealed = mgr.reveal_and_verify(&pair.id).unwrap();
        assert!(revealed.hash_matches);
        assert_eq!(revealed.server_seed_hex, hex::encode(&pair.server_seed));
        assert_eq!(
            revealed.server_seed_hash,
            hex::encode(Sha256::digest(&pair.server_seed))
        );
    }

    #[test]
    fn test_pairs_survive_restart() {
        let dir = TempDir::new().unwrap();
        let pair_id;
        {
            let store = RecordStore::open(dir.path(), false).unwrap();
            let mgr = SeedPairManager::new(store);
            let pair = mgr.get_or_create_active("grace").unwrap();
            mgr.reserve_next_nonce(&pair.id).unwrap();
            pair_id = pair.id;
        }
        let store = RecordStore::open(dir.path(), false).unwrap();
        let mgr = SeedPairManager::new(store);
        let reloaded = mgr.get_pair(&pair_id).unwrap();
        assert_eq!(reloaded.nonce, 1);
        let active = mgr.get_or_create_active("grace").unwrap();
        assert_eq!(active.id, pair_id);
    }

    #[test]
    fn test_admin_override_bypasses_reservation() {
        let (mgr, _dir) = manager();
        let pair = mgr.get_or_create_active("henry").unwrap();
        mgr.admin_override_nonce(&pair.id, 500).unwrap();
        assert_eq!(mgr.reserve_next_nonce(&pair.id).unwrap(), 501);
    }
}
