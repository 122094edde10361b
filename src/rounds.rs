//! Round records and the global round counter.
//!
//! Every settled bet writes exactly one [`RoundRecord`] keyed by
//! `(session_id, step)`. Rows are write-once: a second write for the same
//! step is rejected, never overwritten, so the audit trail cannot be
//! rewritten after the fact. The global round counter is its own persisted
//! entity and survives restarts, giving every round a unique id across all
//! sessions.

use crate::errors::{CoreResult, ReplayError, StorageError};
use crate::fair::types::{GameParams, MappedResult};
use crate::ledger::Asset;
use crate::storage::RecordStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

const ROUND_PREFIX: &str = "round:rec:";
const COUNTER_KEY: &[u8] = b"round:counter";

fn round_key(session_id: &str, step: u64) -> Vec<u8> {
    // Zero-padded step keeps lexicographic order equal to numeric order.
    format!("{}{}:{:010}", ROUND_PREFIX, session_id, step).into_bytes()
}

fn session_prefix(session_id: &str) -> Vec<u8> {
    format!("{}{}:", ROUND_PREFIX, session_id).into_bytes()
}

/// Immutable record of one settled round, holding everything a replay needs
/// to recompute the outcome once the server seed is revealed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundRecord {
    /// Globally unique, monotonically increasing round id.
    pub round_id: u64,
    pub session_id: String,
    pub step: u64,
    pub user_id: String,
    pub seed_pair_id: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    pub params: GameParams,
    pub result: MappedResult,
    pub payout_multiplier: f64,
    pub asset: Asset,
    /// Stake in minor units (positive).
    pub stake: i64,
    /// Credited payout in minor units (0 on loss).
    pub payout: i64,
    pub bet_operation_id: String,
    pub win_operation_id: String,
    pub created_at: DateTime<Utc>,
}

pub struct RoundLog {
    store: RecordStore,
    /// Guards the read-increment-persist of the counter entity.
    counter: Mutex<u64>,
}

impl RoundLog {
    pub fn open(store: RecordStore) -> CoreResult<Self> {
        let start = match store.get_raw(COUNTER_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StorageError::CorruptedData("round counter is not 8 bytes".to_string())
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        Ok(Self {
            store,
            counter: Mutex::new(start),
        })
    }

    /// Reserve the next global round id, persisting the counter before the
    /// id is handed out.
    pub fn next_round_id(&self) -> CoreResult<u64> {
        let mut counter = self.counter.lock().unwrap_or_else(|p| p.into_inner());
        let next = *counter + 1;
        self.store.put_raw(COUNTER_KEY, &next.to_be_bytes())?;
        *counter = next;
        Ok(next)
    }

    /// Write a round row. Fails if `(session_id, step)` already exists.
    ///
    /// The existence check and the put run under the counter mutex so two
    /// concurrent writers for the same step cannot both pass the check; the
    /// loser gets `StepAlreadyRecorded` and the winner's row is never
    /// overwritten.
    pub fn record(&self, record: &RoundRecord) -> CoreResult<()> {
        let _guard = self.counter.lock().unwrap_or_else(|p| p.into_inner());
        let key = round_key(&record.session_id, record.step);
        if self.store.get_raw(&key)?.is_some() {
            return Err(ReplayError::StepAlreadyRecorded {
                session_id: record.session_id.clone(),
                step: record.step,
            }
            .into());
        }
        self.store.put_record(&key, record)
    }

    pub fn get(&self, session_id: &str, step: u64) -> CoreResult<Option<RoundRecord>> {
        self.store.get_record(&round_key(session_id, step))
    }

    /// All rounds of a session within `[from_step, to_step]`, ordered by step.
    pub fn session_range(
        &self,
        session_id: &str,
        from_step: u64,
        to_step: u64,
        limit: usize,
    ) -> CoreResult<Vec<RoundRecord>> {
        if from_step > to_step {
            return Err(ReplayError::InvalidRange {
                from: from_step,
                to: to_step,
            }
            .into());
        }
        let prefix = session_prefix(session_id);
        let cursor = round_key(session_id, from_step);
        // scan_prefix resumes after the cursor, so fetch from_step directly.
        let mut out = Vec::new();
        if let Some(first) = self.get(session_id, from_step)? {
            out.push(first);
        }
        for (_key, value) in self.store.scan_prefix(&prefix, Some(&cursor), limit) {
            let record: RoundRecord = bincode::deserialize(&value)
                .map_err(|e| StorageError::CorruptedData(format!("round row: {}", e)))?;
            if record.step > to_step || out.len() >= limit {
                break;
            }
            out.push(record);
        }
        Ok(out)
    }
}
