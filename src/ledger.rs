//! Atomic, idempotent balance ledger.
//!
//! Every balance change is one append-only [`BalanceOperation`] row keyed by
//! a globally unique `operation_id`. Retrying a known id returns the stored
//! row instead of re-applying. A wallet is the sole mutable aggregate; its
//! balance always equals the running sum of its operation amounts.
//!
//! Concurrency is optimistic: read a versioned snapshot, compute, then
//! commit under the exclusive map guard only if the version is unchanged.
//! A moved version retries with exponential backoff up to a bounded attempt
//! count before surfacing `LedgerConflict` as a transient failure.

use crate::config::LedgerConfig;
use crate::errors::{CoreResult, LedgerError, StorageError};
use crate::storage::RecordStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const OPERATION_PREFIX: &str = "ledger:op:";
const WALLET_PREFIX: &str = "ledger:wallet:";
const HISTORY_PREFIX: &str = "ledger:hist:";

/// Supported assets with their minor-unit scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Btc,
    Eth,
    Sol,
    Usdc,
    Usd,
}

impl Asset {
    /// Decimal places carried per asset: 8 for crypto, 2 for fiat-derived.
    pub fn scale(&self) -> u32 {
        match self {
            Asset::Btc | Asset::Eth | Asset::Sol => 8,
            Asset::Usdc | Asset::Usd => 2,
        }
    }

    fn minor_per_unit(&self) -> i64 {
        10i64.pow(self.scale())
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
            Asset::Sol => "SOL",
            Asset::Usdc => "USDC",
            Asset::Usd => "USD",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Asset {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BTC" => Ok(Asset::Btc),
            "ETH" => Ok(Asset::Eth),
            "SOL" => Ok(Asset::Sol),
            "USDC" => Ok(Asset::Usdc),
            "USD" => Ok(Asset::Usd),
            other => Err(LedgerError::UnknownAsset(other.to_string())),
        }
    }
}

/// Parse a decimal string into minor units for `asset`, rejecting excess
/// precision rather than silently rounding.
pub fn parse_amount(asset: Asset, value: &str) -> Result<i64, LedgerError> {
    let trimmed = value.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(LedgerError::PrecisionExceeded {
            value: value.to_string(),
            scale: asset.scale(),
        });
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(LedgerError::NonFiniteAmount);
    }
    if frac.len() > asset.scale() as usize {
        return Err(LedgerError::PrecisionExceeded {
            value: value.to_string(),
            scale: asset.scale(),
        });
    }

    let whole_part: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| LedgerError::NonFiniteAmount)?
    };
    let mut frac_part: i64 = if frac.is_empty() {
        0
    } else {
        frac.parse().map_err(|_| LedgerError::NonFiniteAmount)?
    };
    frac_part *= 10i64.pow(asset.scale() - frac.len() as u32);

    let minor = whole_part
        .checked_mul(asset.minor_per_unit())
        .and_then(|w| w.checked_add(frac_part))
        .ok_or(LedgerError::NonFiniteAmount)?;
    Ok(if negative { -minor } else { minor })
}

/// Render minor units back to a decimal string.
pub fn format_amount(asset: Asset, minor: i64) -> String {
    let unit = asset.minor_per_unit();
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let whole = abs / unit as u64;
    let frac = abs % unit as u64;
    format!(
        "{}{}.{:0width$}",
        sign,
        whole,
        frac,
        width = asset.scale() as usize
    )
}

/// Ledger operation kinds. `privileged` types may drive a balance negative
/// (incident corrections); everything else is floor-checked at zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Bet,
    Win,
    Deposit,
    Withdraw,
    Correction,
}

impl OperationType {
    pub fn privileged(&self) -> bool {
        matches!(self, OperationType::Correction)
    }
}

/// Append-only ledger row. Never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceOperation {
    pub operation_id: String,
    pub user_id: String,
    pub asset: Asset,
    pub operation_type: OperationType,
    /// Signed amount in minor units.
    pub amount: i64,
    pub previous_balance: i64,
    pub resulting_balance: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// One leg of an apply call.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub operation_id: String,
    pub operation_type: OperationType,
    pub amount: i64,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalletEntry {
    balance: i64,
    /// Bumped on every commit; the optimistic check compares it.
    version: u64,
}

fn wallet_cache_key(user_id: &str, asset: Asset) -> (String, Asset) {
    (user_id.to_string(), asset)
}

fn operation_key(operation_id: &str) -> Vec<u8> {
    format!("{}{}", OPERATION_PREFIX, operation_id).into_bytes()
}

fn wallet_key(user_id: &str, asset: Asset) -> Vec<u8> {
    format!("{}{}:{}", WALLET_PREFIX, user_id, asset).into_bytes()
}

fn history_key(user_id: &str, asset: Asset, seq: u64) -> Vec<u8> {
    // Inverted sequence sorts newest-first under a forward scan.
    format!(
        "{}{}:{}:{:020}",
        HISTORY_PREFIX,
        user_id,
        asset,
        u64::MAX - seq
    )
    .into_bytes()
}

fn history_prefix(user_id: &str, asset: Asset) -> Vec<u8> {
    format!("{}{}:{}:", HISTORY_PREFIX, user_id, asset).into_bytes()
}

pub struct BalanceLedger {
    store: RecordStore,
    wallets: DashMap<(String, Asset), WalletEntry>,
    operations: DashMap<String, BalanceOperation>,
    config: LedgerConfig,
}

impl BalanceLedger {
    pub fn new(store: RecordStore, config: LedgerConfig) -> Self {
        Self {
            store,
            wallets: DashMap::new(),
            operations: DashMap::new(),
            config,
        }
    }

    fn load_operation(&self, operation_id: &str) -> CoreResult<Option<BalanceOperation>> {
        if let Some(op) = self.operations.get(operation_id) {
            return Ok(Some(op.clone()));
        }
        if let Some(op) = self
            .store
            .get_record::<BalanceOperation>(&operation_key(operation_id))?
        {
            self.operations
                .entry(operation_id.to_string())
                .or_insert(op.clone());
            return Ok(Some(op));
        }
        Ok(None)
    }

    fn snapshot(&self, user_id: &str, asset: Asset) -> CoreResult<WalletEntry> {
        let key = wallet_cache_key(user_id, asset);
        if let Some(entry) = self.wallets.get(&key) {
            return Ok(entry.clone());
        }
        if let Some(entry) = self
            .store
            .get_record::<WalletEntry>(&wallet_key(user_id, asset))?
        {
            self.wallets.entry(key).or_insert(entry.clone());
            return Ok(entry);
        }
        Ok(WalletEntry {
            balance: 0,
            version: 0,
        })
    }

    /// Current balance in minor units.
    pub fn balance(&self, user_id: &str, asset: Asset) -> CoreResult<i64> {
        Ok(self.snapshot(user_id, asset)?.balance)
    }

    /// Apply a single balance operation.
    pub fn apply(
        &self,
        operation_id: &str,
        user_id: &str,
        asset: Asset,
        amount: i64,
        operation_type: OperationType,
        metadata: Option<serde_json::Value>,
    ) -> CoreResult<BalanceOperation> {
        let rows = self.apply_composite(
            user_id,
            asset,
            vec![OperationRequest {
                operation_id: operation_id.to_string(),
                operation_type,
                amount,
                metadata,
            }],
        )?;
        Ok(rows.into_iter().next().expect("one request, one row"))
    }

    /// Apply several legs against one `(user, asset)` wallet as a unit:
    /// either every leg lands or none does. A bet that debits the wager and
    /// credits the win goes through here.
    pub fn apply_composite(
        &self,
        user_id: &str,
        asset: Asset,
        requests: Vec<OperationRequest>,
    ) -> CoreResult<Vec<BalanceOperation>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        // Idempotent replay: composite commits are all-or-nothing, so the
        // first leg existing means the whole call already applied.
        if let Some(existing) = self.load_operation(&requests[0].operation_id)? {
            tracing::debug!(
                operation_id = %existing.operation_id,
                "duplicate operation, returning stored result"
            );
            let mut rows = vec![existing];
            for req in &requests[1..] {
                let row = self.load_operation(&req.operation_id)?.ok_or_else(|| {
                    StorageError::CorruptedData(format!(
                        "composite leg {} missing for replayed operation",
                        req.operation_id
                    ))
                })?;
                rows.push(row);
            }
            return Ok(rows);
        }

        let mut attempt: u32 = 0;
        loop {
            let snapshot = self.snapshot(user_id, asset)?;
            match self.try_commit(user_id, asset, &requests, &snapshot)? {
                CommitOutcome::Applied(rows) => return Ok(rows),
                CommitOutcome::Replayed(rows) => return Ok(rows),
                CommitOutcome::Conflict => {
                    attempt += 1;
                    if attempt >= self.config.max_commit_attempts {
                        crate::metrics::LEDGER_CONFLICTS.inc();
                        return Err(LedgerError::LedgerConflict {
                            user_id: user_id.to_string(),
                            asset: asset.to_string(),
                            attempts: attempt,
                        }
                        .into());
                    }
                    // Cap the exponent so large attempt budgets stay sane.
                    let backoff = self.config.backoff_base_ms << (attempt - 1).min(6);
                    tracing::debug!(user_id, %asset, attempt, backoff_ms = backoff, "ledger commit conflict, backing off");
                    std::thread::sleep(Duration::from_millis(backoff));
                }
            }
        }
    }

    fn try_commit(
        &self,
        user_id: &str,
        asset: Asset,
        requests: &[OperationRequest],
        snapshot: &WalletEntry,
    ) -> CoreResult<CommitOutcome> {
        // Compute the full chain from the snapshot before taking the guard.
        let mut balance = snapshot.balance;
        let now = Utc::now();
        let mut rows = Vec::with_capacity(requests.len());
        for req in requests {
            let next = balance.checked_add(req.amount).ok_or(LedgerError::NonFiniteAmount)?;
            if next < 0 && !req.operation_type.privileged() {
                return Err(LedgerError::InsufficientFunds {
                    balance,
                    requested: req.amount,
                }
                .into());
            }
            rows.push(BalanceOperation {
                operation_id: req.operation_id.clone(),
                user_id: user_id.to_string(),
                asset,
                operation_type: req.operation_type,
                amount: req.amount,
                previous_balance: balance,
                resulting_balance: next,
                created_at: now,
                metadata: req.metadata.clone(),
            });
            balance = next;
        }

        let key = wallet_cache_key(user_id, asset);
        let mut entry = self.wallets.entry(key).or_insert(WalletEntry {
            balance: snapshot.balance,
            version: snapshot.version,
        });

        // Another writer may have won between snapshot and guard.
        if entry.version != snapshot.version {
            return Ok(CommitOutcome::Conflict);
        }
        // Same operation may have landed through another process path. A
        // first leg without its siblings breaks the all-or-nothing batch
        // guarantee and is corruption, not a replay.
        if let Some(existing) = self.load_operation(&requests[0].operation_id)? {
            drop(entry);
            let mut stored = vec![existing];
            for req in &requests[1..] {
                let row = self.load_operation(&req.operation_id)?.ok_or_else(|| {
                    StorageError::CorruptedData(format!(
                        "composite leg {} missing for replayed operation",
                        req.operation_id
                    ))
                })?;
                stored.push(row);
            }
            return Ok(CommitOutcome::Replayed(stored));
        }

        // Persist the rows, the history index, and the wallet as one batch.
        let new_entry = WalletEntry {
            balance,
            version: snapshot.version + rows.len() as u64,
        };
        let mut batch: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(rows.len() * 2 + 1);
        for (i, row) in rows.iter().enumerate() {
            let encoded = bincode::serialize(row)
                .map_err(|e| StorageError::WriteFailed(format!("encode op row: {}", e)))?;
            batch.push((operation_key(&row.operation_id), encoded));
            batch.push((
                history_key(user_id, asset, snapshot.version + 1 + i as u64),
                row.operation_id.clone().into_bytes(),
            ));
        }
        batch.push((
            wallet_key(user_id, asset),
            bincode::serialize(&new_entry)
                .map_err(|e| StorageError::WriteFailed(format!("encode wallet: {}", e)))?,
        ));
        self.store.batch_write(&batch)?;

        entry.balance = new_entry.balance;
        entry.version = new_entry.version;
        drop(entry);

        for row in &rows {
            self.operations
                .insert(row.operation_id.clone(), row.clone());
        }
        Ok(CommitOutcome::Applied(rows))
    }

    /// Recent operations for a wallet, newest first.
    pub fn recent_operations(
        &self,
        user_id: &str,
        asset: Asset,
        limit: usize,
    ) -> CoreResult<Vec<BalanceOperation>> {
        let prefix = history_prefix(user_id, asset);
        let rows = self.store.scan_prefix(&prefix, None, limit.max(1));
        let mut out = Vec::with_capacity(rows.len());
        for (_key, value) in rows {
            let op_id = String::from_utf8_lossy(&value).to_string();
            if let Some(op) = self.load_operation(&op_id)? {
                out.push(op);
            }
        }
        Ok(out)
    }
}

enum CommitOutcome {
    Applied(Vec<BalanceOperation>),
    Replayed(Vec<BalanceOperation>),
    Conflict,
}
