//! Request and response DTOs.
//!
//! Amounts cross the wire as decimal strings and are parsed against the
//! asset's scale at the boundary; everything past the handlers is minor
//! units. Seed pair views never include the server seed itself.

use crate::fair::types::GameParams;
use crate::ledger::{format_amount, Asset, BalanceOperation};
use crate::seeds::{RevealedSeed, SeedPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Public view of a seed pair. The raw server seed is deliberately absent;
/// retired seeds are revealed through the verify endpoint only.
#[derive(Debug, Serialize)]
pub struct SeedPairView {
    pub seed_pair_id: String,
    pub user_id: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<SeedPair> for SeedPairView {
    fn from(pair: SeedPair) -> Self {
        Self {
            seed_pair_id: pair.id,
            user_id: pair.user_id,
            server_seed_hash: pair.server_seed_hash,
            client_seed: pair.client_seed,
            nonce: pair.nonce,
            is_active: pair.is_active,
            created_at: pair.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RotateSeedRequest {
    pub user_id: String,
    pub client_seed: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RotateSeedResponse {
    /// The retired pair with its server seed revealed for verification.
    pub revealed: RevealedSeed,
    pub replacement: SeedPairView,
}

#[derive(Debug, Deserialize)]
pub struct SetClientSeedRequest {
    pub user_id: String,
    pub client_seed: String,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBetHttpRequest {
    pub user_id: String,
    pub session_id: String,
    pub step: u64,
    pub asset: String,
    /// Decimal stake, e.g. "0.00025000".
    pub stake: String,
    pub params: GameParams,
}

#[derive(Debug, Serialize)]
pub struct BetResponse {
    pub round_id: u64,
    pub session_id: String,
    pub step: u64,
    pub seed_pair_id: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    pub result: crate::fair::types::MappedResult,
    pub payout_multiplier: f64,
    pub asset: String,
    pub stake: String,
    pub payout: String,
    pub balance: String,
    pub replayed: bool,
}

impl BetResponse {
    pub fn new(receipt: crate::bets::BetReceipt, asset: Asset) -> Self {
        Self {
            round_id: receipt.round_id,
            session_id: receipt.session_id,
            step: receipt.step,
            seed_pair_id: receipt.seed_pair_id,
            server_seed_hash: receipt.server_seed_hash,
            client_seed: receipt.client_seed,
            nonce: receipt.nonce,
            result: receipt.result,
            payout_multiplier: receipt.payout_multiplier,
            asset: asset.to_string(),
            stake: format_amount(asset, receipt.stake),
            payout: format_amount(asset, receipt.payout),
            balance: format_amount(asset, receipt.resulting_balance),
            replayed: receipt.replayed,
        }
    }
}

/// Verification view of a seed pair. Active pairs expose only the hash
/// commitment; retired pairs include the seed and the recomputed check.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub seed_pair_id: String,
    pub is_active: bool,
    pub server_seed_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_seed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_matches: Option<bool>,
}

/// Funding request, used for both deposits and withdrawals. The amount is
/// always a positive decimal; the operation type decides the sign.
#[derive(Debug, Deserialize)]
pub struct FundsRequest {
    /// Client-generated idempotency key for this operation.
    pub operation_id: String,
    pub user_id: String,
    pub asset: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub user_id: String,
    pub asset: String,
    pub balance: String,
    pub balance_minor: i64,
}

#[derive(Debug, Serialize)]
pub struct OperationView {
    pub operation_id: String,
    pub operation_type: crate::ledger::OperationType,
    pub amount: String,
    pub previous_balance: String,
    pub resulting_balance: String,
    pub created_at: DateTime<Utc>,
}

impl OperationView {
    pub fn new(op: BalanceOperation) -> Self {
        Self {
            operation_id: op.operation_id,
            operation_type: op.operation_type,
            amount: format_amount(op.asset, op.amount),
            previous_balance: format_amount(op.asset, op.previous_balance),
            resulting_balance: format_amount(op.asset, op.resulting_balance),
            created_at: op.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OperationsResponse {
    pub user_id: String,
    pub asset: String,
    pub operations: Vec<OperationView>,
}

#[derive(Debug, Deserialize)]
pub struct OperationsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ReplayRangeQuery {
    pub from_step: Option<u64>,
    pub to_step: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ReplayBatchRequest {
    pub queries: Vec<crate::replay::ReplayQuery>,
}

/// Nonce override payload. `confirm` must be explicitly true; the override
/// bypasses nonce monotonicity and is logged at warn level.
#[derive(Debug, Deserialize)]
pub struct AdminNonceRequest {
    pub nonce: u64,
    #[serde(default)]
    pub confirm: bool,
}
