//! Bet placement: the path that ties seeds, mappers, ledger, and round log
//! together.
//!
//! Ordering is deliberate: parameters are validated before a nonce is
//! reserved (bad params never burn a nonce), the nonce is reserved before
//! any money moves, and the ledger settles before the round row is written.
//! `(session_id, step)` doubles as the idempotency key: replaying a settled
//! step returns the stored receipt without touching the seed or the wallet.

use crate::errors::{CoreError, CoreResult, GameError, SeedError};
use crate::fair::types::{GameOutcome, GameParams, MappedResult};
use crate::fair::{generate_outcome, validate_params};
use crate::ledger::{Asset, BalanceLedger, OperationRequest, OperationType};
use crate::metrics;
use crate::rounds::{RoundLog, RoundRecord};
use crate::seeds::SeedPairManager;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceBetRequest {
    pub user_id: String,
    pub session_id: String,
    pub step: u64,
    pub asset: Asset,
    /// Stake in minor units, must be positive.
    pub stake: i64,
    pub params: GameParams,
}

/// Everything the client needs to verify the round later.
#[derive(Debug, Clone, Serialize)]
pub struct BetReceipt {
    pub round_id: u64,
    pub session_id: String,
    pub step: u64,
    pub seed_pair_id: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64,
    pub result: MappedResult,
    pub payout_multiplier: f64,
    pub stake: i64,
    pub payout: i64,
    pub resulting_balance: i64,
    /// True when this call replayed an already-settled step.
    pub replayed: bool,
}

/// Convert a stake and multiplier into a payout in minor units, rounding
/// down so fractional minor units always favor the house.
fn payout_minor(stake: i64, multiplier: f64) -> i64 {
    (stake as f64 * multiplier).floor() as i64
}

/// Attempts to reserve a nonce before giving up on rotation races.
const SEED_RESOLVE_ATTEMPTS: u32 = 3;

fn bet_operation_id(session_id: &str, step: u64) -> String {
    format!("{}:{}:bet", session_id, step)
}

fn win_operation_id(session_id: &str, step: u64) -> String {
    format!("{}:{}:win", session_id, step)
}

pub struct BetService {
    seeds: Arc<SeedPairManager>,
    ledger: Arc<BalanceLedger>,
    rounds: Arc<RoundLog>,
}

impl BetService {
    pub fn new(
        seeds: Arc<SeedPairManager>,
        ledger: Arc<BalanceLedger>,
        rounds: Arc<RoundLog>,
    ) -> Self {
        Self {
            seeds,
            ledger,
            rounds,
        }
    }

    pub fn place_bet(&self, request: PlaceBetRequest) -> CoreResult<BetReceipt> {
        let timer = metrics::BET_LATENCY.start_timer();
        let result = self.place_bet_inner(request);
        timer.observe_duration();
        if result.is_err() {
            metrics::BETS_REJECTED.inc();
        }
        result
    }

    fn place_bet_inner(&self, request: PlaceBetRequest) -> CoreResult<BetReceipt> {
        // Settled steps replay from the round log.
        if let Some(record) = self.rounds.get(&request.session_id, request.step)? {
            metrics::IDEMPOTENT_REPLAYS.inc();
            tracing::debug!(
                session_id = %request.session_id,
                step = request.step,
                "replaying settled round"
            );
            let balance = self.ledger.balance(&record.user_id, record.asset)?;
            return Ok(receipt_from_record(record, balance, true));
        }

        validate_params(&request.params)?;
        if request.stake <= 0 {
            return Err(GameError::InvalidGameParams(format!(
                "stake must be positive, got {}",
                request.stake
            ))
            .into());
        }

        let (pair, nonce) = self.reserve_on_active_pair(&request.user_id)?;

        let outcome: GameOutcome =
            generate_outcome(&pair.server_seed, &pair.client_seed, nonce, &request.params)?;
        let payout = payout_minor(request.stake, outcome.payout_multiplier);

        let mut legs = vec![OperationRequest {
            operation_id: bet_operation_id(&request.session_id, request.step),
            operation_type: OperationType::Bet,
            amount: -request.stake,
            metadata: Some(serde_json::json!({
                "session_id": request.session_id,
                "step": request.step,
                "game": request.params.game_type().to_string(),
            })),
        }];
        if payout > 0 {
            legs.push(OperationRequest {
                operation_id: win_operation_id(&request.session_id, request.step),
                operation_type: OperationType::Win,
                amount: payout,
                metadata: None,
            });
        }
        let rows = self
            .ledger
            .apply_composite(&request.user_id, request.asset, legs)?;
        let resulting_balance = rows
            .last()
            .map(|r| r.resulting_balance)
            .unwrap_or_default();

        let round_id = self.rounds.next_round_id()?;
        let record = RoundRecord {
            round_id,
            session_id: request.session_id.clone(),
            step: request.step,
            user_id: request.user_id.clone(),
            seed_pair_id: pair.id.clone(),
            server_seed_hash: pair.server_seed_hash.clone(),
            client_seed: pair.client_seed.clone(),
            nonce,
            params: request.params.clone(),
            result: outcome.result.clone(),
            payout_multiplier: outcome.payout_multiplier,
            asset: request.asset,
            stake: request.stake,
            payout,
            bet_operation_id: bet_operation_id(&request.session_id, request.step),
            win_operation_id: win_operation_id(&request.session_id, request.step),
            created_at: Utc::now(),
        };
        self.rounds.record(&record)?;

        metrics::BETS_PLACED
            .with_label_values(&[&request.params.game_type().to_string()])
            .inc();
        tracing::info!(
            round_id,
            user_id = %request.user_id,
            game = %request.params.game_type(),
            nonce,
            payout,
            "bet settled"
        );
        Ok(receipt_from_record(record, resulting_balance, false))
    }

    /// Resolve the user's active pair and reserve a nonce on it.
    ///
    /// A rotation can retire the pair between resolution and reservation.
    /// The retired pair refuses the nonce, so re-resolve and reserve on the
    /// replacement; the window is one rotation wide per attempt.
    fn reserve_on_active_pair(&self, user_id: &str) -> CoreResult<(crate::seeds::SeedPair, u64)> {
        for _ in 0..SEED_RESOLVE_ATTEMPTS {
            let pair = self.seeds.get_or_create_active(user_id)?;
            match self.seeds.reserve_next_nonce(&pair.id) {
                Ok(nonce) => return Ok((pair, nonce)),
                Err(CoreError::Seed(SeedError::SeedRetired { seed_pair_id })) => {
                    tracing::debug!(
                        user_id,
                        seed_pair_id,
                        "pair retired mid-bet, re-resolving active pair"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Err(SeedError::SeedConflict {
            user_id: user_id.to_string(),
        }
        .into())
    }
}

fn receipt_from_record(record: RoundRecord, resulting_balance: i64, replayed: bool) -> BetReceipt {
    BetReceipt {
        round_id: record.round_id,
        session_id: record.session_id,
        step: record.step,
        seed_pair_id: record.seed_pair_id,
        server_seed_hash: record.server_seed_hash,
        client_seed: record.client_seed,
        nonce: record.nonce,
        result: record.result,
        payout_multiplier: record.payout_multiplier,
        stake: record.stake,
        payout: record.payout,
        resulting_balance,
        replayed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::errors::{CoreError, LedgerError};
    use crate::fair::types::RouletteBet;
    use crate::storage::RecordStore;
    use tempfile::TempDir;

    fn service() -> (BetService, Arc<BalanceLedger>, Arc<SeedPairManager>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path(), false).unwrap();
        let seeds = Arc::new(SeedPairManager::new(store.clone()));
        let ledger = Arc::new(BalanceLedger::new(store.clone(), LedgerConfig::default()));
        let rounds = Arc::new(RoundLog::open(store).unwrap());
        (
            BetService::new(seeds.clone(), ledger.clone(), rounds),
            ledger,
            seeds,
            dir,
        )
    }

    fn fund(ledger: &BalanceLedger, user: &str, minor: i64) {
        ledger
            .apply("dep-1", user, Asset::Usd, minor, OperationType::Deposit, None)
            .unwrap();
    }

    fn dice_bet(user: &str, session: &str, step: u64, stake: i64) -> PlaceBetRequest {
        PlaceBetRequest {
            user_id: user.to_string(),
            session_id: session.to_string(),
            step,
            asset: Asset::Usd,
            stake,
            params: GameParams::Dice {
                target: 50.0,
                roll_over: true,
            },
        }
    }

    #[test]
    fn test_bet_settles_and_moves_balance() {
        let (svc, ledger, _seeds, _dir) = service();
        fund(&ledger, "alice", 10_000);

        let receipt = svc.place_bet(dice_bet("alice", "s1", 0, 1_000)).unwrap();
        assert_eq!(receipt.nonce, 1);
        assert!(!receipt.replayed);
        let expected = 10_000 - 1_000 + receipt.payout;
        assert_eq!(receipt.resulting_balance, expected);
        assert_eq!(ledger.balance("alice", Asset::Usd).unwrap(), expected);
    }

    #[test]
    fn test_replayed_step_is_idempotent() {
        let (svc, ledger, _seeds, _dir) = service();
        fund(&ledger, "bob", 10_000);

        let first = svc.place_bet(dice_bet("bob", "s1", 0, 1_000)).unwrap();
        let balance_after = ledger.balance("bob", Asset::Usd).unwrap();

        let replay = svc.place_bet(dice_bet("bob", "s1", 0, 1_000)).unwrap();
        assert!(replay.replayed);
        assert_eq!(replay.round_id, first.round_id);
        assert_eq!(replay.nonce, first.nonce);
        assert_eq!(replay.result, first.result);
        // No money moved and no nonce was burned.
        assert_eq!(ledger.balance("bob", Asset::Usd).unwrap(), balance_after);
        let next = svc.place_bet(dice_bet("bob", "s1", 1, 1_000)).unwrap();
        assert_eq!(next.nonce, 2);
    }

    #[test]
    fn test_invalid_params_burn_no_nonce() {
        let (svc, ledger, seeds, _dir) = service();
        fund(&ledger, "carol", 10_000);

        let err = svc
            .place_bet(PlaceBetRequest {
                user_id: "carol".to_string(),
                session_id: "s1".to_string(),
                step: 0,
                asset: Asset::Usd,
                stake: 100,
                params: GameParams::Dice {
                    target: 100.5,
                    roll_over: true,
                },
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Game(_)));

        let receipt = svc.place_bet(dice_bet("carol", "s1", 1, 100)).unwrap();
        assert_eq!(receipt.nonce, 1);
        let pair = seeds.get_or_create_active("carol").unwrap();
        assert_eq!(pair.nonce, 1);
    }

    #[test]
    fn test_insufficient_funds_rejected_before_recording() {
        let (svc, ledger, _seeds, _dir) = service();
        fund(&ledger, "dave", 50);

        let err = svc.place_bet(dice_bet("dave", "s1", 0, 100)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Ledger(LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(ledger.balance("dave", Asset::Usd).unwrap(), 50);
        // The step stays open for a funded retry.
        fund_more(&ledger, "dave", 1_000);
        let receipt = svc.place_bet(dice_bet("dave", "s1", 0, 100)).unwrap();
        assert!(!receipt.replayed);
    }

    fn fund_more(ledger: &BalanceLedger, user: &str, minor: i64) {
        ledger
            .apply("dep-2", user, Asset::Usd, minor, OperationType::Deposit, None)
            .unwrap();
    }

    #[test]
    fn test_zero_stake_rejected() {
        let (svc, ledger, _seeds, _dir) = service();
        fund(&ledger, "erin", 1_000);
        assert!(svc.place_bet(dice_bet("erin", "s1", 0, 0)).is_err());
        assert!(svc.place_bet(dice_bet("erin", "s1", 0, -5)).is_err());
    }

    #[test]
    fn test_loss_records_only_the_bet_leg() {
        let (svc, ledger, _seeds, _dir) = service();
        fund(&ledger, "frank", 100_000);

        // Straight roulette bets lose far more often than not; place a few
        // and check the first loser's ledger shape.
        for step in 0..20 {
            let receipt = svc
                .place_bet(PlaceBetRequest {
                    user_id: "frank".to_string(),
                    session_id: "s1".to_string(),
                    step,
                    asset: Asset::Usd,
                    stake: 100,
                    params: GameParams::Roulette {
                        bet: RouletteBet::Straight { pocket: 17 },
                    },
                })
                .unwrap();
            if receipt.payout == 0 {
                let ops = ledger.recent_operations("frank", Asset::Usd, 100).unwrap();
                assert!(ops
                    .iter()
                    .any(|op| op.operation_id == format!("s1:{}:bet", step)));
                assert!(!ops
                    .iter()
                    .any(|op| op.operation_id == format!("s1:{}:win", step)));
                return;
            }
        }
        panic!("20 straight-up wins in a row, mapper is suspicious");
    }

    #[test]
    fn test_bet_after_rotation_lands_on_replacement_pair() {
        let (svc, ledger, seeds, _dir) = service();
        fund(&ledger, "henry", 10_000);

        let first = svc.place_bet(dice_bet("henry", "s1", 0, 100)).unwrap();
        let (retired, replacement) = seeds.rotate("henry", None).unwrap();
        assert_eq!(retired.id, first.seed_pair_id);

        let second = svc.place_bet(dice_bet("henry", "s1", 1, 100)).unwrap();
        assert_eq!(second.seed_pair_id, replacement.id);
        // Fresh pair, fresh nonce sequence.
        assert_eq!(second.nonce, 1);
    }

    #[test]
    fn test_nonces_advance_across_sessions() {
        let (svc, ledger, _seeds, _dir) = service();
        fund(&ledger, "grace", 100_000);
        let a = svc.place_bet(dice_bet("grace", "s1", 0, 100)).unwrap();
        let b = svc.place_bet(dice_bet("grace", "s2", 0, 100)).unwrap();
        let c = svc.place_bet(dice_bet("grace", "s1", 1, 100)).unwrap();
        assert_eq!((a.nonce, b.nonce, c.nonce), (1, 2, 3));
        assert!(a.round_id < b.round_id && b.round_id < c.round_id);
    }
}
