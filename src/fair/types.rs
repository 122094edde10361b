//! Game parameter and result types.
//!
//! `GameParams` is a closed tagged union so every mapper dispatch is an
//! exhaustive match, not a runtime string comparison. Adding a game means
//! the compiler walks you through every site that must handle it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported game types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Dice,
    Plinko,
    Crash,
    Blackjack,
    Roulette,
    Keno,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::Dice => write!(f, "dice"),
            GameType::Plinko => write!(f, "plinko"),
            GameType::Crash => write!(f, "crash"),
            GameType::Blackjack => write!(f, "blackjack"),
            GameType::Roulette => write!(f, "roulette"),
            GameType::Keno => write!(f, "keno"),
        }
    }
}

/// Plinko risk level, selecting the multiplier table and left-step bias.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Roulette bet kinds resolved by the mapper's payout table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RouletteBet {
    Straight { pocket: u8 },
    Red,
    Black,
    Odd,
    Even,
}

/// Game-specific parameters (discriminated union).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum GameParams {
    Dice {
        /// Threshold in `[0.01, 99.99]`, two decimal places.
        target: f64,
        /// Win on roll strictly above target; otherwise strictly below.
        roll_over: bool,
    },
    Plinko {
        risk: RiskLevel,
        rows: u8,
    },
    Crash {
        /// Auto cash-out multiplier, `>= 1.01`.
        cash_out: f64,
    },
    Blackjack {
        /// Number of extra cards the player takes. Strategy is decided by
        /// the caller, never by the mapper.
        player_hits: u8,
    },
    Roulette {
        bet: RouletteBet,
    },
    Keno {
        /// 1..=10 distinct numbers from 1..=40.
        picks: Vec<u8>,
    },
}

impl GameParams {
    pub fn game_type(&self) -> GameType {
        match self {
            GameParams::Dice { .. } => GameType::Dice,
            GameParams::Plinko { .. } => GameType::Plinko,
            GameParams::Crash { .. } => GameType::Crash,
            GameParams::Blackjack { .. } => GameType::Blackjack,
            GameParams::Roulette { .. } => GameType::Roulette,
            GameParams::Keno { .. } => GameType::Keno,
        }
    }
}

/// A playing card as an index 0..52: suit = index / 13, rank = index % 13
/// (0 = ace, 12 = king).
pub type Card = u8;

/// Blackjack hand snapshot in a mapped result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlackjackHands {
    pub player: Vec<Card>,
    pub dealer: Vec<Card>,
    pub player_total: u8,
    pub dealer_total: u8,
    /// Final position of the monotonic shoe cursor.
    pub card_cursor: u8,
}

/// Mapped game result (discriminated union, mirrors `GameParams`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum MappedResult {
    Dice {
        roll: f64,
        win: bool,
    },
    Plinko {
        /// false = left, true = right, one entry per row.
        path: Vec<bool>,
        left_steps: u8,
    },
    Crash {
        crash_point: f64,
        win: bool,
    },
    Blackjack {
        hands: BlackjackHands,
    },
    Roulette {
        pocket: u8,
        win: bool,
    },
    Keno {
        drawn: Vec<u8>,
        hits: u8,
    },
}

/// A mapper's full output: the mapped result plus the payout multiplier the
/// ledger applies to the stake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameOutcome {
    pub result: MappedResult,
    /// Payout as a multiple of the stake; 0.0 on loss, 1.0 on push.
    pub payout_multiplier: f64,
    /// Uniform draws consumed producing this outcome.
    pub draws_consumed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_serde_tagging() {
        let params = GameParams::Plinko {
            risk: RiskLevel::High,
            rows: 16,
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"game\":\"plinko\""));
        assert!(json.contains("\"risk\":\"high\""));

        let back: GameParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_game_type_mapping() {
        let params = GameParams::Dice {
            target: 50.0,
            roll_over: true,
        };
        assert_eq!(params.game_type(), GameType::Dice);
        assert_eq!(params.game_type().to_string(), "dice");
    }
}
