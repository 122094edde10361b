//! Provably-fair outcome engine: hash chain plus per-game mappers.
//!
//! Everything in this module is pure and side-effect-free. Outcome
//! generation never locks, so it runs fully in parallel across requests.

pub mod blackjack;
pub mod chain;
pub mod crash;
pub mod dice;
pub mod keno;
pub mod plinko;
pub mod roulette;
pub mod types;

use crate::errors::GameError;
use chain::DrawStream;
use types::{GameOutcome, GameParams};

/// Validate parameters without consuming any entropy. Used on the bet path
/// before a nonce is reserved, so rejected params never burn a nonce.
pub fn validate_params(params: &GameParams) -> Result<(), GameError> {
    match params {
        GameParams::Dice { target, roll_over } => dice::validate(*target, *roll_over),
        GameParams::Plinko { risk, rows } => plinko::validate(*risk, *rows),
        GameParams::Crash { cash_out } => crash::validate(*cash_out),
        GameParams::Blackjack { player_hits } => blackjack::validate(*player_hits),
        GameParams::Roulette { bet } => roulette::validate(bet),
        GameParams::Keno { picks } => keno::validate(picks),
    }
}

/// Generate the outcome for `(server_seed, client_seed, nonce, params)`.
///
/// This is the audit contract end to end: identical inputs always yield an
/// identical [`GameOutcome`], which is what `ReplayService` relies on.
pub fn generate_outcome(
    server_seed: &[u8],
    client_seed: &str,
    nonce: u64,
    params: &GameParams,
) -> Result<GameOutcome, GameError> {
    let mut stream = DrawStream::new(server_seed, client_seed, nonce);
    match params {
        GameParams::Dice { target, roll_over } => dice::map(&mut stream, *target, *roll_over),
        GameParams::Plinko { risk, rows } => plinko::map(&mut stream, *risk, *rows),
        GameParams::Crash { cash_out } => crash::map(&mut stream, *cash_out),
        GameParams::Blackjack { player_hits } => blackjack::map(&mut stream, *player_hits),
        GameParams::Roulette { bet } => roulette::map(&mut stream, bet),
        GameParams::Keno { picks } => keno::map(&mut stream, picks),
    }
}
