//! Crash outcome mapper.
//!
//! A single draw maps through an inverse transform to the crash point. The
//! house edge is the 0.99 constant inside the transform, not a post-hoc
//! deduction: about 1% of draws land below 1.00x and clamp to an instant
//! bust at the floor.

use crate::errors::GameError;
use crate::fair::chain::DrawStream;
use crate::fair::types::{GameOutcome, MappedResult};

const EDGE_FACTOR: f64 = 0.99;
pub const MIN_CRASH_POINT: f64 = 1.0;
pub const MAX_CRASH_POINT: f64 = 1_000_000.0;

pub fn validate(cash_out: f64) -> Result<(), GameError> {
    if !cash_out.is_finite() {
        return Err(GameError::InvalidGameParams(
            "crash cash-out must be finite".to_string(),
        ));
    }
    if !(1.01..=MAX_CRASH_POINT).contains(&cash_out) {
        return Err(GameError::InvalidGameParams(format!(
            "crash cash-out {} outside [1.01, {}]",
            cash_out, MAX_CRASH_POINT
        )));
    }
    Ok(())
}

/// Map one uniform draw to a crash point in `[MIN_CRASH_POINT, MAX_CRASH_POINT]`,
/// floored to two decimals.
fn crash_point_from_draw(u: f64) -> f64 {
    // u -> EDGE_FACTOR / (1 - u); u near 1 gives large multipliers.
    let raw = EDGE_FACTOR / (1.0 - u);
    let floored = (raw * 100.0).floor() / 100.0;
    floored.clamp(MIN_CRASH_POINT, MAX_CRASH_POINT)
}

pub fn map(stream: &mut DrawStream<'_>, cash_out: f64) -> Result<GameOutcome, GameError> {
    validate(cash_out)?;

    let u = stream.next_uniform();
    let crash_point = crash_point_from_draw(u);
    let win = crash_point >= cash_out;

    Ok(GameOutcome {
        result: MappedResult::Crash { crash_point, win },
        payout_multiplier: if win { cash_out } else { 0.0 },
        draws_consumed: stream.draws_consumed(),
    })
}
