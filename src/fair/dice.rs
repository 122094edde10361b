//! Dice outcome mapper.
//!
//! One uniform draw scaled to a roll in `[0, 99.99]` with two decimal
//! places. The payout multiplier comes from the win probability and the
//! house edge, never from the draw itself.

use crate::errors::GameError;
use crate::fair::chain::DrawStream;
use crate::fair::types::{GameOutcome, MappedResult};

/// House edge retained on every dice bet.
const HOUSE_EDGE: f64 = 0.01;
/// Number of distinct roll values (0.00 through 99.99).
const ROLL_STATES: f64 = 10_000.0;

pub fn validate(target: f64, _roll_over: bool) -> Result<(), GameError> {
    if !target.is_finite() {
        return Err(GameError::InvalidGameParams(
            "dice target must be finite".to_string(),
        ));
    }
    if !(0.01..=99.99).contains(&target) {
        return Err(GameError::InvalidGameParams(format!(
            "dice target {} outside [0.01, 99.99]",
            target
        )));
    }
    // Targets are quantized to hundredths, matching the roll resolution.
    let hundredths = target * 100.0;
    if (hundredths - hundredths.round()).abs() > 1e-9 {
        return Err(GameError::InvalidGameParams(format!(
            "dice target {} has more than two decimal places",
            target
        )));
    }
    Ok(())
}

pub fn map(stream: &mut DrawStream<'_>, target: f64, roll_over: bool) -> Result<GameOutcome, GameError> {
    validate(target, roll_over)?;

    let u = stream.next_uniform();
    let roll = (u * ROLL_STATES).floor() / 100.0;

    let target_hundredths = (target * 100.0).round();
    let win = if roll_over {
        roll > target
    } else {
        roll < target
    };

    // Count of winning hundredth-states out of 10,000.
    let win_states = if roll_over {
        ROLL_STATES - 1.0 - target_hundredths
    } else {
        target_hundredths
    };
    let win_chance = win_states / ROLL_STATES;
    if win_chance <= 0.0 {
        return Err(GameError::InvalidGameParams(format!(
            "dice target {} leaves no winning outcomes",
            target
        )));
    }

    let multiplier = (1.0 - HOUSE_EDGE) / win_chance;

    Ok(GameOutcome {
        result: MappedResult::Dice { roll, win },
        payout_multiplier: if win { multiplier } else { 0.0 },
        draws_consumed: stream.draws_consumed(),
    })
}
