//! Plinko outcome mapper.
//!
//! One draw per row decides a left or right step. The count of left steps
//! indexes a fixed multiplier table for `(risk, rows)`: exact lookups, no
//! interpolation. The house edge lives in the tables and in the left-step
//! bias: a draw exactly equal to the left probability steps right.

use crate::errors::GameError;
use crate::fair::chain::DrawStream;
use crate::fair::types::{GameOutcome, MappedResult, RiskLevel};

/// Per-risk probability of stepping left. Strictly-less comparison, so the
/// bias favors the right edge by the stated margin.
fn left_probability(risk: RiskLevel) -> f64 {
    match risk {
        RiskLevel::Low => 0.5,
        RiskLevel::Medium => 0.499988,
        RiskLevel::High => 0.499975,
    }
}

/// Multiplier table for `(risk, rows)`. Index = number of left steps.
fn multiplier_table(risk: RiskLevel, rows: u8) -> Option<&'static [f64]> {
    match (risk, rows) {
        (RiskLevel::Low, 8) => Some(&[5.6, 2.1, 1.1, 1.0, 0.5, 1.0, 1.1, 2.1, 5.6]),
        (RiskLevel::Medium, 8) => Some(&[13.0, 3.0, 1.3, 0.7, 0.4, 0.7, 1.3, 3.0, 13.0]),
        (RiskLevel::High, 8) => Some(&[29.0, 4.0, 1.5, 0.3, 0.2, 0.3, 1.5, 4.0, 29.0]),
        (RiskLevel::Low, 12) => Some(&[
            10.0, 3.0, 1.6, 1.4, 1.1, 1.0, 0.5, 1.0, 1.1, 1.4, 1.6, 3.0, 10.0,
        ]),
        (RiskLevel::Medium, 12) => Some(&[
            33.0, 11.0, 4.0, 2.0, 1.1, 0.6, 0.3, 0.6, 1.1, 2.0, 4.0, 11.0, 33.0,
        ]),
        (RiskLevel::High, 12) => Some(&[
            170.0, 24.0, 8.1, 2.0, 0.7, 0.2, 0.2, 0.2, 0.7, 2.0, 8.1, 24.0, 170.0,
        ]),
        (RiskLevel::Low, 16) => Some(&[
            16.0, 9.0, 2.0, 1.4, 1.4, 1.2, 1.1, 1.0, 0.5, 1.0, 1.1, 1.2, 1.4, 1.4, 2.0, 9.0, 16.0,
        ]),
        (RiskLevel::Medium, 16) => Some(&[
            110.0, 41.0, 10.0, 5.0, 3.0, 1.5, 1.0, 0.5, 0.3, 0.5, 1.0, 1.5, 3.0, 5.0, 10.0, 41.0,
            110.0,
        ]),
        (RiskLevel::High, 16) => Some(&[
            1000.0, 130.0, 26.0, 9.0, 4.0, 2.0, 0.2, 0.2, 0.2, 0.2, 0.2, 2.0, 4.0, 9.0, 26.0,
            130.0, 1000.0,
        ]),
        _ => None,
    }
}

pub fn validate(risk: RiskLevel, rows: u8) -> Result<(), GameError> {
    if multiplier_table(risk, rows).is_none() {
        return Err(GameError::InvalidGameParams(format!(
            "unsupported plinko configuration: risk {:?}, rows {}",
            risk, rows
        )));
    }
    Ok(())
}

pub fn map(stream: &mut DrawStream<'_>, risk: RiskLevel, rows: u8) -> Result<GameOutcome, GameError> {
    validate(risk, rows)?;
    let table = multiplier_table(risk, rows).expect("validated above");
    let p_left = left_probability(risk);

    let mut path = Vec::with_capacity(rows as usize);
    let mut left_steps: u8 = 0;
    for _ in 0..rows {
        // Draw == p_left counts as right: strict less-than.
        let left = stream.next_uniform() < p_left;
        if left {
            left_steps += 1;
        }
        path.push(!left);
    }

    let multiplier = table[left_steps as usize];

    Ok(GameOutcome {
        result: MappedResult::Plinko { path, left_steps },
        payout_multiplier: multiplier,
        draws_consumed: stream.draws_consumed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(nonce: u64) -> DrawStream<'static> {
        DrawStream::new(b"plinko-test-seed", "client", nonce)
    }

    #[test]
    fn test_high_16_table_exactness() {
        let table = multiplier_table(RiskLevel::High, 16).unwrap();
        assert_eq!(table.len(), 17);
        assert_eq!(table[8], 0.2); // exact center
        assert_eq!(table[0], 1000.0);
        assert_eq!(table[16], 1000.0);
    }

    #[test]
    fn test_one_draw_per_row() {
        let mut s = stream(1);
        let outcome = map(&mut s, RiskLevel::High, 16).unwrap();
        assert_eq!(outcome.draws_consumed, 16);
        let MappedResult::Plinko { path, left_steps } = outcome.result else {
            panic!("wrong variant");
        };
        assert_eq!(path.len(), 16);
        assert_eq!(left_steps as usize, path.iter().filter(|r| !**r).count());
    }

    #[test]
    fn test_multiplier_matches_left_steps() {
        for nonce in 0..50 {
            let mut s = stream(nonce);
            let outcome = map(&mut s, RiskLevel::Medium, 12).unwrap();
            let MappedResult::Plinko { left_steps, .. } = outcome.result else {
                panic!("wrong variant");
            };
            let table = multiplier_table(RiskLevel::Medium, 12).unwrap();
            assert_eq!(outcome.payout_multiplier, table[left_steps as usize]);
        }
    }

    #[test]
    fn test_rejects_unsupported_rows() {
        let mut s = stream(1);
        let err = map(&mut s, RiskLevel::Low, 9).unwrap_err();
        assert!(matches!(err, GameError::InvalidGameParams(_)));
        let mut s = stream(1);
        assert!(map(&mut s, RiskLevel::High, 0).is_err());
    }

    #[test]
    fn test_deterministic() {
        let a = map(&mut stream(3), RiskLevel::High, 8).unwrap();
        let b = map(&mut stream(3), RiskLevel::High, 8).unwrap();
        assert_eq!(a, b);
    }
}
