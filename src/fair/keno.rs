//! Keno outcome mapper.
//!
//! Draws ten distinct numbers from 1..=40 with rejection sampling, counts
//! hits against the player's picks, and pays from a fixed table indexed by
//! `(picks, hits)`.

use crate::errors::GameError;
use crate::fair::chain::DrawStream;
use crate::fair::types::{GameOutcome, MappedResult};

const NUMBER_POOL: u32 = 40;
const NUMBERS_DRAWN: usize = 10;
const MAX_PICKS: usize = 10;

/// Payout table: `PAYTABLE[picks - 1][hits]`.
const PAYTABLE: [&[f64]; MAX_PICKS] = [
    &[0.0, 3.96],
    &[0.0, 1.9, 4.5],
    &[0.0, 1.0, 3.1, 10.4],
    &[0.0, 0.8, 1.8, 5.0, 22.5],
    &[0.0, 0.25, 1.4, 4.1, 16.5, 36.0],
    &[0.0, 0.0, 1.0, 3.68, 7.0, 16.5, 40.0],
    &[0.0, 0.0, 0.47, 3.0, 4.5, 14.0, 31.0, 60.0],
    &[0.0, 0.0, 0.0, 2.2, 4.0, 13.0, 22.0, 55.0, 70.0],
    &[0.0, 0.0, 0.0, 1.55, 3.0, 8.0, 15.0, 44.0, 60.0, 85.0],
    &[0.0, 0.0, 0.0, 1.4, 2.25, 4.5, 8.0, 17.0, 50.0, 80.0, 100.0],
];

pub fn validate(picks: &[u8]) -> Result<(), GameError> {
    if picks.is_empty() || picks.len() > MAX_PICKS {
        return Err(GameError::InvalidGameParams(format!(
            "keno requires 1..={} picks, got {}",
            MAX_PICKS,
            picks.len()
        )));
    }
    for &n in picks {
        if !(1..=NUMBER_POOL as u8).contains(&n) {
            return Err(GameError::InvalidGameParams(format!(
                "keno pick {} outside 1..={}",
                n, NUMBER_POOL
            )));
        }
    }
    let mut sorted = picks.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != picks.len() {
        return Err(GameError::InvalidGameParams(
            "keno picks must be distinct".to_string(),
        ));
    }
    Ok(())
}

fn draw_number(stream: &mut DrawStream<'_>) -> u8 {
    let limit = u32::MAX - (u32::MAX % NUMBER_POOL);
    loop {
        let v = stream.next_u32();
        if v < limit {
            return (v % NUMBER_POOL) as u8 + 1;
        }
    }
}

pub fn map(stream: &mut DrawStream<'_>, picks: &[u8]) -> Result<GameOutcome, GameError> {
    validate(picks)?;

    let mut drawn: Vec<u8> = Vec::with_capacity(NUMBERS_DRAWN);
    while drawn.len() < NUMBERS_DRAWN {
        let n = draw_number(stream);
        if !drawn.contains(&n) {
            drawn.push(n);
        }
    }

    let hits = picks.iter().filter(|p| drawn.contains(p)).count() as u8;
    let multiplier = PAYTABLE[picks.len() - 1][hits as usize];

    Ok(GameOutcome {
        result: MappedResult::Keno { drawn, hits },
        payout_multiplier: multiplier,
        draws_consumed: stream.draws_consumed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(nonce: u64) -> DrawStream<'static> {
        DrawStream::new(b"keno-test-seed", "client", nonce)
    }

    #[test]
    fn test_draws_ten_distinct_in_range() {
        for nonce in 0..100 {
            let mut s = stream(nonce);
            let outcome = map(&mut s, &[1, 2, 3]).unwrap();
            let MappedResult::Keno { drawn, .. } = outcome.result else {
                panic!("wrong variant");
            };
            assert_eq!(drawn.len(), NUMBERS_DRAWN);
            let mut sorted = drawn.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), NUMBERS_DRAWN);
            assert!(drawn.iter().all(|&n| (1..=40).contains(&n)));
        }
    }

    #[test]
    fn test_hits_and_payout_agree() {
        let picks = [5u8, 10, 15, 20, 25];
        for nonce in 0..50 {
            let mut s = stream(nonce);
            let outcome = map(&mut s, &picks).unwrap();
            let MappedResult::Keno { drawn, hits } = outcome.result else {
                panic!("wrong variant");
            };
            let expected = picks.iter().filter(|p| drawn.contains(p)).count() as u8;
            assert_eq!(hits, expected);
            assert_eq!(outcome.payout_multiplier, PAYTABLE[4][hits as usize]);
        }
    }

    #[test]
    fn test_paytable_shape() {
        for (i, row) in PAYTABLE.iter().enumerate() {
            // picks = i + 1 allows hits 0..=picks.
            assert_eq!(row.len(), i + 2);
        }
    }

    #[test]
    fn test_rejects_bad_picks() {
        let mut s = stream(1);
        assert!(map(&mut s, &[]).is_err());
        let mut s = stream(1);
        assert!(map(&mut s, &[0]).is_err());
        let mut s = stream(1);
        assert!(map(&mut s, &[41]).is_err());
        let mut s = stream(1);
        assert!(map(&mut s, &[7, 7]).is_err());
        let mut s = stream(1);
        assert!(map(&mut s, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]).is_err());
    }

    #[test]
    fn test_deterministic() {
        let a = map(&mut stream(6), &[1, 2, 3, 4]).unwrap();
        let b = map(&mut stream(6), &[1, 2, 3, 4]).unwrap();
        assert_eq!(a, b);
    }
}
