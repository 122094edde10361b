//! Roulette outcome mapper (European single-zero wheel).
//!
//! The pocket comes from rejection sampling over 32-bit draws, so every
//! pocket 0..=36 is exactly equiprobable with no modulo bias.

use crate::errors::GameError;
use crate::fair::chain::DrawStream;
use crate::fair::types::{GameOutcome, MappedResult, RouletteBet};

const POCKETS: u32 = 37;

const RED_POCKETS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

fn is_red(pocket: u8) -> bool {
    RED_POCKETS.contains(&pocket)
}

fn draw_pocket(stream: &mut DrawStream<'_>) -> u8 {
    let limit = u32::MAX - (u32::MAX % POCKETS);
    loop {
        let v = stream.next_u32();
        if v < limit {
            return (v % POCKETS) as u8;
        }
    }
}

pub fn validate(bet: &RouletteBet) -> Result<(), GameError> {
    if let RouletteBet::Straight { pocket } = bet {
        if *pocket > 36 {
            return Err(GameError::InvalidGameParams(format!(
                "roulette pocket {} outside 0..=36",
                pocket
            )));
        }
    }
    Ok(())
}

pub fn map(stream: &mut DrawStream<'_>, bet: &RouletteBet) -> Result<GameOutcome, GameError> {
    validate(bet)?;

    let pocket = draw_pocket(stream);
    let (win, multiplier) = match bet {
        RouletteBet::Straight { pocket: chosen } => (pocket == *chosen, 36.0),
        RouletteBet::Red => (pocket != 0 && is_red(pocket), 2.0),
        RouletteBet::Black => (pocket != 0 && !is_red(pocket), 2.0),
        RouletteBet::Odd => (pocket != 0 && pocket % 2 == 1, 2.0),
        RouletteBet::Even => (pocket != 0 && pocket % 2 == 0, 2.0),
    };

    Ok(GameOutcome {
        result: MappedResult::Roulette { pocket, win },
        payout_multiplier: if win { multiplier } else { 0.0 },
        draws_consumed: stream.draws_consumed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(nonce: u64) -> DrawStream<'static> {
        DrawStream::new(b"roulette-test-seed", "client", nonce)
    }

    #[test]
    fn test_pocket_range() {
        for nonce in 0..500 {
            let mut s = stream(nonce);
            let outcome = map(&mut s, &RouletteBet::Red).unwrap();
            let MappedResult::Roulette { pocket, .. } = outcome.result else {
                panic!("wrong variant");
            };
            assert!(pocket <= 36);
        }
    }

    #[test]
    fn test_zero_loses_even_money_bets() {
        // Find a nonce that lands on zero and check every outside bet loses.
        for nonce in 0..5000 {
            let mut s = stream(nonce);
            let outcome = map(&mut s, &RouletteBet::Even).unwrap();
            let MappedResult::Roulette { pocket, win } = outcome.result else {
                panic!("wrong variant");
            };
            if pocket == 0 {
                assert!(!win);
                assert_eq!(outcome.payout_multiplier, 0.0);
                return;
            }
        }
        panic!("no zero pocket in 5000 nonces, wheel is suspicious");
    }

    #[test]
    fn test_straight_up_pays_36() {
        for nonce in 0..200 {
            let mut s = stream(nonce);
            let MappedResult::Roulette { pocket, .. } =
                map(&mut s, &RouletteBet::Red).unwrap().result
            else {
                panic!("wrong variant");
            };
            // Re-map with a straight bet on the pocket we know will come up.
            let mut s = stream(nonce);
            let outcome = map(&mut s, &RouletteBet::Straight { pocket }).unwrap();
            assert_eq!(outcome.payout_multiplier, 36.0);
        }
    }

    #[test]
    fn test_red_black_partition() {
        assert_eq!(RED_POCKETS.len(), 18);
        let blacks = (1u8..=36).filter(|p| !is_red(*p)).count();
        assert_eq!(blacks, 18);
    }

    #[test]
    fn test_rejects_invalid_pocket() {
        let mut s = stream(1);
        assert!(map(&mut s, &RouletteBet::Straight { pocket: 37 }).is_err());
    }
}
