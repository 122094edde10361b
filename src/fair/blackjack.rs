//! Blackjack outcome mapper.
//!
//! The draws produce one seed-derived shoe (a 52-card Fisher-Yates shuffle
//! with rejection-sampled indices) consumed through a monotonic cursor. The
//! cursor only advances, so a card is never dealt twice from one shoe.
//!
//! Strategy stays with the caller: `player_hits` says how many extra cards
//! the player takes. The mapper deals, finishes the dealer to 17, and
//! applies the fixed settlement constants: push 1.0, natural blackjack 2.5,
//! plain win 2.0, loss 0.0.

use crate::errors::GameError;
use crate::fair::chain::DrawStream;
use crate::fair::types::{BlackjackHands, Card, GameOutcome, MappedResult};

const DECK_SIZE: usize = 52;
/// Two dealt cards plus hits can never exceed the largest bust-free hand.
const MAX_PLAYER_HITS: u8 = 9;

/// Uniform integer in `0..bound` by rejection sampling, avoiding modulo bias.
fn uniform_index(stream: &mut DrawStream<'_>, bound: u32) -> u32 {
    debug_assert!(bound > 0);
    let limit = u32::MAX - (u32::MAX % bound);
    loop {
        let v = stream.next_u32();
        if v < limit {
            return v % bound;
        }
    }
}

/// Derive the shoe for this `(seed pair, nonce)`.
fn shuffle_shoe(stream: &mut DrawStream<'_>) -> [Card; DECK_SIZE] {
    let mut shoe: [Card; DECK_SIZE] = std::array::from_fn(|i| i as Card);
    for i in (1..DECK_SIZE).rev() {
        let j = uniform_index(stream, (i + 1) as u32) as usize;
        shoe.swap(i, j);
    }
    shoe
}

fn card_value(card: Card) -> u8 {
    let rank = card % 13;
    match rank {
        0 => 1,           // ace, upgraded in best_total
        9..=12 => 10,     // ten and faces
        r => r + 1,
    }
}

/// Best hand total: aces count 1, one upgrades to 11 when it fits.
fn best_total(cards: &[Card]) -> u8 {
    let hard: u8 = cards.iter().map(|&c| card_value(c)).sum();
    let has_ace = cards.iter().any(|&c| c % 13 == 0);
    if has_ace && hard + 10 <= 21 {
        hard + 10
    } else {
        hard
    }
}

fn is_blackjack(cards: &[Card]) -> bool {
    cards.len() == 2 && best_total(cards) == 21
}

pub fn validate(player_hits: u8) -> Result<(), GameError> {
    if player_hits > MAX_PLAYER_HITS {
        return Err(GameError::InvalidGameParams(format!(
            "blackjack player_hits {} exceeds maximum {}",
            player_hits, MAX_PLAYER_HITS
        )));
    }
    Ok(())
}

pub fn map(stream: &mut DrawStream<'_>, player_hits: u8) -> Result<GameOutcome, GameError> {
    validate(player_hits)?;

    let shoe = shuffle_shoe(stream);
    let mut cursor: usize = 0;
    let deal = |cursor: &mut usize| -> Card {
        let card = shoe[*cursor];
        *cursor += 1;
        card
    };

    // Standard dealing order: player, dealer, player, dealer.
    let mut player = Vec::with_capacity(2 + player_hits as usize);
    let mut dealer = Vec::with_capacity(7);
    player.push(deal(&mut cursor));
    dealer.push(deal(&mut cursor));
    player.push(deal(&mut cursor));
    dealer.push(deal(&mut cursor));

    for _ in 0..player_hits {
        if best_total(&player) > 21 {
            break;
        }
        player.push(deal(&mut cursor));
    }

    let player_total = best_total(&player);
    let player_bust = player_total > 21;
    let player_bj = is_blackjack(&player);
    let dealer_bj = is_blackjack(&dealer);

    // Dealer only plays out a live hand; stands on all 17s.
    if !player_bust && !player_bj && !dealer_bj {
        while best_total(&dealer) < 17 {
            dealer.push(deal(&mut cursor));
        }
    }
    let dealer_total = best_total(&dealer);

    let payout_multiplier = if player_bust {
        0.0
    } else if player_bj && dealer_bj {
        1.0
    } else if player_bj {
        2.5
    } else if dealer_bj {
        0.0
    } else if dealer_total > 21 {
        2.0
    } else if player_total > dealer_total {
        2.0
    } else if player_total == dealer_total {
        1.0
    } else {
        0.0
    };

    let hands = BlackjackHands {
        player,
        dealer,
        player_total,
        dealer_total,
        card_cursor: cursor as u8,
    };

    Ok(GameOutcome {
        result: MappedResult::Blackjack { hands },
        payout_multiplier,
        draws_consumed: stream.draws_consumed(),
    })
}
