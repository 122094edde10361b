//! HMAC-SHA512 hash chain and uniform draw stream.
//!
//! `derive` is the audit contract: identical inputs yield identical bytes
//! across restarts and independent implementations. Anyone holding a revealed
//! server seed can recompute every outcome with nothing but this function.
//!
//! Consumers read the digest in 4-byte groups and normalize each group to a
//! uniform float in `[0,1)` as `b0/256 + b1/256^2 + b2/256^3 + b3/256^4`.
//! Exhausting one digest advances `round_index` and re-derives; bytes are
//! never reused across rounds.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Digest length of one chain round.
pub const DIGEST_LEN: usize = 64;
/// Bytes consumed per uniform draw.
pub const BYTES_PER_DRAW: usize = 4;

/// Compute one round of the chain:
/// `HMAC-SHA512(key = server_seed, msg = client_seed ":" nonce ":" round_index)`.
pub fn derive(server_seed: &[u8], client_seed: &str, nonce: u64, round_index: u32) -> [u8; DIGEST_LEN] {
    let mut mac = HmacSha512::new_from_slice(server_seed)
        .expect("HMAC-SHA512 accepts keys of any length");
    mac.update(client_seed.as_bytes());
    mac.update(b":");
    mac.update(nonce.to_string().as_bytes());
    mac.update(b":");
    mac.update(round_index.to_string().as_bytes());
    mac.finalize().into_bytes().into()
}

/// Stateful cursor over the chain for one `(seed pair, nonce)`.
///
/// Pure with respect to its inputs: two streams built from the same seeds and
/// nonce yield the same sequence of draws.
pub struct DrawStream<'a> {
    server_seed: &'a [u8],
    client_seed: &'a str,
    nonce: u64,
    round_index: u32,
    digest: [u8; DIGEST_LEN],
    cursor: usize,
    draws_consumed: u64,
}

impl<'a> DrawStream<'a> {
    pub fn new(server_seed: &'a [u8], client_seed: &'a str, nonce: u64) -> Self {
        Self {
            server_seed,
            client_seed,
            nonce,
            round_index: 0,
            digest: derive(server_seed, client_seed, nonce, 0),
            cursor: 0,
            draws_consumed: 0,
        }
    }

    fn next_group(&mut self) -> [u8; BYTES_PER_DRAW] {
        if self.cursor + BYTES_PER_DRAW > DIGEST_LEN {
            self.round_index += 1;
            self.digest = derive(self.server_seed, self.client_seed, self.nonce, self.round_index);
            self.cursor = 0;
        }
        let group: [u8; BYTES_PER_DRAW] = self.digest[self.cursor..self.cursor + BYTES_PER_DRAW]
            .try_into()
            .expect("group slice is exactly BYTES_PER_DRAW");
        self.cursor += BYTES_PER_DRAW;
        self.draws_consumed += 1;
        group
    }

    /// Next uniform draw in `[0,1)`.
    pub fn next_uniform(&mut self) -> f64 {
        let b = self.next_group();
        b[0] as f64 / 256.0
            + b[1] as f64 / 65_536.0
            + b[2] as f64 / 16_777_216.0
            + b[3] as f64 / 4_294_967_296.0
    }

    /// Next raw 32-bit draw, big-endian over the group. Used by rejection
    /// samplers that need the full integer range.
    pub fn next_u32(&mut self) -> u32 {
        u32::from_be_bytes(self.next_group())
    }

    /// Total draws consumed so far (audit bookkeeping).
    pub fn draws_consumed(&self) -> u64 {
        self.draws_consumed
    }
}
