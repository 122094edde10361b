//! faircore: provably-fair gaming engine.
//!
//! Outcomes derive from an HMAC-SHA512 chain over a committed server seed,
//! a user-controlled client seed, and a monotonic nonce. Balances live in
//! an append-only, idempotent ledger, and every settled round can be
//! replayed bit-for-bit once the server seed is revealed.

pub mod api;
pub mod bets;
pub mod config;
pub mod errors;
pub mod fair;
pub mod ledger;
pub mod metrics;
pub mod replay;
pub mod rounds;
pub mod seeds;
pub mod storage;

pub use bets::{BetReceipt, BetService, PlaceBetRequest};
pub use config::{ConfigLoader, CoreConfig};
pub use errors::{CoreError, CoreResult};
pub use ledger::{Asset, BalanceLedger, OperationType};
pub use replay::ReplayService;
pub use rounds::RoundLog;
pub use seeds::SeedPairManager;
pub use storage::RecordStore;
