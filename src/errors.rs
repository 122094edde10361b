//! Error types for the faircore engine.
//!
//! One enum per subsystem, rolled up into [`CoreError`]. Handlers map these
//! onto HTTP codes in `api::errors`; inside the core they are plain typed
//! results so recoverable conditions (seed races, ledger write conflicts)
//! can be retried without string matching.

use thiserror::Error;

/// Root error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Seed error: {0}")]
    Seed(#[from] SeedError),

    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),
}

/// Seed pair lifecycle errors.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Lost a concurrent first-creation race. Recovered internally by
    /// re-reading the winning row; never surfaced to callers.
    #[error("Concurrent seed creation for user {user_id}")]
    SeedConflict { user_id: String },

    /// Reveal requested while the pair is still active. Deliberate policy:
    /// revealing an active seed would let a user predict future outcomes.
    #[error("Seed pair {seed_pair_id} is still active and cannot be revealed")]
    SeedStillActive { seed_pair_id: String },

    /// Nonce reservation attempted on a retired pair, whose server seed may
    /// already be revealed. The bet path recovers by re-resolving the
    /// active pair.
    #[error("Seed pair {seed_pair_id} is retired and cannot issue nonces")]
    SeedRetired { seed_pair_id: String },

    #[error("Seed pair {seed_pair_id} not found")]
    NotFound { seed_pair_id: String },

    #[error("User {user_id} has no active seed pair to rotate")]
    NoActivePair { user_id: String },
}

/// Outcome mapper errors.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Invalid game parameters: {0}")]
    InvalidGameParams(String),

    #[error("Nonce space exhausted for seed pair {seed_pair_id}")]
    NonceExhausted { seed_pair_id: String },
}

/// Balance ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },

    #[error("Unrecognized asset: {0}")]
    UnknownAsset(String),

    #[error("Amount '{value}' is not representable at {scale} decimal places")]
    PrecisionExceeded { value: String, scale: u32 },

    #[error("Amount is not a finite number")]
    NonFiniteAmount,

    /// Wallet version moved under us and the bounded retry budget ran out.
    /// Transient: the caller may retry the whole operation.
    #[error("Ledger write conflict on ({user_id}, {asset}) after {attempts} attempts")]
    LedgerConflict {
        user_id: String,
        asset: String,
        attempts: u32,
    },

    #[error("Wallet not found for ({user_id}, {asset})")]
    WalletNotFound { user_id: String, asset: String },
}

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    OpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {0}")]
    MissingRequired(String),
}

/// Replay/audit errors.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Game session {session_id} not found")]
    SessionNotFound { session_id: String },

    #[error("Step range {from}..={to} is invalid")]
    InvalidRange { from: u64, to: u64 },

    /// Round rows are write-once. A second write for the same step means a
    /// duplicated settlement attempt upstream.
    #[error("Step {step} of session {session_id} is already recorded")]
    StepAlreadyRecorded { session_id: String, step: u64 },
}

impl From<rocksdb::Error> for CoreError {
    fn from(e: rocksdb::Error) -> Self {
        CoreError::Storage(StorageError::WriteFailed(e.to_string()))
    }
}

/// Convenience alias for core results.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::Ledger(LedgerError::InsufficientFunds {
            balance: 100,
            requested: 250,
        });
        assert!(err.to_string().contains("Ledger error"));
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn test_error_conversion() {
        let seed_err = SeedError::SeedStillActive {
            seed_pair_id: "sp-1".to_string(),
        };
        let core: CoreError = seed_err.into();
        match core {
            CoreError::Seed(SeedError::SeedStillActive { .. }) => {}
            _ => panic!("Expected seed error"),
        }
    }

    #[test]
    fn test_conflict_display_includes_attempts() {
        let err = LedgerError::LedgerConflict {
            user_id: "u1".to_string(),
            asset: "BTC".to_string(),
            attempts: 5,
        };
        assert!(err.to_string().contains("after 5 attempts"));
    }
}
