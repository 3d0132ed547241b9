//! Error types for the bridge ledgers

use crate::types::{Address, Role, SwapId};
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge errors
///
/// Every variant is local to the operation that raised it: nothing is
/// committed before an error is returned.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller lacks the owner or role capability the operation requires
    #[error("Unauthorized: {caller} does not hold the {required} role")]
    Unauthorized {
        /// Account that attempted the call
        caller: Address,
        /// Capability that was required
        required: Role,
    },

    /// Subtraction would drive a balance negative
    #[error("Insufficient balance for {account}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        /// Account being debited
        account: Address,
        /// Balance at the time of the call
        balance: u128,
        /// Amount requested
        requested: u128,
    },

    /// Integer bound exceeded
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// `start_farming` called on a running pool
    #[error("Farming already started")]
    AlreadyStarted,

    /// Vesting operation before `start_farming`
    #[error("Farming not started")]
    NotStarted,

    /// Claim exceeds the unlocked-but-unclaimed amount
    #[error("Claim of {requested} exceeds claimable amount {claimable}")]
    ExceedsClaimable {
        /// Currently claimable amount
        claimable: u128,
        /// Amount requested
        requested: u128,
    },

    /// A different claim is already recorded under this swap id
    #[error("Conflicting claim already recorded for swap {0}")]
    DuplicateSwap(SwapId),

    /// No claim recorded under this swap id
    #[error("Unknown swap: {0}")]
    UnknownSwap(SwapId),

    /// Candidate claim disagrees with the recorded one
    #[error("Swap {id} mismatch on field `{field}`")]
    SwapMismatch {
        /// Swap id
        id: SwapId,
        /// First field that disagreed
        field: &'static str,
    },

    /// Vesting pool not registered
    #[error("Unknown vesting pool: {0}")]
    UnknownPool(String),

    /// Vesting pool id already registered
    #[error("Vesting pool already registered: {0}")]
    DuplicatePool(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Persisted layout written by an incompatible version
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch {
        /// Version this build understands
        expected: u32,
        /// Version found on disk
        found: u32,
    },

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by the caller's input rather than the host
    /// environment (storage, actor, IO).
    pub fn is_caller_error(&self) -> bool {
        !matches!(
            self,
            Error::Storage(_)
                | Error::Serialization(_)
                | Error::SchemaMismatch { .. }
                | Error::Concurrency(_)
                | Error::Io(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("Failed to parse config: {}", err))
    }
}
