//! Bridge Core
//!
//! Ledgers behind a cross-chain value-transfer service: a role-gated balance
//! ledger, time-gated vesting pools, and a dual-attestation swap auditor.
//!
//! # Architecture
//!
//! - **Plain state machines**: `BalanceLedger`, `VestingSchedule` and
//!   `SwapAuditor` are synchronous and take time as an argument
//! - **Single Writer**: One actor task owns all ledger state
//! - **Merkle audit log**: Inclusion proofs for every recorded swap
//! - **Optional persistence**: RocksDB, versioned layout
//!
//! # Invariants
//!
//! - Balances never go negative; failed operations change nothing
//! - Only the owner flips roles; roles gate every balance mutation
//! - `total_unlocked` is monotonic and bounded by `total_locked`
//! - `total_claimed <= total_unlocked`
//! - A recorded swap claim is never overwritten or deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    clippy::all
)]

pub mod access;
pub mod actor;
pub mod auditor;
pub mod balance;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod curve;
pub mod error;
pub mod merkle;
pub mod metrics;
pub mod storage;
pub mod types;
pub mod vesting;

// Re-exports
pub use access::AccessControl;
pub use actor::{BridgeHandle, PoolStatus, SwapCheck};
pub use auditor::{Recorded, SwapAuditor};
pub use balance::BalanceLedger;
pub use bridge::Bridge;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use curve::{Curve, CurvedCurve, LinearCurve, UnlockCurve};
pub use error::{Error, Result};
pub use storage::Storage;
pub use types::{Address, Amount, Role, RoleFlags, SwapClaim, SwapId, Timestamp};
pub use vesting::{VestingSchedule, VestingState};
