//! Time-gated vesting pools
//!
//! A pool is committed at construction and starts releasing once the owner
//! calls `start_farming`. `unlock_asset` advances the `total_unlocked`
//! watermark from the curve; `total_unlocked` only reads it. Claims draw down
//! the unlocked-but-unclaimed remainder.
//!
//! # Invariants
//!
//! - `total_claimed <= total_unlocked <= total_locked`
//! - Both watermarks are monotonic non-decreasing
//! - `start_timestamp` is set exactly once

use crate::access::ensure_owner;
use crate::curve::{Curve, UnlockCurve};
use crate::types::{Address, Amount, Timestamp};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Mutable lifecycle state of a pool, separate from its immutable curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VestingState {
    /// Set once by `start_farming`
    pub start_timestamp: Option<Timestamp>,
    /// Highest amount released so far
    pub total_unlocked: Amount,
    /// Amount already claimed out of the pool
    pub total_claimed: Amount,
}

impl VestingState {
    /// Whether farming has started
    pub fn running(&self) -> bool {
        self.start_timestamp.is_some()
    }
}

/// A vesting pool following curve `C`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingSchedule<C = Curve> {
    owner: Address,
    curve: C,
    state: VestingState,
}

impl<C: UnlockCurve> VestingSchedule<C> {
    /// New, not-yet-started pool
    pub fn new(owner: Address, curve: C) -> Self {
        Self {
            owner,
            curve,
            state: VestingState::default(),
        }
    }

    /// Rebuild from persisted state
    pub fn restore(owner: Address, curve: C, state: VestingState) -> Self {
        Self { owner, curve, state }
    }

    /// Begin releasing at `now`. Owner-only, once.
    pub fn start_farming(&mut self, caller: &Address, now: Timestamp) -> Result<()> {
        ensure_owner(&self.owner, caller)?;
        if self.state.running() {
            return Err(Error::AlreadyStarted);
        }

        self.state.start_timestamp = Some(now);
        tracing::info!(start = now, total_locked = self.curve.total_locked(), "Farming started");
        Ok(())
    }

    /// Curve value at `now` without touching the watermark
    pub fn unlocked_at(&self, now: Timestamp) -> Result<Amount> {
        let start = self.state.start_timestamp.ok_or(Error::NotStarted)?;
        let elapsed = now.saturating_sub(start);
        let value = self.curve.unlocked_after(elapsed)?;
        Ok(value.min(self.curve.total_locked()))
    }

    /// Advance the watermark to the curve value at `now`. Returns the new
    /// `total_unlocked`. A clock reading earlier than a previous call leaves
    /// the watermark where it was.
    pub fn unlock_asset(&mut self, now: Timestamp) -> Result<Amount> {
        let value = self.unlocked_at(now)?;
        if value > self.state.total_unlocked {
            self.state.total_unlocked = value;
        }

        tracing::debug!(now, total_unlocked = self.state.total_unlocked, "Unlock refreshed");
        Ok(self.state.total_unlocked)
    }

    /// Claim `amount` out of the unlocked remainder. Owner-only.
    /// Returns the new `total_claimed`.
    pub fn claim(&mut self, caller: &Address, amount: Amount) -> Result<Amount> {
        ensure_owner(&self.owner, caller)?;
        if !self.state.running() {
            return Err(Error::NotStarted);
        }

        let claimable = self.claimable();
        if amount > claimable {
            return Err(Error::ExceedsClaimable {
                claimable,
                requested: amount,
            });
        }

        self.state.total_claimed += amount;
        tracing::debug!(amount, total_claimed = self.state.total_claimed, "Vested amount claimed");
        Ok(self.state.total_claimed)
    }

    /// Last watermark written by `unlock_asset`
    pub fn total_unlocked(&self) -> Amount {
        self.state.total_unlocked
    }

    /// Amount already claimed
    pub fn total_claimed(&self) -> Amount {
        self.state.total_claimed
    }

    /// Unlocked but not yet claimed
    pub fn claimable(&self) -> Amount {
        self.state.total_unlocked - self.state.total_claimed
    }

    /// Amount committed to the pool
    pub fn total_locked(&self) -> Amount {
        self.curve.total_locked()
    }

    /// When farming started, if it has
    pub fn start_timestamp(&self) -> Option<Timestamp> {
        self.state.start_timestamp
    }

    /// Whether farming has started
    pub fn is_running(&self) -> bool {
        self.state.running()
    }

    /// Pool owner
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The release curve
    pub fn curve(&self) -> &C {
        &self.curve
    }

    /// Snapshot of the lifecycle state
    pub fn state(&self) -> VestingState {
        self.state
    }

    /// Put back a previous lifecycle state after a failed commit
    pub(crate) fn revert_state(&mut self, previous: VestingState) {
        self.state = previous;
    }
}
