//! Actor-based concurrency for the bridge ledgers
//!
//! One Tokio task owns the balance ledger, the swap auditor and every vesting
//! pool, and handles one message at a time. Each mutation is applied in
//! memory, then persisted; if the write fails the in-memory change is undone
//! before the error is returned, so callers never observe state that is not
//! on disk.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               BridgeHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              BridgeActor (Single Task)                │
//! │  BalanceLedger · SwapAuditor · vesting pools          │
//! │                       │                               │
//! │                       ▼                               │
//! │           Storage::put_* (RocksDB, optional)          │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::access::AccessControl;
use crate::auditor::{Recorded, SwapAuditor};
use crate::balance::BalanceLedger;
use crate::curve::Curve;
use crate::merkle::{Hash, MerkleProof};
use crate::metrics::Metrics;
use crate::storage::{Snapshot, Storage};
use crate::types::{Address, Amount, RoleFlags, SwapClaim, SwapId, Timestamp};
use crate::vesting::VestingSchedule;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Point-in-time view of a vesting pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Upper bound on what the pool can ever release
    pub total_locked: Amount,
    /// Unlock watermark
    pub total_unlocked: Amount,
    /// Claim watermark
    pub total_claimed: Amount,
    /// Unlocked but not yet claimed
    pub claimable: Amount,
    /// Set by `start_farming`
    pub start_timestamp: Option<Timestamp>,
}

impl PoolStatus {
    fn of(schedule: &VestingSchedule) -> Self {
        Self {
            total_locked: schedule.total_locked(),
            total_unlocked: schedule.total_unlocked(),
            total_claimed: schedule.total_claimed(),
            claimable: schedule.claimable(),
            start_timestamp: schedule.start_timestamp(),
        }
    }
}

/// Candidate parameters for `check_swap`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCheck {
    /// Sender on the source chain
    pub sender: Address,
    /// Source chain name
    pub source_chain: String,
    /// Receiver on the destination chain
    pub receiver: Address,
    /// Destination chain name
    pub destination_chain: String,
    /// Transferred amount
    pub amount: Amount,
}

/// State owned by the actor
#[derive(Debug, Clone)]
pub struct LedgerState {
    /// Role-gated balances
    pub balances: BalanceLedger,
    /// Swap claims
    pub auditor: SwapAuditor,
    /// Vesting pools by id
    pub pools: HashMap<String, VestingSchedule>,
}

impl LedgerState {
    /// Fresh state owned by `owner`
    pub fn new(owner: Address) -> Self {
        Self {
            balances: BalanceLedger::new(owner),
            auditor: SwapAuditor::new(),
            pools: HashMap::new(),
        }
    }

    /// Rebuild from a storage snapshot
    pub fn restore(owner: Address, snapshot: Snapshot) -> Result<Self> {
        let access = AccessControl::with_roles(owner, snapshot.roles);
        Ok(Self {
            balances: BalanceLedger::restore(access, snapshot.balances),
            auditor: SwapAuditor::restore(snapshot.swaps)?,
            pools: snapshot.pools.into_iter().collect(),
        })
    }
}

/// Message sent to the bridge actor
#[derive(Debug)]
pub enum BridgeMessage {
    /// Flip the Adder role
    ToggleAdder {
        caller: Address,
        account: Address,
        response: oneshot::Sender<Result<RoleFlags>>,
    },

    /// Flip the Subtractor role
    ToggleSubtractor {
        caller: Address,
        account: Address,
        response: oneshot::Sender<Result<RoleFlags>>,
    },

    /// Role flags for an account
    Roles {
        account: Address,
        response: oneshot::Sender<Result<RoleFlags>>,
    },

    /// Credit a balance
    AddValue {
        caller: Address,
        account: Address,
        amount: Amount,
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Debit a balance
    SubtractValue {
        caller: Address,
        account: Address,
        amount: Amount,
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Read a balance
    UserBalance {
        account: Address,
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Register a vesting pool
    RegisterPool {
        id: String,
        owner: Address,
        curve: Curve,
        response: oneshot::Sender<Result<()>>,
    },

    /// Start a pool's clock
    StartFarming {
        pool: String,
        caller: Address,
        now: Timestamp,
        response: oneshot::Sender<Result<()>>,
    },

    /// Advance a pool's unlock watermark
    UnlockAsset {
        pool: String,
        now: Timestamp,
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Read a pool's watermarks
    PoolStatus {
        pool: String,
        response: oneshot::Sender<Result<PoolStatus>>,
    },

    /// Withdraw unlocked value from a pool
    Claim {
        pool: String,
        caller: Address,
        amount: Amount,
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Record a swap claim
    AddSwap {
        id: SwapId,
        claim: SwapClaim,
        response: oneshot::Sender<Result<Recorded>>,
    },

    /// Validate a swap against the record
    CheckSwap {
        id: SwapId,
        check: SwapCheck,
        response: oneshot::Sender<Result<bool>>,
    },

    /// Read a recorded swap
    GetSwap {
        id: SwapId,
        response: oneshot::Sender<Result<Option<SwapClaim>>>,
    },

    /// Merkle root over recorded swaps
    AuditRoot {
        response: oneshot::Sender<Result<Hash>>,
    },

    /// Inclusion proof for a recorded swap
    AuditProof {
        id: SwapId,
        response: oneshot::Sender<Result<MerkleProof>>,
    },

    /// Flush storage and stop
    Shutdown {
        response: oneshot::Sender<Result<()>>,
    },
}

/// Actor that processes bridge messages
pub struct BridgeActor {
    state: LedgerState,
    storage: Option<Storage>,
    metrics: Metrics,
    mailbox: mpsc::Receiver<BridgeMessage>,
}

impl BridgeActor {
    /// Create new actor
    pub fn new(
        state: LedgerState,
        storage: Option<Storage>,
        metrics: Metrics,
        mailbox: mpsc::Receiver<BridgeMessage>,
    ) -> Self {
        metrics.set_swaps_stored(state.auditor.len());
        Self {
            state,
            storage,
            metrics,
            mailbox,
        }
    }

    /// Run the actor event loop until shutdown or every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(
            persistence = self.storage.is_some(),
            pools = self.state.pools.len(),
            swaps = self.state.auditor.len(),
            "Bridge actor started"
        );

        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                BridgeMessage::Shutdown { response } => {
                    let result = self.flush();
                    let _ = response.send(result);
                    break;
                }
                msg => {
                    let started = Instant::now();
                    self.handle_message(msg);
                    self.metrics
                        .record_operation_duration(started.elapsed().as_secs_f64());
                }
            }
        }

        if let Err(e) = self.flush() {
            tracing::error!("Error flushing storage on stop: {}", e);
        }
        tracing::info!("Bridge actor stopped");
    }

    fn flush(&self) -> Result<()> {
        match &self.storage {
            Some(storage) => storage.flush(),
            None => Ok(()),
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: BridgeMessage) {
        match msg {
            BridgeMessage::ToggleAdder {
                caller,
                account,
                response,
            } => {
                let result = self.toggle(caller, account, true);
                self.reply(response, result);
            }

            BridgeMessage::ToggleSubtractor {
                caller,
                account,
                response,
            } => {
                let result = self.toggle(caller, account, false);
                self.reply(response, result);
            }

            BridgeMessage::Roles { account, response } => {
                let _ = response.send(Ok(self.state.balances.roles(&account)));
            }

            BridgeMessage::AddValue {
                caller,
                account,
                amount,
                response,
            } => {
                let result = self.add_value(caller, account, amount);
                self.reply(response, result);
            }

            BridgeMessage::SubtractValue {
                caller,
                account,
                amount,
                response,
            } => {
                let result = self.subtract_value(caller, account, amount);
                self.reply(response, result);
            }

            BridgeMessage::UserBalance { account, response } => {
                let _ = response.send(Ok(self.state.balances.user_balance(&account)));
            }

            BridgeMessage::RegisterPool {
                id,
                owner,
                curve,
                response,
            } => {
                let result = self.register_pool(id, owner, curve);
                self.reply(response, result);
            }

            BridgeMessage::StartFarming {
                pool,
                caller,
                now,
                response,
            } => {
                let result = self.start_farming(&pool, caller, now);
                self.reply(response, result);
            }

            BridgeMessage::UnlockAsset {
                pool,
                now,
                response,
            } => {
                let result = self.unlock_asset(&pool, now);
                self.reply(response, result);
            }

            BridgeMessage::PoolStatus { pool, response } => {
                let result = self
                    .state
                    .pools
                    .get(&pool)
                    .map(PoolStatus::of)
                    .ok_or(Error::UnknownPool(pool));
                self.reply(response, result);
            }

            BridgeMessage::Claim {
                pool,
                caller,
                amount,
                response,
            } => {
                let result = self.claim(&pool, caller, amount);
                self.reply(response, result);
            }

            BridgeMessage::AddSwap {
                id,
                claim,
                response,
            } => {
                let result = self.add_swap(id, claim);
                self.reply(response, result);
            }

            BridgeMessage::CheckSwap {
                id,
                check,
                response,
            } => {
                let result = self.state.auditor.check_swap(
                    &id,
                    &check.sender,
                    &check.source_chain,
                    &check.receiver,
                    &check.destination_chain,
                    check.amount,
                );
                if result.is_err() {
                    self.metrics.record_swap_check_failed();
                }
                self.reply(response, result);
            }

            BridgeMessage::GetSwap { id, response } => {
                let _ = response.send(Ok(self.state.auditor.get_swap(&id).cloned()));
            }

            BridgeMessage::AuditRoot { response } => {
                let _ = response.send(Ok(self.state.auditor.audit_root()));
            }

            BridgeMessage::AuditProof { id, response } => {
                let result = self.state.auditor.audit_proof(&id);
                self.reply(response, result);
            }

            BridgeMessage::Shutdown { .. } => {
                // Handled in run loop
            }
        }
    }

    fn reply<T>(&self, response: oneshot::Sender<Result<T>>, result: Result<T>) {
        if let Err(e) = &result {
            if e.is_caller_error() {
                self.metrics.record_rejected();
                match e {
                    Error::Unauthorized { caller, required } => {
                        tracing::warn!(%caller, %required, "Unauthorized operation rejected");
                    }
                    _ => tracing::debug!(error = %e, "Operation rejected"),
                }
            } else {
                tracing::error!("Error handling message: {}", e);
            }
        }
        let _ = response.send(result);
    }

    // Balance ledger

    fn toggle(&mut self, caller: Address, account: Address, adder: bool) -> Result<RoleFlags> {
        let ledger = &mut self.state.balances;
        let previous = ledger.roles(&account);
        let flags = if adder {
            ledger.toggle_adder(&caller, account)?
        } else {
            ledger.toggle_subtractor(&caller, account)?
        };

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.put_roles(&account, flags) {
                ledger.revert_roles(account, previous);
                return Err(e);
            }
        }
        Ok(flags)
    }

    fn add_value(&mut self, caller: Address, account: Address, amount: Amount) -> Result<Amount> {
        let ledger = &mut self.state.balances;
        let previous = ledger.user_balance(&account);
        let balance = ledger.add_value(&caller, account, amount)?;

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.put_balance(&account, balance) {
                ledger.revert_balance(account, previous);
                return Err(e);
            }
        }
        self.metrics.record_balance_mutation();
        Ok(balance)
    }

    fn subtract_value(
        &mut self,
        caller: Address,
        account: Address,
        amount: Amount,
    ) -> Result<Amount> {
        let ledger = &mut self.state.balances;
        let previous = ledger.user_balance(&account);
        let balance = ledger.subtract_value(&caller, account, amount)?;

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.put_balance(&account, balance) {
                ledger.revert_balance(account, previous);
                return Err(e);
            }
        }
        self.metrics.record_balance_mutation();
        Ok(balance)
    }

    // Vesting pools

    fn register_pool(&mut self, id: String, owner: Address, curve: Curve) -> Result<()> {
        if self.state.pools.contains_key(&id) {
            return Err(Error::DuplicatePool(id));
        }

        let schedule = VestingSchedule::new(owner, curve);
        if let Some(storage) = &self.storage {
            storage.put_pool(&id, &schedule)?;
        }

        tracing::info!(pool = %id, %owner, total_locked = schedule.total_locked(), "Vesting pool registered");
        self.state.pools.insert(id, schedule);
        Ok(())
    }

    fn start_farming(&mut self, id: &str, caller: Address, now: Timestamp) -> Result<()> {
        let storage = self.storage.as_ref();
        let pool = self
            .state
            .pools
            .get_mut(id)
            .ok_or_else(|| Error::UnknownPool(id.to_string()))?;
        let previous = pool.state();
        pool.start_farming(&caller, now)?;

        if let Some(storage) = storage {
            if let Err(e) = storage.put_pool(id, pool) {
                pool.revert_state(previous);
                return Err(e);
            }
        }
        Ok(())
    }

    fn unlock_asset(&mut self, id: &str, now: Timestamp) -> Result<Amount> {
        let storage = self.storage.as_ref();
        let pool = self
            .state
            .pools
            .get_mut(id)
            .ok_or_else(|| Error::UnknownPool(id.to_string()))?;
        let previous = pool.state();
        let unlocked = pool.unlock_asset(now)?;
        if unlocked == previous.total_unlocked {
            return Ok(unlocked);
        }

        if let Some(storage) = storage {
            if let Err(e) = storage.put_pool(id, pool) {
                pool.revert_state(previous);
                return Err(e);
            }
        }

        tracing::debug!(pool = %id, now, total_unlocked = unlocked, "Unlock watermark advanced");
        self.metrics.record_unlock();
        Ok(unlocked)
    }

    fn claim(&mut self, id: &str, caller: Address, amount: Amount) -> Result<Amount> {
        let storage = self.storage.as_ref();
        let pool = self
            .state
            .pools
            .get_mut(id)
            .ok_or_else(|| Error::UnknownPool(id.to_string()))?;
        let previous = pool.state();
        let claimed = pool.claim(&caller, amount)?;

        if let Some(storage) = storage {
            if let Err(e) = storage.put_pool(id, pool) {
                pool.revert_state(previous);
                return Err(e);
            }
        }
        Ok(claimed)
    }

    // Swap auditor

    fn add_swap(&mut self, id: SwapId, claim: SwapClaim) -> Result<Recorded> {
        let auditor = &mut self.state.auditor;
        let outcome = auditor.add_swap(id, claim.clone())?;
        if outcome == Recorded::Unchanged {
            return Ok(outcome);
        }

        if let Some(storage) = &self.storage {
            let seq = (auditor.len() - 1) as u64;
            if let Err(e) = storage.put_swap(seq, &id, &claim) {
                auditor.revert_last(&id);
                return Err(e);
            }
        }

        self.metrics.record_swap_recorded(auditor.len());
        Ok(outcome)
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct BridgeHandle {
    sender: mpsc::Sender<BridgeMessage>,
}

impl BridgeHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<BridgeMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> BridgeMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Flip the Adder role for `account`
    pub async fn toggle_adder(&self, caller: Address, account: Address) -> Result<RoleFlags> {
        self.request(|response| BridgeMessage::ToggleAdder {
            caller,
            account,
            response,
        })
        .await
    }

    /// Flip the Subtractor role for `account`
    pub async fn toggle_subtractor(&self, caller: Address, account: Address) -> Result<RoleFlags> {
        self.request(|response| BridgeMessage::ToggleSubtractor {
            caller,
            account,
            response,
        })
        .await
    }

    /// Role flags for `account`
    pub async fn roles(&self, account: Address) -> Result<RoleFlags> {
        self.request(|response| BridgeMessage::Roles { account, response })
            .await
    }

    /// Credit `account`; returns the new balance
    pub async fn add_value(&self, caller: Address, account: Address, amount: Amount) -> Result<Amount> {
        self.request(|response| BridgeMessage::AddValue {
            caller,
            account,
            amount,
            response,
        })
        .await
    }

    /// Debit `account`; returns the new balance
    pub async fn subtract_value(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
    ) -> Result<Amount> {
        self.request(|response| BridgeMessage::SubtractValue {
            caller,
            account,
            amount,
            response,
        })
        .await
    }

    /// Balance of `account`
    pub async fn user_balance(&self, account: Address) -> Result<Amount> {
        self.request(|response| BridgeMessage::UserBalance { account, response })
            .await
    }

    /// Register a vesting pool
    pub async fn register_pool(&self, id: impl Into<String>, owner: Address, curve: Curve) -> Result<()> {
        let id = id.into();
        self.request(|response| BridgeMessage::RegisterPool {
            id,
            owner,
            curve,
            response,
        })
        .await
    }

    /// Start `pool` at time `now`
    pub async fn start_farming(&self, pool: impl Into<String>, caller: Address, now: Timestamp) -> Result<()> {
        let pool = pool.into();
        self.request(|response| BridgeMessage::StartFarming {
            pool,
            caller,
            now,
            response,
        })
        .await
    }

    /// Advance `pool` to time `now`; returns the unlock watermark
    pub async fn unlock_asset(&self, pool: impl Into<String>, now: Timestamp) -> Result<Amount> {
        let pool = pool.into();
        self.request(|response| BridgeMessage::UnlockAsset {
            pool,
            now,
            response,
        })
        .await
    }

    /// Watermarks for `pool`
    pub async fn pool_status(&self, pool: impl Into<String>) -> Result<PoolStatus> {
        let pool = pool.into();
        self.request(|response| BridgeMessage::PoolStatus { pool, response })
            .await
    }

    /// Claim `amount` from `pool`; returns the claim watermark
    pub async fn claim(&self, pool: impl Into<String>, caller: Address, amount: Amount) -> Result<Amount> {
        let pool = pool.into();
        self.request(|response| BridgeMessage::Claim {
            pool,
            caller,
            amount,
            response,
        })
        .await
    }

    /// Record a swap claim
    pub async fn add_swap(&self, id: SwapId, claim: SwapClaim) -> Result<Recorded> {
        self.request(|response| BridgeMessage::AddSwap {
            id,
            claim,
            response,
        })
        .await
    }

    /// Validate a swap against the record
    pub async fn check_swap(&self, id: SwapId, check: SwapCheck) -> Result<bool> {
        self.request(|response| BridgeMessage::CheckSwap {
            id,
            check,
            response,
        })
        .await
    }

    /// Recorded claim for `id`
    pub async fn get_swap(&self, id: SwapId) -> Result<Option<SwapClaim>> {
        self.request(|response| BridgeMessage::GetSwap { id, response })
            .await
    }

    /// Merkle root over recorded swaps
    pub async fn audit_root(&self) -> Result<Hash> {
        self.request(|response| BridgeMessage::AuditRoot { response })
            .await
    }

    /// Inclusion proof for swap `id`
    pub async fn audit_proof(&self, id: SwapId) -> Result<MerkleProof> {
        self.request(|response| BridgeMessage::AuditProof { id, response })
            .await
    }

    /// Flush storage and stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|response| BridgeMessage::Shutdown { response })
            .await
    }
}

/// Spawn the bridge actor
pub fn spawn_bridge_actor(
    state: LedgerState,
    storage: Option<Storage>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> (BridgeHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = BridgeActor::new(state, storage, metrics, rx);

    let task = tokio::spawn(async move {
        actor.run().await;
    });

    (BridgeHandle::new(tx), task)
}
