//! Bridge orchestration layer
//!
//! Ties storage, the actor and the clock together into the API a relayer
//! calls. Time-dependent vesting operations read `now` from the injected
//! [`Clock`]; everything else forwards to the actor unchanged.
//!
//! # Example
//!
//! ```no_run
//! use bridge_core::{Bridge, Config};
//!
//! #[tokio::main]
//! async fn main() -> bridge_core::Result<()> {
//!     let config = Config::default();
//!     let bridge = Bridge::open(config).await?;
//!
//!     // let balance = bridge.user_balance(account).await?;
//!
//!     bridge.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_bridge_actor, BridgeHandle, LedgerState, PoolStatus, SwapCheck},
    auditor::Recorded,
    clock::{Clock, SystemClock},
    curve::Curve,
    merkle::{Hash, MerkleProof},
    metrics::Metrics,
    storage::{Snapshot, Storage},
    types::{Address, Amount, RoleFlags, SwapClaim, SwapId},
    Config, Error, Result,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Main bridge interface
pub struct Bridge {
    /// Actor handle for async operations
    handle: BridgeHandle,

    /// Actor task, awaited on shutdown so storage is closed
    task: JoinHandle<()>,

    /// Time source for vesting
    clock: Arc<dyn Clock>,

    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Bridge {
    /// Open bridge with configuration, on wall-clock time
    pub async fn open(config: Config) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Open bridge with configuration and an explicit clock
    pub async fn open_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let metrics =
            Metrics::new().map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let (storage, snapshot) = if config.persistence {
            let storage = Storage::open(&config)?;
            let snapshot = storage.load_snapshot()?;
            match snapshot.owner {
                Some(owner) if owner != config.owner => {
                    return Err(Error::Config(format!(
                        "Store is owned by {}, config names {}",
                        owner, config.owner
                    )));
                }
                Some(_) => {}
                None => storage.put_owner(&config.owner)?,
            }
            (Some(storage), snapshot)
        } else {
            (None, Snapshot::default())
        };

        let state = LedgerState::restore(config.owner, snapshot)?;
        let restored_pools: Vec<String> = state.pools.keys().cloned().collect();

        let (handle, task) = spawn_bridge_actor(
            state,
            storage,
            metrics.clone(),
            config.actor.mailbox_capacity,
        );

        for pool in &config.pools {
            if restored_pools.contains(&pool.id) {
                tracing::debug!(pool = %pool.id, "Vesting pool restored from storage");
                continue;
            }
            let owner = pool.owner.unwrap_or(config.owner);
            handle
                .register_pool(pool.id.clone(), owner, pool.curve.build()?)
                .await?;
        }

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            owner = %config.owner,
            "Bridge opened"
        );

        Ok(Self {
            handle,
            task,
            clock,
            metrics,
            config,
        })
    }

    /// Handle for sending requests from other tasks
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Metrics recorded by the actor
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration the bridge was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    // Balance ledger

    /// Flip the Adder role for `account` (owner only)
    pub async fn toggle_adder(&self, caller: Address, account: Address) -> Result<RoleFlags> {
        self.handle.toggle_adder(caller, account).await
    }

    /// Flip the Subtractor role for `account` (owner only)
    pub async fn toggle_subtractor(&self, caller: Address, account: Address) -> Result<RoleFlags> {
        self.handle.toggle_subtractor(caller, account).await
    }

    /// Whether `account` holds the Adder role
    pub async fn is_adder(&self, account: Address) -> Result<bool> {
        Ok(self.handle.roles(account).await?.adder)
    }

    /// Whether `account` holds the Subtractor role
    pub async fn is_subtractor(&self, account: Address) -> Result<bool> {
        Ok(self.handle.roles(account).await?.subtractor)
    }

    /// Credit `account` (caller must be an Adder)
    pub async fn add_value(&self, caller: Address, account: Address, amount: Amount) -> Result<Amount> {
        self.handle.add_value(caller, account, amount).await
    }

    /// Debit `account` (caller must be a Subtractor)
    pub async fn subtract_value(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
    ) -> Result<Amount> {
        self.handle.subtract_value(caller, account, amount).await
    }

    /// Balance of `account`
    pub async fn user_balance(&self, account: Address) -> Result<Amount> {
        self.handle.user_balance(account).await
    }

    // Vesting pools

    /// Register a vesting pool at runtime
    pub async fn register_pool(&self, id: impl Into<String>, owner: Address, curve: Curve) -> Result<()> {
        self.handle.register_pool(id, owner, curve).await
    }

    /// Start `pool` now
    pub async fn start_farming(&self, pool: &str, caller: Address) -> Result<()> {
        let now = self.clock.now_secs();
        self.handle.start_farming(pool, caller, now).await
    }

    /// Advance `pool` to now; returns the unlock watermark
    pub async fn unlock_asset(&self, pool: &str) -> Result<Amount> {
        let now = self.clock.now_secs();
        self.handle.unlock_asset(pool, now).await
    }

    /// Unlock watermark without recomputing
    pub async fn total_unlocked(&self, pool: &str) -> Result<Amount> {
        Ok(self.handle.pool_status(pool).await?.total_unlocked)
    }

    /// Watermarks for `pool`
    pub async fn pool_status(&self, pool: &str) -> Result<PoolStatus> {
        self.handle.pool_status(pool).await
    }

    /// Claim unlocked value from `pool` (pool owner only)
    pub async fn claim(&self, pool: &str, caller: Address, amount: Amount) -> Result<Amount> {
        self.handle.claim(pool, caller, amount).await
    }

    // Swap auditor

    /// Record a swap claim
    pub async fn add_swap(&self, id: SwapId, claim: SwapClaim) -> Result<Recorded> {
        self.handle.add_swap(id, claim).await
    }

    /// Validate swap parameters against the record
    pub async fn check_swap(
        &self,
        id: SwapId,
        sender: Address,
        source_chain: &str,
        receiver: Address,
        destination_chain: &str,
        amount: Amount,
    ) -> Result<bool> {
        let check = SwapCheck {
            sender,
            source_chain: source_chain.to_string(),
            receiver,
            destination_chain: destination_chain.to_string(),
            amount,
        };
        self.handle.check_swap(id, check).await
    }

    /// Recorded claim for `id`
    pub async fn get_swap(&self, id: SwapId) -> Result<Option<SwapClaim>> {
        self.handle.get_swap(id).await
    }

    /// Merkle root over every recorded swap
    pub async fn audit_root(&self) -> Result<Hash> {
        self.handle.audit_root().await
    }

    /// Inclusion proof for swap `id`
    pub async fn audit_proof(&self, id: SwapId) -> Result<MerkleProof> {
        self.handle.audit_proof(id).await
    }

    /// Stop the actor and close storage
    pub async fn shutdown(self) -> Result<()> {
        let result = self.handle.shutdown().await;
        self.task
            .await
            .map_err(|e| Error::Concurrency(format!("Actor task failed: {}", e)))?;
        tracing::info!("Bridge shut down");
        result
    }
}
