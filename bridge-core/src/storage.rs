//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `balances` - Account balances (key: address)
//! - `roles` - Role flags (key: address; absent when no role is held)
//! - `swaps` - Swap claims in insertion order (key: sequence number, big-endian)
//! - `pools` - Vesting schedules (key: pool id)
//! - `meta` - Schema version and ledger owner
//!
//! Values are bincode-encoded. The swaps key is the claim's audit leaf index,
//! so iterating the column family replays the audit log in order.

use crate::{
    error::{Error, Result},
    types::{Address, Amount, RoleFlags, SwapClaim, SwapId},
    vesting::VestingSchedule,
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompressionType, IteratorMode, Options, WriteBatch,
    WriteOptions, DB,
};
use std::fmt;

/// Layout version written to `meta/schema_version`
pub const SCHEMA_VERSION: u32 = 1;

/// Column family names
const CF_BALANCES: &str = "balances";
const CF_ROLES: &str = "roles";
const CF_SWAPS: &str = "swaps";
const CF_POOLS: &str = "pools";
const CF_META: &str = "meta";

const META_SCHEMA_VERSION: &[u8] = b"schema_version";
const META_OWNER: &[u8] = b"owner";

/// Everything persisted, as read back on startup
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Ledger owner recorded on first open
    pub owner: Option<Address>,
    /// Account balances
    pub balances: Vec<(Address, Amount)>,
    /// Non-empty role flags
    pub roles: Vec<(Address, RoleFlags)>,
    /// Swap claims in insertion order
    pub swaps: Vec<(SwapId, SwapClaim)>,
    /// Vesting pools by id
    pub pools: Vec<(String, VestingSchedule)>,
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
    sync_writes: bool,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database, checking the layout version
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_BALANCES, Self::cf_options_point()),
            ColumnFamilyDescriptor::new(CF_ROLES, Self::cf_options_point()),
            ColumnFamilyDescriptor::new(CF_SWAPS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_POOLS, Self::cf_options_point()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        let storage = Self {
            db,
            sync_writes: config.rocksdb.sync_writes,
        };
        storage.check_schema_version()?;

        tracing::info!(path = ?path, schema_version = SCHEMA_VERSION, "Opened RocksDB");
        Ok(storage)
    }

    // Column family options

    fn cf_options_point() -> Options {
        let mut opts = Options::default();
        // Small values looked up by key
        opts.set_compression_type(DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    fn check_schema_version(&self) -> Result<()> {
        let cf = self.cf_handle(CF_META)?;

        match self.db.get_cf(cf, META_SCHEMA_VERSION)? {
            None => {
                self.db.put_cf_opt(
                    cf,
                    META_SCHEMA_VERSION,
                    SCHEMA_VERSION.to_be_bytes(),
                    &self.write_options(),
                )?;
                Ok(())
            }
            Some(raw) => {
                let bytes: [u8; 4] = raw.as_slice().try_into().map_err(|_| {
                    Error::Storage(format!("Corrupt schema version ({} bytes)", raw.len()))
                })?;
                let found = u32::from_be_bytes(bytes);
                if found == SCHEMA_VERSION {
                    Ok(())
                } else {
                    Err(Error::SchemaMismatch {
                        expected: SCHEMA_VERSION,
                        found,
                    })
                }
            }
        }
    }

    // Meta

    /// Record the ledger owner (written once, on first open)
    pub fn put_owner(&self, owner: &Address) -> Result<()> {
        let cf = self.cf_handle(CF_META)?;
        self.db
            .put_cf_opt(cf, META_OWNER, owner.as_bytes(), &self.write_options())?;
        Ok(())
    }

    /// Ledger owner, if one was recorded
    pub fn get_owner(&self) -> Result<Option<Address>> {
        let cf = self.cf_handle(CF_META)?;
        self.db
            .get_cf(cf, META_OWNER)?
            .map(|raw| address_from_key(&raw))
            .transpose()
    }

    // Balance ledger

    /// Put account balance
    pub fn put_balance(&self, account: &Address, balance: Amount) -> Result<()> {
        let cf = self.cf_handle(CF_BALANCES)?;
        let value = bincode::serialize(&balance)?;
        self.db
            .put_cf_opt(cf, account.as_bytes(), value, &self.write_options())?;
        Ok(())
    }

    /// Put role flags; empty flags delete the entry
    pub fn put_roles(&self, account: &Address, flags: RoleFlags) -> Result<()> {
        let cf = self.cf_handle(CF_ROLES)?;
        if flags.is_empty() {
            self.db
                .delete_cf_opt(cf, account.as_bytes(), &self.write_options())?;
        } else {
            let value = bincode::serialize(&flags)?;
            self.db
                .put_cf_opt(cf, account.as_bytes(), value, &self.write_options())?;
        }
        Ok(())
    }

    // Swap auditor

    /// Append a swap claim at audit position `seq`
    pub fn put_swap(&self, seq: u64, id: &SwapId, claim: &SwapClaim) -> Result<()> {
        let cf = self.cf_handle(CF_SWAPS)?;
        let value = bincode::serialize(&(id, claim))?;
        self.db
            .put_cf_opt(cf, seq.to_be_bytes(), value, &self.write_options())?;

        tracing::debug!(seq, swap_id = %id, "Swap claim persisted");
        Ok(())
    }

    // Vesting pools

    /// Put a vesting pool's full schedule
    pub fn put_pool(&self, id: &str, schedule: &VestingSchedule) -> Result<()> {
        let cf = self.cf_handle(CF_POOLS)?;
        let value = bincode::serialize(schedule)?;
        self.db
            .put_cf_opt(cf, id.as_bytes(), value, &self.write_options())?;
        Ok(())
    }

    /// Register several pools atomically
    pub fn put_pools_atomic<'a>(
        &self,
        pools: impl IntoIterator<Item = (&'a str, &'a VestingSchedule)>,
    ) -> Result<()> {
        let cf = self.cf_handle(CF_POOLS)?;
        let mut batch = WriteBatch::default();
        for (id, schedule) in pools {
            batch.put_cf(cf, id.as_bytes(), bincode::serialize(schedule)?);
        }
        self.db.write_opt(batch, &self.write_options())?;
        Ok(())
    }

    // Restore

    /// Read every column family back into memory
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot {
            owner: self.get_owner()?,
            ..Snapshot::default()
        };

        for item in self.db.iterator_cf(self.cf_handle(CF_BALANCES)?, IteratorMode::Start) {
            let (key, value) = item?;
            snapshot
                .balances
                .push((address_from_key(&key)?, bincode::deserialize(&value)?));
        }

        for item in self.db.iterator_cf(self.cf_handle(CF_ROLES)?, IteratorMode::Start) {
            let (key, value) = item?;
            snapshot
                .roles
                .push((address_from_key(&key)?, bincode::deserialize(&value)?));
        }

        // Big-endian keys iterate in insertion order
        for item in self.db.iterator_cf(self.cf_handle(CF_SWAPS)?, IteratorMode::Start) {
            let (_, value) = item?;
            snapshot.swaps.push(bincode::deserialize(&value)?);
        }

        for item in self.db.iterator_cf(self.cf_handle(CF_POOLS)?, IteratorMode::Start) {
            let (key, value) = item?;
            let id = String::from_utf8(key.to_vec())
                .map_err(|e| Error::Storage(format!("Invalid pool id: {}", e)))?;
            snapshot.pools.push((id, bincode::deserialize(&value)?));
        }

        tracing::info!(
            balances = snapshot.balances.len(),
            roles = snapshot.roles.len(),
            swaps = snapshot.swaps.len(),
            pools = snapshot.pools.len(),
            "Loaded snapshot"
        );
        Ok(snapshot)
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn address_from_key(key: &[u8]) -> Result<Address> {
    let bytes: [u8; 20] = key
        .try_into()
        .map_err(|_| Error::Storage(format!("Invalid address key ({} bytes)", key.len())))?;
    Ok(Address::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Curve, LinearCurve};
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn claim(amount: Amount) -> SwapClaim {
        SwapClaim {
            sender: Address::from_low_u64(10),
            source_chain: "ethereum".to_string(),
            receiver: Address::from_low_u64(20),
            destination_chain: "bsc".to_string(),
            amount,
            source_tx: "0xsrc".to_string(),
            destination_tx: String::new(),
        }
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_BALANCES).is_some());
        assert!(storage.db.cf_handle(CF_SWAPS).is_some());

        let snapshot = storage.load_snapshot().unwrap();
        assert!(snapshot.owner.is_none());
        assert!(snapshot.balances.is_empty());
    }

    #[test]
    fn test_balances_and_roles_roundtrip() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        let account = Address::from_low_u64(7);

        storage.put_owner(&Address::from_low_u64(1)).unwrap();
        storage.put_balance(&account, 500).unwrap();
        storage
            .put_roles(&account, RoleFlags { adder: true, subtractor: false })
            .unwrap();

        let snapshot = storage.load_snapshot().unwrap();
        assert_eq!(snapshot.owner, Some(Address::from_low_u64(1)));
        assert_eq!(snapshot.balances, vec![(account, 500)]);
        assert_eq!(snapshot.roles.len(), 1);

        storage.put_roles(&account, RoleFlags::default()).unwrap();
        assert!(storage.load_snapshot().unwrap().roles.is_empty());
    }

    #[test]
    fn test_swaps_load_in_sequence_order() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let ids: Vec<SwapId> = (0..300).map(|_| SwapId::generate()).collect();
        // Write out of order; keys still sort by sequence
        for (seq, id) in ids.iter().enumerate().rev() {
            storage.put_swap(seq as u64, id, &claim(seq as u128)).unwrap();
        }

        let loaded: Vec<SwapId> = storage
            .load_snapshot()
            .unwrap()
            .swaps
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(loaded, ids);
    }

    #[test]
    fn test_pool_roundtrip() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let curve: Curve = LinearCurve::new(10, 60, 5).unwrap().into();
        let mut schedule = VestingSchedule::new(Address::from_low_u64(1), curve);
        schedule
            .start_farming(&Address::from_low_u64(1), 1_000)
            .unwrap();
        storage.put_pools_atomic([("daily", &schedule)]).unwrap();

        let snapshot = storage.load_snapshot().unwrap();
        assert_eq!(snapshot.pools, vec![("daily".to_string(), schedule)]);
    }

    #[test]
    fn test_reopen_preserves_state() {
        let (config, _temp) = test_config();
        let account = Address::from_low_u64(3);
        {
            let storage = Storage::open(&config).unwrap();
            storage.put_balance(&account, 42).unwrap();
            storage.flush().unwrap();
        }

        let storage = Storage::open(&config).unwrap();
        assert_eq!(storage.load_snapshot().unwrap().balances, vec![(account, 42)]);
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let (config, _temp) = test_config();
        {
            let storage = Storage::open(&config).unwrap();
            let cf = storage.cf_handle(CF_META).unwrap();
            storage
                .db
                .put_cf(cf, META_SCHEMA_VERSION, 99u32.to_be_bytes())
                .unwrap();
        }

        let result = Storage::open(&config);
        assert!(matches!(
            result,
            Err(Error::SchemaMismatch { expected: SCHEMA_VERSION, found: 99 })
        ));
    }
}
