//! Configuration for the bridge service

use crate::curve::{Curve, CurvedCurve, LinearCurve};
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Persist ledger state to RocksDB
    pub persistence: bool,

    /// Owner of the balance ledger and default owner of vesting pools
    pub owner: Address,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Actor configuration
    pub actor: ActorConfig,

    /// Vesting pools registered at startup
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/bridge"),
            service_name: "bridge-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            persistence: true,
            owner: Address::ZERO,
            rocksdb: RocksDBConfig::default(),
            actor: ActorConfig::default(),
            pools: Vec::new(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Sync WAL on every write
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            sync_writes: true,
            enable_statistics: false,
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

/// A vesting pool declared in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool identifier
    pub id: String,

    /// Pool owner; defaults to the service owner
    #[serde(default)]
    pub owner: Option<Address>,

    /// Release curve
    pub curve: CurveConfig,
}

/// Curve parameters as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurveConfig {
    /// Fixed amount per whole period
    Linear {
        /// Released per period, in base units
        #[serde(with = "amount_string")]
        amount_per_period: Amount,
        /// Period length in seconds
        period_seconds: u64,
        /// Number of periods in the horizon
        periods: u64,
    },
    /// Hyperbolic saturation
    Curved {
        /// Magnitude (asymptotic cap)
        #[serde(with = "amount_string")]
        a: Amount,
        /// Timescale
        #[serde(with = "amount_string")]
        c: u128,
    },
}

impl CurveConfig {
    /// Validate parameters and build the curve
    pub fn build(&self) -> crate::Result<Curve> {
        match *self {
            CurveConfig::Linear {
                amount_per_period,
                period_seconds,
                periods,
            } => Ok(LinearCurve::new(amount_per_period, period_seconds, periods)?.into()),
            CurveConfig::Curved { a, c } => Ok(CurvedCurve::new(a, c)?.into()),
        }
    }
}

/// `u128` amounts as decimal strings, since TOML integers stop at `i64`.
/// Plain integers are accepted on input.
pub mod amount_string {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    /// Serialize as a decimal string
    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize from a decimal string or a non-negative integer
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = u128;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(v as u128)
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                u128::try_from(v).map_err(|_| E::custom("amount must be non-negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.replace('_', "").parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("BRIDGE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(owner) = std::env::var("BRIDGE_OWNER") {
            config.owner = owner.parse()?;
        }

        if let Ok(flag) = std::env::var("BRIDGE_PERSISTENCE") {
            config.persistence = flag
                .parse()
                .map_err(|_| crate::Error::Config(format!("Invalid BRIDGE_PERSISTENCE: {}", flag)))?;
        }

        if let Ok(capacity) = std::env::var("BRIDGE_MAILBOX_CAPACITY") {
            config.actor.mailbox_capacity = capacity.parse().map_err(|_| {
                crate::Error::Config(format!("Invalid BRIDGE_MAILBOX_CAPACITY: {}", capacity))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> crate::Result<()> {
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for pool in &self.pools {
            if !seen.insert(pool.id.as_str()) {
                return Err(crate::Error::DuplicatePool(pool.id.clone()));
            }
            pool.curve.build()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "bridge-core");
        assert!(config.persistence);
        assert_eq!(config.actor.mailbox_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_pools() {
        let text = r#"
            data_dir = "/tmp/bridge"
            service_name = "bridge-core"
            service_version = "0.1.0"
            persistence = false
            owner = "0x0000000000000000000000000000000000000001"

            [rocksdb]
            write_buffer_size_mb = 64
            max_write_buffer_number = 2
            max_background_jobs = 2
            sync_writes = true
            enable_statistics = false

            [actor]
            mailbox_capacity = 16

            [[pools]]
            id = "daily"
            curve = { kind = "linear", amount_per_period = "1000000000000000000000", period_seconds = 86400, periods = 365 }

            [[pools]]
            id = "farm"
            curve = { kind = "curved", a = "26499999999995", c = 2100000 }
        "#;

        let config: Config = toml::from_str(text).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.owner, Address::from_low_u64(1));
        assert_eq!(config.pools.len(), 2);
        assert_eq!(
            config.pools[0].curve,
            CurveConfig::Linear {
                amount_per_period: 1_000_000_000_000_000_000_000,
                period_seconds: 86_400,
                periods: 365,
            }
        );
        assert_eq!(
            config.pools[1].curve,
            CurveConfig::Curved {
                a: 26_499_999_999_995,
                c: 2_100_000,
            }
        );
    }

    #[test]
    fn test_duplicate_pool_ids_rejected() {
        let mut config = Config::default();
        let pool = PoolConfig {
            id: "p".to_string(),
            owner: None,
            curve: CurveConfig::Curved { a: 1, c: 1 },
        };
        config.pools = vec![pool.clone(), pool];
        assert!(matches!(
            config.validate(),
            Err(crate::Error::DuplicatePool(_))
        ));
    }

    #[test]
    fn test_invalid_curve_rejected() {
        let mut config = Config::default();
        config.pools = vec![PoolConfig {
            id: "broken".to_string(),
            owner: None,
            curve: CurveConfig::Linear {
                amount_per_period: 1,
                period_seconds: 0,
                periods: 1,
            },
        }];
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }
}
