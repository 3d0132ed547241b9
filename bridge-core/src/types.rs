//! Core types shared by the ledgers
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact integer arithmetic (`u128` amounts, `u64` second timestamps)

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Token amount in base units
pub type Amount = u128;

/// Seconds since the Unix epoch
pub type Timestamp = u64;

/// 20-byte account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Address whose last byte is `n`. Handy for fixtures and simulations.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(digits)
            .map_err(|e| crate::Error::Config(format!("Invalid address {}: {}", s, e)))?;
        let bytes: [u8; 20] = raw.try_into().map_err(|v: Vec<u8>| {
            crate::Error::Config(format!("Address must be 20 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(de::Error::custom)
        } else {
            <[u8; 20]>::deserialize(deserializer).map(Address)
        }
    }
}

/// Capability checked before a gated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The single configuration owner
    Owner,
    /// May increase balances
    Adder,
    /// May decrease balances
    Subtractor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Adder => write!(f, "adder"),
            Role::Subtractor => write!(f, "subtractor"),
        }
    }
}

/// Per-account role flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleFlags {
    /// May call `add_value`
    pub adder: bool,
    /// May call `subtract_value`
    pub subtractor: bool,
}

impl RoleFlags {
    /// True when neither flag is set
    pub fn is_empty(&self) -> bool {
        !self.adder && !self.subtractor
    }
}

/// Swap correlation identifier, generated by the relayer that first sees the swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwapId(Uuid);

impl SwapId {
    /// Wrap an existing UUID
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Fresh time-ordered id
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl From<Uuid> for SwapId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A party's claim about a cross-chain transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapClaim {
    /// Account that locked funds on the source chain
    pub sender: Address,
    /// Source chain name
    pub source_chain: String,
    /// Account to be credited on the destination chain
    pub receiver: Address,
    /// Destination chain name
    pub destination_chain: String,
    /// Transferred amount
    pub amount: Amount,
    /// Source-chain transaction reference (provenance only)
    pub source_tx: String,
    /// Destination-chain transaction reference (provenance only)
    pub destination_tx: String,
}

impl SwapClaim {
    /// Canonical bytes used for the audit digest
    pub fn canonical_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// First checked field on which `self` disagrees with the candidate, if any.
    /// Transaction references are provenance and never compared.
    pub fn first_mismatch(
        &self,
        sender: &Address,
        source_chain: &str,
        receiver: &Address,
        destination_chain: &str,
        amount: Amount,
    ) -> Option<&'static str> {
        if self.sender != *sender {
            Some("sender")
        } else if self.source_chain != source_chain {
            Some("source_chain")
        } else if self.receiver != *receiver {
            Some("receiver")
        } else if self.destination_chain != destination_chain {
            Some("destination_chain")
        } else if self.amount != amount {
            Some("amount")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_roundtrip() {
        let addr = Address::from_low_u64(0xdead_beef);
        let text = addr.to_string();
        assert_eq!(text, "0x00000000000000000000000000000000deadbeef");
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("not-hex".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_json_is_hex_string() {
        let addr = Address::from_low_u64(7);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_first_mismatch_ignores_tx_refs() {
        let claim = SwapClaim {
            sender: Address::from_low_u64(1),
            source_chain: "ethereum".to_string(),
            receiver: Address::from_low_u64(2),
            destination_chain: "polygon".to_string(),
            amount: 500,
            source_tx: "0xaa".to_string(),
            destination_tx: "0xbb".to_string(),
        };

        assert_eq!(
            claim.first_mismatch(
                &Address::from_low_u64(1),
                "ethereum",
                &Address::from_low_u64(2),
                "polygon",
                500
            ),
            None
        );
        assert_eq!(
            claim.first_mismatch(
                &Address::from_low_u64(1),
                "ethereum",
                &Address::from_low_u64(3),
                "polygon",
                500
            ),
            Some("receiver")
        );
    }
}
