//! Append-only Merkle log over recorded swap claims
//!
//! Each recorded claim contributes one leaf, `sha256(id || bincode(claim))`,
//! in insertion order. The root commits to the whole audit trail so relayers
//! on both chains can compare a single hash, and an inclusion proof shows a
//! claim is part of that trail.
//!
//! Odd levels duplicate their last node.

use crate::types::{SwapClaim, SwapId};
use crate::Result;
use sha2::{Digest, Sha256};

/// 32-byte SHA-256 digest
pub type Hash = [u8; 32];

/// Leaf digest for a recorded claim
pub fn claim_digest(id: &SwapId, claim: &SwapClaim) -> Result<Hash> {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(claim.canonical_bytes()?);
    Ok(hasher.finalize().into())
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [single] => hash_pair(single, single),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Side on which a proof sibling sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sibling is on the left
    Left,
    /// Sibling is on the right
    Right,
}

/// Inclusion proof for one leaf
#[derive(Debug, Clone)]
pub struct MerkleProof {
    /// Leaf being proven
    pub leaf: Hash,
    /// Siblings from the leaf level upward
    pub siblings: Vec<(Direction, Hash)>,
    /// Root the proof was generated against
    pub root: Hash,
}

impl MerkleProof {
    /// Recompute the root from the leaf and siblings
    pub fn verify(&self) -> bool {
        let computed = self
            .siblings
            .iter()
            .fold(self.leaf, |current, (direction, sibling)| match direction {
                Direction::Left => hash_pair(sibling, &current),
                Direction::Right => hash_pair(&current, sibling),
            });
        computed == self.root
    }
}

/// Append-only audit log
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    leaves: Vec<Hash>,
    cached_root: Option<Hash>,
}

impl AuditLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a leaf, returning its index
    pub fn append(&mut self, leaf: Hash) -> usize {
        self.leaves.push(leaf);
        self.cached_root = None;
        self.leaves.len() - 1
    }

    /// Drop the most recent leaf (used to undo an append whose commit failed)
    pub(crate) fn pop(&mut self) -> Option<Hash> {
        self.cached_root = None;
        self.leaves.pop()
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// True when nothing was appended
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Root of the log; all zeroes when empty
    pub fn root(&mut self) -> Hash {
        if let Some(root) = self.cached_root {
            return root;
        }

        let root = match self.leaves.len() {
            0 => [0u8; 32],
            1 => self.leaves[0],
            _ => {
                let mut level = self.leaves.clone();
                while level.len() > 1 {
                    level = next_level(&level);
                }
                level[0]
            }
        };
        self.cached_root = Some(root);
        root
    }

    /// Inclusion proof for the leaf at `index`
    pub fn proof(&mut self, index: usize) -> Option<MerkleProof> {
        let leaf = *self.leaves.get(index)?;
        let root = self.root();

        let mut siblings = Vec::new();
        let mut level = self.leaves.clone();
        let mut position = index;

        while level.len() > 1 {
            let sibling = if position % 2 == 0 {
                let right = level.get(position + 1).copied().unwrap_or(level[position]);
                (Direction::Right, right)
            } else {
                (Direction::Left, level[position - 1])
            };
            siblings.push(sibling);

            level = next_level(&level);
            position /= 2;
        }

        Some(MerkleProof {
            leaf,
            siblings,
            root,
        })
    }
}
