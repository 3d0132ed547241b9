//! Dual-attestation swap auditor
//!
//! Either side of a bridge records what it observed for a swap id; the
//! settlement layer then asks whether the parameters it is about to honor
//! agree with the record. Records are insert-or-verify-equal: resubmitting
//! the identical claim is a no-op, a conflicting one is rejected, and nothing
//! is ever overwritten or deleted.

use crate::merkle::{claim_digest, AuditLog, Hash, MerkleProof};
use crate::types::{Address, Amount, SwapClaim, SwapId};
use crate::{Error, Result};
use std::collections::HashMap;

/// Outcome of `add_swap`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// First submission for the id
    New,
    /// Identical claim was already on record
    Unchanged,
}

#[derive(Debug, Clone)]
struct Entry {
    claim: SwapClaim,
    leaf_index: usize,
}

/// Append-only store of swap claims keyed by correlation id
#[derive(Debug, Clone, Default)]
pub struct SwapAuditor {
    swaps: HashMap<SwapId, Entry>,
    log: AuditLog,
}

impl SwapAuditor {
    /// Empty auditor
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted claims, in their original insertion order
    pub fn restore(claims: impl IntoIterator<Item = (SwapId, SwapClaim)>) -> Result<Self> {
        let mut auditor = Self::new();
        for (id, claim) in claims {
            auditor.add_swap(id, claim)?;
        }
        Ok(auditor)
    }

    /// Record `claim` under `id`
    pub fn add_swap(&mut self, id: SwapId, claim: SwapClaim) -> Result<Recorded> {
        if let Some(existing) = self.swaps.get(&id) {
            if existing.claim == claim {
                tracing::debug!(swap_id = %id, "Identical swap claim resubmitted");
                return Ok(Recorded::Unchanged);
            }
            tracing::warn!(swap_id = %id, "Conflicting swap claim rejected");
            return Err(Error::DuplicateSwap(id));
        }

        let leaf = claim_digest(&id, &claim)?;
        let leaf_index = self.log.append(leaf);

        tracing::debug!(
            swap_id = %id,
            sender = %claim.sender,
            receiver = %claim.receiver,
            amount = claim.amount,
            "Swap claim recorded"
        );
        self.swaps.insert(id, Entry { claim, leaf_index });
        Ok(Recorded::New)
    }

    /// Validate a candidate against the record for `id`
    pub fn check_swap(
        &self,
        id: &SwapId,
        sender: &Address,
        source_chain: &str,
        receiver: &Address,
        destination_chain: &str,
        amount: Amount,
    ) -> Result<bool> {
        let entry = self.swaps.get(id).ok_or(Error::UnknownSwap(*id))?;

        match entry
            .claim
            .first_mismatch(sender, source_chain, receiver, destination_chain, amount)
        {
            None => Ok(true),
            Some(field) => {
                tracing::warn!(swap_id = %id, field, "Swap check mismatch");
                Err(Error::SwapMismatch { id: *id, field })
            }
        }
    }

    /// Recorded claim for `id`
    pub fn get_swap(&self, id: &SwapId) -> Option<&SwapClaim> {
        self.swaps.get(id).map(|entry| &entry.claim)
    }

    /// Number of recorded swaps
    pub fn len(&self) -> usize {
        self.swaps.len()
    }

    /// True when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }

    /// Merkle root over every recorded claim
    pub fn audit_root(&mut self) -> Hash {
        self.log.root()
    }

    /// Inclusion proof for the claim recorded under `id`
    pub fn audit_proof(&mut self, id: &SwapId) -> Result<MerkleProof> {
        let index = self
            .swaps
            .get(id)
            .map(|entry| entry.leaf_index)
            .ok_or(Error::UnknownSwap(*id))?;
        // Every entry's leaf index comes from a successful append.
        self.log.proof(index).ok_or(Error::UnknownSwap(*id))
    }

    /// Claims in insertion order
    pub fn claims(&self) -> Vec<(SwapId, &SwapClaim)> {
        let mut entries: Vec<_> = self.swaps.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.leaf_index);
        entries
            .into_iter()
            .map(|(id, entry)| (*id, &entry.claim))
            .collect()
    }

    /// Undo the most recent `add_swap` that returned `Recorded::New`
    pub(crate) fn revert_last(&mut self, id: &SwapId) {
        if self.swaps.remove(id).is_some() {
            self.log.pop();
        }
    }
}
