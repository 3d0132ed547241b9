//! Owner and role gating shared by the ledgers
//!
//! Each ledger holds its own `AccessControl` value. The owner is fixed at
//! construction; only the owner may flip role flags.

use crate::types::{Address, Role, RoleFlags};
use crate::{Error, Result};
use std::collections::HashMap;

/// Fail with `Unauthorized` unless `caller` is `owner`.
///
/// Used directly by ledgers that have an owner but no role table.
pub fn ensure_owner(owner: &Address, caller: &Address) -> Result<()> {
    if caller == owner {
        Ok(())
    } else {
        Err(Error::Unauthorized {
            caller: *caller,
            required: Role::Owner,
        })
    }
}

/// Single owner plus per-account role flags
#[derive(Debug, Clone)]
pub struct AccessControl {
    owner: Address,
    roles: HashMap<Address, RoleFlags>,
}

impl AccessControl {
    /// Create with the given owner and no roles granted
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            roles: HashMap::new(),
        }
    }

    /// Restore from persisted role flags
    pub fn with_roles(owner: Address, roles: impl IntoIterator<Item = (Address, RoleFlags)>) -> Self {
        Self {
            owner,
            roles: roles.into_iter().filter(|(_, f)| !f.is_empty()).collect(),
        }
    }

    /// Owner address
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// True when `caller` is the owner
    pub fn is_owner(&self, caller: &Address) -> bool {
        *caller == self.owner
    }

    /// Fail with `Unauthorized` unless `caller` is the owner
    pub fn require_owner(&self, caller: &Address) -> Result<()> {
        ensure_owner(&self.owner, caller)
    }

    /// Role flags for `account` (all false if never granted)
    pub fn roles(&self, account: &Address) -> RoleFlags {
        self.roles.get(account).copied().unwrap_or_default()
    }

    /// Whether `account` currently holds `role`
    pub fn has_role(&self, account: &Address, role: Role) -> bool {
        match role {
            Role::Owner => self.is_owner(account),
            Role::Adder => self.roles(account).adder,
            Role::Subtractor => self.roles(account).subtractor,
        }
    }

    /// Fail with `Unauthorized` unless `caller` holds `role`
    pub fn require_role(&self, caller: &Address, role: Role) -> Result<()> {
        if self.has_role(caller, role) {
            Ok(())
        } else {
            Err(Error::Unauthorized {
                caller: *caller,
                required: role,
            })
        }
    }

    /// Flip `role` for `account`. Owner-only; the owner role itself cannot be toggled.
    ///
    /// Returns the flags after the flip.
    pub fn toggle(&mut self, caller: &Address, account: Address, role: Role) -> Result<RoleFlags> {
        self.require_owner(caller)?;

        let mut flags = self.roles(&account);
        match role {
            Role::Adder => flags.adder = !flags.adder,
            Role::Subtractor => flags.subtractor = !flags.subtractor,
            Role::Owner => {
                return Err(Error::Config("owner is fixed at construction".to_string()));
            }
        }

        if flags.is_empty() {
            self.roles.remove(&account);
        } else {
            self.roles.insert(account, flags);
        }

        tracing::debug!(%account, ?role, adder = flags.adder, subtractor = flags.subtractor, "Role toggled");
        Ok(flags)
    }

    /// Restore flags for a single account (used to undo a toggle)
    pub(crate) fn set_roles(&mut self, account: Address, flags: RoleFlags) {
        if flags.is_empty() {
            self.roles.remove(&account);
        } else {
            self.roles.insert(account, flags);
        }
    }

    /// Accounts holding at least one role
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &RoleFlags)> {
        self.roles.iter()
    }
}
