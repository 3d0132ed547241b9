//! Permissioned balance ledger
//!
//! Balances are `u128` and can never go negative. Increases require the caller
//! to hold the Adder role, decreases the Subtractor role; the caller and the
//! account touched may differ.

use crate::access::AccessControl;
use crate::types::{Address, Amount, Role, RoleFlags};
use crate::{Error, Result};
use std::collections::HashMap;

/// Account balances with role-gated mutation
#[derive(Debug, Clone)]
pub struct BalanceLedger {
    access: AccessControl,
    balances: HashMap<Address, Amount>,
}

impl BalanceLedger {
    /// Empty ledger owned by `owner`
    pub fn new(owner: Address) -> Self {
        Self {
            access: AccessControl::new(owner),
            balances: HashMap::new(),
        }
    }

    /// Rebuild from persisted state
    pub fn restore(
        access: AccessControl,
        balances: impl IntoIterator<Item = (Address, Amount)>,
    ) -> Self {
        Self {
            access,
            balances: balances.into_iter().collect(),
        }
    }

    /// Owner address
    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    /// Flip the Adder role for `account`
    pub fn toggle_adder(&mut self, caller: &Address, account: Address) -> Result<RoleFlags> {
        self.access.toggle(caller, account, Role::Adder)
    }

    /// Flip the Subtractor role for `account`
    pub fn toggle_subtractor(&mut self, caller: &Address, account: Address) -> Result<RoleFlags> {
        self.access.toggle(caller, account, Role::Subtractor)
    }

    /// Whether `account` may increase balances
    pub fn is_adder(&self, account: &Address) -> bool {
        self.access.has_role(account, Role::Adder)
    }

    /// Whether `account` may decrease balances
    pub fn is_subtractor(&self, account: &Address) -> bool {
        self.access.has_role(account, Role::Subtractor)
    }

    /// Role flags for `account`
    pub fn roles(&self, account: &Address) -> RoleFlags {
        self.access.roles(account)
    }

    /// Credit `account` by `amount`. Returns the new balance.
    pub fn add_value(&mut self, caller: &Address, account: Address, amount: Amount) -> Result<Amount> {
        self.access.require_role(caller, Role::Adder)?;

        let current = self.user_balance(&account);
        let updated = current
            .checked_add(amount)
            .ok_or(Error::Overflow("add_value"))?;
        self.balances.insert(account, updated);

        tracing::debug!(%caller, %account, amount, balance = updated, "Balance credited");
        Ok(updated)
    }

    /// Debit `account` by `amount`. Returns the new balance.
    pub fn subtract_value(
        &mut self,
        caller: &Address,
        account: Address,
        amount: Amount,
    ) -> Result<Amount> {
        self.access.require_role(caller, Role::Subtractor)?;

        let current = self.user_balance(&account);
        let updated = current
            .checked_sub(amount)
            .ok_or(Error::InsufficientBalance {
                account,
                balance: current,
                requested: amount,
            })?;
        self.balances.insert(account, updated);

        tracing::debug!(%caller, %account, amount, balance = updated, "Balance debited");
        Ok(updated)
    }

    /// Current balance (0 if never touched)
    pub fn user_balance(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// All accounts that have ever been credited
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    /// Access-control state, for persistence
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Put back a previous balance after a failed commit
    pub(crate) fn revert_balance(&mut self, account: Address, previous: Amount) {
        self.balances.insert(account, previous);
    }

    /// Put back previous role flags after a failed commit
    pub(crate) fn revert_roles(&mut self, account: Address, previous: RoleFlags) {
        self.access.set_roles(account, previous);
    }
}
