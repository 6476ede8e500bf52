//! Nullable token: an in-memory fungible ledger.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vegov_types::{Address, FungibleToken, MintableToken, TokenError};

/// An in-memory fungible-token ledger for testing.
///
/// Transfers need no allowance: the engine calling `transfer` stands in for a
/// pre-approved `transferFrom`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullToken {
    balances: BTreeMap<Address, u128>,
    supply: u128,
}

impl NullToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger with initial balances.
    pub fn with_balances(balances: impl IntoIterator<Item = (Address, u128)>) -> Self {
        let mut token = Self::new();
        for (owner, amount) in balances {
            // Test fixture: callers keep amounts far below u128::MAX.
            let _ = token.mint(&owner, amount);
        }
        token
    }
}

impl FungibleToken for NullToken {
    fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.balances.insert(from.clone(), available - amount);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }

    fn total_supply(&self) -> u128 {
        self.supply
    }
}

impl MintableToken for NullToken {
    fn mint(&mut self, to: &Address, amount: u128) -> Result<(), TokenError> {
        let supply = self.supply.checked_add(amount).ok_or(TokenError::Overflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;
        self.supply = supply;
        self.balances.insert(to.clone(), balance);
        Ok(())
    }
}
