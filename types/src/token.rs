//! Boundary traits for external fungible tokens.
//!
//! The governance/reward token, the fee token and gauge LP tokens are external
//! collaborators. Engines only ever move value through these traits, and only
//! after their own state is final.

use crate::address::Address;
use crate::error::TokenError;

/// Standard fungible-token ledger semantics.
pub trait FungibleToken {
    fn balance_of(&self, owner: &Address) -> u128;

    /// Move `amount` from `from` to `to`. Called by an engine either to pull
    /// funds a caller has authorised (transfer-from) or to pay out of its own
    /// account.
    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError>;

    fn total_supply(&self) -> u128;
}

/// A token whose supply the Emission Minter may increase.
pub trait MintableToken: FungibleToken {
    fn mint(&mut self, to: &Address, amount: u128) -> Result<(), TokenError>;
}
