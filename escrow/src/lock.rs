//! A single user's lock.

use serde::{Deserialize, Serialize};
use vegov_types::Timestamp;

/// Principal locked by one user and the week-aligned unlock time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedBalance {
    pub amount: u128,
    pub end: Timestamp,
}

impl LockedBalance {
    pub fn new(amount: u128, end: Timestamp) -> Self {
        Self { amount, end }
    }

    /// Holds principal, expired or not.
    pub fn exists(&self) -> bool {
        self.amount > 0
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.end
    }
}
