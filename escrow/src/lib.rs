//! Escrow ledger: locks the governance token for voting power.
//!
//! A lock of `amount` until `end` carries a voting power that decays linearly
//! to zero: `power(t) = slope * (end - t)` with `slope = amount / MAX_LOCK`.
//!
//! This crate handles:
//! - Lock creation, top-ups (own and third-party), extensions, withdrawal
//! - Per-user point history for historical balance queries
//! - The global supply history: weekly points plus scheduled slope changes,
//!   replayed lazily and boundedly to any later time

pub mod error;
pub mod history;
pub mod ledger;
pub mod lock;

pub use error::EscrowError;
pub use history::SupplyHistory;
pub use ledger::VotingEscrow;
pub use lock::LockedBalance;
