//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the engines (the clock and the fungible-token
//! ledgers) is abstracted behind a trait in `vegov-types`. This crate provides
//! in-memory implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests and simulations.

pub mod clock;
pub mod token;

pub use clock::NullClock;
pub use token::NullToken;
