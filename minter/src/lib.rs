//! Emission minter.
//!
//! A [`LiquidityGauge`] accumulates, for its stakers, the running integral of
//! `emission rate x gauge relative weight / staked supply`. The [`Minter`]
//! pays each staker the growth of their share of that integral since their
//! last mint, and never pays the same share twice.

pub mod error;
pub mod gauge;
pub mod minter;

pub use error::MinterError;
pub use gauge::{LiquidityGauge, RewardGauge};
pub use minter::{MintContext, Minter};
