//! Fundamental types for the vote-escrow protocol.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! timestamps and week alignment, addresses, fixed-point helpers, the decaying
//! `(bias, slope)` line, protocol parameters, two-phase admin roles, the error
//! taxonomy, and the boundary traits for external fungible tokens.

pub mod address;
pub mod amount;
pub mod error;
pub mod params;
pub mod point;
pub mod roles;
pub mod time;
pub mod token;

pub use address::Address;
pub use amount::{mul_div, mul_div_u256, u256_to_u128, BPS_DENOMINATOR, UNIT};
pub use error::{Classify, ErrorKind, TokenError};
pub use params::ProtocolParams;
pub use point::Point;
pub use primitive_types::U256;
pub use roles::{AdminRoles, Role, RoleError};
pub use time::{Clock, SystemClock, Timestamp, DAY, WEEK, YEAR};
pub use token::{FungibleToken, MintableToken};
