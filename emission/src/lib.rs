//! Emission schedule for the reward token.
//!
//! The rate is zero until the launch delay has elapsed, then starts at the
//! initial rate and is divided by a fixed coefficient once per rate epoch.
//! Cumulative issuance is clipped to the supply cap.
//!
//! Every rate ever in force is kept as a segment in a [`RateHistory`], so the
//! amount issued over any interval is integrated exactly across epoch
//! boundaries.

pub mod error;
pub mod history;
pub mod schedule;

pub use error::EmissionError;
pub use history::{RateHistory, RateSegment};
pub use schedule::EmissionSchedule;
