//! Gauge registry: directs emission weight across reward destinations.
//!
//! Administrators register weighted gauge types and gauges within them.
//! Escrow holders allocate basis points of their decaying voting power to
//! gauges. Each gauge's weight, and each type's sum of gauge weights, is a
//! decaying `(bias, slope)` line stored at week boundaries with scheduled
//! slope removals, the same construction as the escrow supply history.
//!
//! Weight changes always take effect at the next week boundary.

pub mod controller;
pub mod error;
pub mod line;

pub use controller::{GaugeController, GaugeTypeId, VotedSlope};
pub use error::GaugeError;
pub use line::{WeightLine, WeightPoint};
