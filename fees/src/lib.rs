//! Fee distributor.
//!
//! Fee-token deposits are checkpointed into weekly buckets alongside a
//! snapshot of the escrow's total voting power at each week start. Each
//! holder claims `bucket x own power / total power` for every finished week,
//! once, tracked by a per-user week cursor.

pub mod distributor;
pub mod error;

pub use distributor::FeeDistributor;
pub use error::FeeError;
