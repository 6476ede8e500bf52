//! Protocol node: owns the escrow ledger, gauge registry, emission schedule,
//! minter and fee distributor together with the token ledgers they move, and
//! applies every call atomically.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod protocol;

pub use config::{DeploymentConfig, NodeConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::ProtocolMetrics;
pub use protocol::{Component, Protocol, ProtocolState};
