//! Gauge-registry errors.

use thiserror::Error;
use vegov_types::{Address, Classify, ErrorKind, RoleError, Timestamp};

#[derive(Debug, Error)]
pub enum GaugeError {
    #[error("gauge {0} is not registered")]
    GaugeNotFound(Address),

    #[error("gauge {0} is already registered")]
    GaugeExists(Address),

    #[error("gauge type {0} does not exist")]
    TypeNotFound(u32),

    #[error("vote weight {0} bps exceeds 10000")]
    InvalidVoteWeight(u32),

    #[error("votes would use {used} bps of voting power (max 10000)")]
    VotePowerExceeded { used: u32 },

    #[error("lock ending {lock_end} expires before the next weight week {next_week}")]
    LockExpiresTooSoon { lock_end: Timestamp, next_week: Timestamp },

    #[error("cannot vote for this gauge again before {next_allowed}")]
    VoteTooSoon { next_allowed: Timestamp },

    #[error("weights are behind (caught up to {caught_up_to}); call checkpoint again")]
    CheckpointBehind { caught_up_to: Timestamp },

    #[error("{0}")]
    Role(#[from] RoleError),

    #[error("arithmetic overflow in gauge weight computation")]
    Overflow,
}

impl Classify for GaugeError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidVoteWeight(_) | Self::VotePowerExceeded { .. } => ErrorKind::Validation,
            Self::GaugeNotFound(_)
            | Self::GaugeExists(_)
            | Self::TypeNotFound(_)
            | Self::LockExpiresTooSoon { .. }
            | Self::VoteTooSoon { .. }
            | Self::CheckpointBehind { .. } => ErrorKind::State,
            Self::Role(e) => e.kind(),
            Self::Overflow => ErrorKind::Arithmetic,
        }
    }
}
