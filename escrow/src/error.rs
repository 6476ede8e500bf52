//! Escrow-specific errors.

use thiserror::Error;
use vegov_types::{Address, Classify, ErrorKind, RoleError, Timestamp, TokenError};

#[derive(Debug, Error)]
pub enum EscrowError {
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("unlock time {unlock} is not in the future (now {now})")]
    UnlockTimeNotInFuture { unlock: Timestamp, now: Timestamp },

    #[error("unlock time {unlock} exceeds the maximum lock horizon {max}")]
    UnlockTimeTooLong { unlock: Timestamp, max: Timestamp },

    #[error("unlock time can only increase: current {current}, requested {requested}")]
    UnlockTimeNotIncreasing {
        current: Timestamp,
        requested: Timestamp,
    },

    #[error("{0} already holds a lock; withdraw it first")]
    LockExists(Address),

    #[error("{0} has no lock")]
    NoLock(Address),

    #[error("lock of {0} has expired; withdraw it first")]
    LockExpired(Address),

    #[error("lock is still active until {unlock}")]
    LockNotExpired { unlock: Timestamp },

    #[error("supply history is behind (caught up to {caught_up_to}); call checkpoint again")]
    CheckpointBehind { caught_up_to: Timestamp },

    #[error("token transfer failed: {0}")]
    Token(#[from] TokenError),

    #[error("{0}")]
    Role(#[from] RoleError),

    #[error("arithmetic overflow in escrow computation")]
    Overflow,
}

impl Classify for EscrowError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount
            | Self::UnlockTimeNotInFuture { .. }
            | Self::UnlockTimeTooLong { .. }
            | Self::UnlockTimeNotIncreasing { .. } => ErrorKind::Validation,
            Self::LockExists(_)
            | Self::NoLock(_)
            | Self::LockExpired(_)
            | Self::LockNotExpired { .. }
            | Self::CheckpointBehind { .. } => ErrorKind::State,
            Self::Token(e) => e.kind(),
            Self::Role(e) => e.kind(),
            Self::Overflow => ErrorKind::Arithmetic,
        }
    }
}
