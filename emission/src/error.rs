//! Emission-specific errors.

use thiserror::Error;
use vegov_types::{Classify, ErrorKind, Timestamp};

#[derive(Debug, Error)]
pub enum EmissionError {
    #[error("emission has not launched yet; first epoch starts at {starts_at}")]
    LaunchDelay { starts_at: Timestamp },

    #[error("current rate epoch ends at {next_epoch}")]
    EpochNotElapsed { next_epoch: Timestamp },

    #[error("mint of {requested} exceeds available supply {available}")]
    MintExceedsAvailable { requested: u128, available: u128 },

    #[error("rate change timestamp must not precede current segment start")]
    InvalidTimestamp,

    #[error("arithmetic overflow in emission computation")]
    Overflow,
}

impl Classify for EmissionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::LaunchDelay { .. }
            | Self::EpochNotElapsed { .. }
            | Self::MintExceedsAvailable { .. } => ErrorKind::State,
            Self::InvalidTimestamp => ErrorKind::Validation,
            Self::Overflow => ErrorKind::Arithmetic,
        }
    }
}
