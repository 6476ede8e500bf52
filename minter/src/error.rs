//! Minter and liquidity-gauge errors.

use thiserror::Error;
use vegov_emission::EmissionError;
use vegov_gauges::GaugeError;
use vegov_types::{Address, Classify, ErrorKind, Timestamp, TokenError};

#[derive(Debug, Error)]
pub enum MinterError {
    #[error("gauge {0} is not registered with the controller")]
    GaugeNotRegistered(Address),

    #[error("{for_user} has not approved {caller} to mint on their behalf")]
    NotApproved { caller: Address, for_user: Address },

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("insufficient stake: need {needed}, available {available}")]
    InsufficientStake { needed: u128, available: u128 },

    #[error("reward integral is behind (caught up to {caught_up_to}); call checkpoint again")]
    CheckpointBehind { caught_up_to: Timestamp },

    #[error("emission: {0}")]
    Emission(#[from] EmissionError),

    #[error("gauge controller: {0}")]
    Gauge(#[from] GaugeError),

    #[error("token transfer failed: {0}")]
    Token(#[from] TokenError),

    #[error("arithmetic overflow in reward computation")]
    Overflow,
}

impl Classify for MinterError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount | Self::InsufficientStake { .. } => ErrorKind::Validation,
            Self::NotApproved { .. } => ErrorKind::Authorization,
            Self::GaugeNotRegistered(_) | Self::CheckpointBehind { .. } => ErrorKind::State,
            Self::Emission(e) => e.kind(),
            Self::Gauge(e) => e.kind(),
            Self::Token(e) => e.kind(),
            Self::Overflow => ErrorKind::Arithmetic,
        }
    }
}
