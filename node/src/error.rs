use thiserror::Error;
use vegov_emission::EmissionError;
use vegov_escrow::EscrowError;
use vegov_fees::FeeError;
use vegov_gauges::GaugeError;
use vegov_minter::MinterError;
use vegov_types::{Address, Classify, ErrorKind, TokenError};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("escrow error: {0}")]
    Escrow(#[from] EscrowError),

    #[error("emission error: {0}")]
    Emission(#[from] EmissionError),

    #[error("gauge registry error: {0}")]
    Gauge(#[from] GaugeError),

    #[error("minter error: {0}")]
    Minter(#[from] MinterError),

    #[error("fee distributor error: {0}")]
    Fee(#[from] FeeError),

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("no staking gauge deployed at {0}")]
    UnknownGauge(Address),

    #[error("no ledger for token {0}")]
    UnknownToken(Address),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Classify for NodeError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Escrow(e) => e.kind(),
            Self::Emission(e) => e.kind(),
            Self::Gauge(e) => e.kind(),
            Self::Minter(e) => e.kind(),
            Self::Fee(e) => e.kind(),
            Self::Token(e) => e.kind(),
            Self::UnknownGauge(_) | Self::Io(_) => ErrorKind::State,
            Self::UnknownToken(_) | Self::Config(_) | Self::Snapshot(_) => ErrorKind::Validation,
        }
    }
}

impl From<bincode::Error> for NodeError {
    fn from(e: bincode::Error) -> Self {
        Self::Snapshot(e.to_string())
    }
}
