use thiserror::Error;
use vegov_types::{Address, Classify, ErrorKind, RoleError, TokenError};

#[derive(Debug, Error)]
pub enum FeeError {
    #[error("fee distributor has been killed")]
    Killed,

    #[error("{0} may not checkpoint the fee token")]
    CheckpointNotAllowed(Address),

    #[error("the fee token itself cannot be recovered")]
    CannotRecoverFeeToken,

    #[error("token transfer failed: {0}")]
    Token(#[from] TokenError),

    #[error("{0}")]
    Role(#[from] RoleError),

    #[error("arithmetic overflow in fee computation")]
    Overflow,
}

impl Classify for FeeError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Killed => ErrorKind::State,
            Self::CheckpointNotAllowed(_) => ErrorKind::Authorization,
            Self::CannotRecoverFeeToken => ErrorKind::Validation,
            Self::Token(e) => e.kind(),
            Self::Role(e) => e.kind(),
            Self::Overflow => ErrorKind::Arithmetic,
        }
    }
}
