//! Error taxonomy shared across crates.
//!
//! Every crate keeps its own `thiserror` enum; each one maps its variants to
//! an [`ErrorKind`] so callers and tests can assert on the cause class.

use thiserror::Error;

/// The four classes of failure a call can be rejected with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input: zero amounts, out-of-range times, over-allocated votes.
    Validation,
    /// Caller lacks the role or delegation the operation requires.
    Authorization,
    /// The operation is not allowed in the current state.
    State,
    /// Overflow or an invariant breach. Indicates a bug, not user error.
    Arithmetic,
}

/// Maps a concrete error to its [`ErrorKind`].
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Errors raised by a fungible-token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("insufficient token balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("arithmetic overflow in token ledger")]
    Overflow,
}

impl Classify for TokenError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientBalance { .. } => ErrorKind::Validation,
            Self::Overflow => ErrorKind::Arithmetic,
        }
    }
}
