use crate::amount::Amount;
use crate::types::{QuoteHash, RQState};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not enough liquidity: required {required}, available {available}")]
    InsufficientLiquidity { required: Amount, available: Amount },

    #[error("{field} must be >= 0, got {amount}")]
    InvalidAmount { field: &'static str, amount: Amount },

    #[error("retained quote not found: {0}")]
    RecordNotFound(QuoteHash),

    #[error("quote already retained: {0}")]
    AlreadyRetained(QuoteHash),

    #[error("provider address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: String, actual: String },

    #[error("signing failed")]
    SigningFailure(#[source] anyhow::Error),

    #[error("invalid state transition for {hash}: {from:?} -> {to:?}")]
    InvalidTransition {
        hash: QuoteHash,
        from: RQState,
        to: RQState,
    },

    #[error("persistence failed")]
    PersistenceFailure(#[source] anyhow::Error),
}
