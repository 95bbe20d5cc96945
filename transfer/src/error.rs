//! Transfer error types

use thiserror::Error;

use crate::types::StepId;

/// Errors raised while constructing, decoding or executing a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A step ran before the metadata it depends on was populated.
    /// Ordering bug on the caller side; never retried.
    #[error("precondition failed: {0}")]
    Precondition(&'static str),

    /// A step's executor failed; carries the failing step identifier.
    #[error("step {step} failed: {source}")]
    StepExecution {
        step: StepId,
        #[source]
        source: Box<TransferError>,
    },

    /// Construction or decoding produced a transfer that violates an invariant.
    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error("amount plus fees overflows uint256")]
    Overflow,

    /// Chain or contract call failed (connection errors included).
    #[error(transparent)]
    Gateway(#[from] anyhow::Error),
}

impl TransferError {
    /// Identifier of the failing step, if this error came out of `execute`.
    pub fn step(&self) -> Option<StepId> {
        match self {
            TransferError::StepExecution { step, .. } => Some(*step),
            _ => None,
        }
    }
}
