use pledge_types::PromiseId;
use thiserror::Error;

/// Engine-internal faults. Unlike [`pledge_types::FailureReason`], these are
/// never contract-visible: they abort the transaction instead of flowing
/// into callback outcome slots.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("journal error: {0}")]
    Journal(String),
    #[error("promise {0} is not in a dispatchable state")]
    InvalidState(PromiseId),
    #[error("no outcome recorded for promise {0}")]
    MissingOutcome(PromiseId),
    #[error("callback {0} was already delivered")]
    DuplicateDelivery(PromiseId),
    #[error("gas accounting error: {0}")]
    Ledger(String),
    #[error("record encoding error: {0}")]
    RecordEncoding(String),
}

impl From<crate::journal::JournalError> for KernelError {
    fn from(err: crate::journal::JournalError) -> Self {
        KernelError::Journal(err.to_string())
    }
}

impl From<serde_cbor::Error> for KernelError {
    fn from(err: serde_cbor::Error) -> Self {
        KernelError::RecordEncoding(err.to_string())
    }
}
