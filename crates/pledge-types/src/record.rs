use pledge_cbor::{Digest32, to_canonical_cbor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::call::balance_serde;
use crate::{Balance, Gas, Outcome, PromiseId};

/// Persisted form of a scheduled receipt, replayable by the ledger/consensus
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub promise_id: PromiseId,
    pub target: String,
    pub method: String,
    #[serde(with = "serde_bytes")]
    pub args: Vec<u8>,
    #[serde(with = "balance_serde")]
    pub attached_value: Balance,
    pub static_gas: Gas,
    pub dependency_ids: Vec<PromiseId>,
    pub order_index: u64,
}

impl ReceiptRecord {
    pub fn encode(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        to_canonical_cbor(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RecordDecodeError> {
        serde_cbor::from_slice(bytes).map_err(RecordDecodeError::Receipt)
    }

    /// Content address of the canonical encoding. Stable across replicas.
    pub fn digest(&self) -> Result<Digest32, serde_cbor::Error> {
        Digest32::of_cbor(self)
    }
}

/// Persisted form of a recorded outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub receipt_id: PromiseId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl OutcomeRecord {
    pub fn encode(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        to_canonical_cbor(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RecordDecodeError> {
        serde_cbor::from_slice(bytes).map_err(RecordDecodeError::Outcome)
    }
}

#[derive(Debug, Error)]
pub enum RecordDecodeError {
    #[error("failed to decode receipt record: {0}")]
    Receipt(#[source] serde_cbor::Error),
    #[error("failed to decode outcome record: {0}")]
    Outcome(#[source] serde_cbor::Error),
}
