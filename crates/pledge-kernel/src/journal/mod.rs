pub mod fs;
pub mod mem;

use pledge_cbor::to_canonical_cbor;
use pledge_types::{Balance, Gas, OutcomeRecord, ReceiptRecord, balance_serde};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monotonic cursor assigned to every persisted journal entry.
pub type JournalSeq = u64;

/// High-level classification of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    InvocationStarted,
    Receipt,
    Outcome,
    TransactionEnded,
}

/// Type-safe payloads for each `JournalKind`, serialized into the entry
/// payload so the consensus collaborator can replay a transaction without
/// bespoke wiring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "record_kind", rename_all = "snake_case")]
pub enum JournalRecord {
    InvocationStarted(InvocationRecord),
    Receipt(ReceiptRecord),
    Outcome(OutcomeRecord),
    TransactionEnded(TransactionEndedRecord),
}

impl JournalRecord {
    pub fn kind(&self) -> JournalKind {
        match self {
            JournalRecord::InvocationStarted(_) => JournalKind::InvocationStarted,
            JournalRecord::Receipt(_) => JournalKind::Receipt,
            JournalRecord::Outcome(_) => JournalKind::Outcome,
            JournalRecord::TransactionEnded(_) => JournalKind::TransactionEnded,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, JournalError> {
        Ok(to_canonical_cbor(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, JournalError> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

/// Brackets the start of a transaction: the external invocation that may go
/// on to build the promise graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationRecord {
    pub caller: String,
    pub target: String,
    pub method: String,
    #[serde(with = "balance_serde")]
    pub attached_value: Balance,
    pub attached_gas: Gas,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Ok,
    Error,
}

/// Closes a transaction's record run with its final gas accounting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionEndedRecord {
    pub status: TransactionStatus,
    pub gas_spent: Gas,
    pub gas_used: Gas,
}

/// Borrowed entry used when appending to the journal.
#[derive(Debug, Clone, Copy)]
pub struct JournalEntry<'a> {
    pub kind: JournalKind,
    pub payload: &'a [u8],
}

impl<'a> JournalEntry<'a> {
    pub fn new(kind: JournalKind, payload: &'a [u8]) -> Self {
        Self { kind, payload }
    }
}

/// Owned entry returned by journal readers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnedJournalEntry {
    pub seq: JournalSeq,
    pub kind: JournalKind,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl OwnedJournalEntry {
    pub fn record(&self) -> Result<JournalRecord, JournalError> {
        JournalRecord::decode(&self.payload)
    }
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("corrupt entry: {0}")]
    Corrupt(String),
}

/// Uniform interface implemented by concrete journal backends (filesystem,
/// in-memory) so the transaction runtime can target a single abstraction.
pub trait Journal: Send {
    fn append(&mut self, entry: JournalEntry<'_>) -> Result<JournalSeq, JournalError>;

    /// Loads entries starting at `from` (inclusive). Passing 0 returns the
    /// full log.
    fn load_from(&self, from: JournalSeq) -> Result<Vec<OwnedJournalEntry>, JournalError>;

    /// Returns the next sequence that will be assigned on append.
    fn next_seq(&self) -> JournalSeq;
}

/// Encode a typed record and append it in one step.
pub fn append_record<J: Journal + ?Sized>(
    journal: &mut J,
    record: &JournalRecord,
) -> Result<JournalSeq, JournalError> {
    let payload = record.encode()?;
    journal.append(JournalEntry::new(record.kind(), &payload))
}

/// On-disk framing shared by persistent backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskRecord<'a> {
    seq: JournalSeq,
    kind: JournalKind,
    #[serde(with = "serde_bytes")]
    payload: &'a [u8],
}

#[cfg(test)]
mod tests {
    use super::*;
    use pledge_types::{Outcome, PromiseId};

    #[test]
    fn typed_records_round_trip() {
        let records = [
            JournalRecord::InvocationStarted(InvocationRecord {
                caller: "wallet".into(),
                target: "exchange".into(),
                method: "swap".into(),
                attached_value: 5,
                attached_gas: 100,
            }),
            JournalRecord::Outcome(OutcomeRecord {
                receipt_id: PromiseId::new(2),
                outcome: Outcome::success(b"ok".to_vec()),
            }),
            JournalRecord::TransactionEnded(TransactionEndedRecord {
                status: TransactionStatus::Ok,
                gas_spent: 90,
                gas_used: 72,
            }),
        ];
        for record in records {
            let decoded = JournalRecord::decode(&record.encode().unwrap()).unwrap();
            assert_eq!(decoded, record);
            assert_eq!(decoded.kind(), record.kind());
        }
    }
}
