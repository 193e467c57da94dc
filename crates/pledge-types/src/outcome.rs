use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Why a dispatched (or never-dispatched) receipt resolved to failure.
///
/// Everything here is contract-visible: it arrives in callback outcome
/// slots, never as an engine-level error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("gas budget exceeded at admission")]
    BudgetExceeded,
    #[error("an ancestor promise failed; call was never dispatched")]
    AncestorFailed,
    #[error("target account '{target}' does not exist")]
    TargetUnreachable { target: String },
    #[error("method '{method}' not found on target")]
    MethodNotFound { method: String },
    #[error("argument deserialization failed: {message}")]
    ArgumentError { message: String },
    #[error("target aborted: {message}")]
    TargetAborted { message: String },
    #[error("attached value exceeds available balance")]
    InsufficientValue,
    #[error("gas exhausted mid-execution")]
    GasExhausted,
    #[error("restricted callback invoked outside the delivery path")]
    UnauthorizedCallback,
}

/// Recorded result of dispatching one receipt. Immutable once recorded;
/// exactly one exists per dispatched receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },
    Failure {
        reason: FailureReason,
    },
}

impl Outcome {
    pub fn success(payload: impl Into<Vec<u8>>) -> Self {
        Outcome::Success {
            payload: payload.into(),
        }
    }

    pub fn failure(reason: FailureReason) -> Self {
        Outcome::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Outcome::Success { payload } => Some(payload),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { reason } => Some(reason),
        }
    }

    /// Decode a success payload as canonical CBOR.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, OutcomeDecodeError> {
        match self {
            Outcome::Success { payload } => {
                serde_cbor::from_slice(payload).map_err(OutcomeDecodeError::Payload)
            }
            Outcome::Failure { reason } => Err(OutcomeDecodeError::Failed(reason.clone())),
        }
    }
}

#[derive(Debug, Error)]
pub enum OutcomeDecodeError {
    #[error("failed to decode outcome payload: {0}")]
    Payload(#[from] serde_cbor::Error),
    #[error("outcome is a failure: {0}")]
    Failed(FailureReason),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
    struct Settled {
        amount: u64,
        confirmed: bool,
    }

    #[test]
    fn payload_round_trip() {
        let payload = serde_cbor::to_vec(&Settled {
            amount: 100,
            confirmed: true,
        })
        .unwrap();
        let outcome = Outcome::success(payload);
        let decoded: Settled = outcome.decode().unwrap();
        assert_eq!(
            decoded,
            Settled {
                amount: 100,
                confirmed: true
            }
        );
    }

    #[test]
    fn decoding_a_failure_reports_the_reason() {
        let outcome = Outcome::failure(FailureReason::AncestorFailed);
        let err = outcome.decode::<Settled>().unwrap_err();
        assert!(matches!(
            err,
            OutcomeDecodeError::Failed(FailureReason::AncestorFailed)
        ));
    }

    #[test]
    fn wire_shape_tags_status() {
        let bytes = serde_cbor::to_vec(&Outcome::failure(FailureReason::GasExhausted)).unwrap();
        let value: serde_cbor::Value = serde_cbor::from_slice(&bytes).unwrap();
        let serde_cbor::Value::Map(map) = value else {
            panic!("expected tagged map");
        };
        assert!(
            map.iter()
                .any(|(k, v)| *k == serde_cbor::Value::Text("status".into())
                    && *v == serde_cbor::Value::Text("failure".into()))
        );
    }
}
