use pledge_types::{AccountId, Balance, FailureReason, Gas, Outcome};
use thiserror::Error;

use crate::builder::{BuildError, BuilderSession};
use crate::delivery::{DeliverySlip, DeliveryToken, UnauthorizedCallback};
use crate::guard::StateScope;
use crate::scheduler::Receipt;

/// Failure surfaced by a contract host while executing one receipt. The
/// dispatcher converts every variant into an [`Outcome::Failure`]; nothing
/// here ever raises into the scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostFailure {
    #[error("target account does not exist")]
    TargetUnreachable,
    #[error("method not found on target")]
    MethodNotFound,
    #[error("argument deserialization failed: {0}")]
    ArgumentError(String),
    #[error("target aborted: {0}")]
    Aborted(String),
    #[error("attached value exceeds available balance")]
    InsufficientValue,
    #[error("gas budget exhausted mid-execution")]
    GasExhausted,
    #[error("restricted callback invoked outside the delivery path")]
    Unauthorized,
}

impl From<UnauthorizedCallback> for HostFailure {
    fn from(_: UnauthorizedCallback) -> Self {
        HostFailure::Unauthorized
    }
}

impl From<serde_cbor::Error> for HostFailure {
    fn from(err: serde_cbor::Error) -> Self {
        HostFailure::ArgumentError(err.to_string())
    }
}

impl From<BuildError> for HostFailure {
    fn from(err: BuildError) -> Self {
        HostFailure::Aborted(err.to_string())
    }
}

impl HostFailure {
    /// Attach target/method context and produce the contract-visible reason.
    pub(crate) fn into_reason(self, target: &AccountId, method: &str) -> FailureReason {
        match self {
            HostFailure::TargetUnreachable => FailureReason::TargetUnreachable {
                target: target.to_string(),
            },
            HostFailure::MethodNotFound => FailureReason::MethodNotFound {
                method: method.to_string(),
            },
            HostFailure::ArgumentError(message) => FailureReason::ArgumentError { message },
            HostFailure::Aborted(message) => FailureReason::TargetAborted { message },
            HostFailure::InsufficientValue => FailureReason::InsufficientValue,
            HostFailure::GasExhausted => FailureReason::GasExhausted,
            HostFailure::Unauthorized => FailureReason::UnauthorizedCallback,
        }
    }
}

/// One invocation as seen by the target contract: identities, payload,
/// budget, and — only on the delivery path — the dependency outcome slip.
pub struct CallFrame<'a> {
    caller: &'a AccountId,
    target: &'a AccountId,
    method: &'a str,
    args: &'a [u8],
    attached_value: Balance,
    gas: Gas,
    outcomes: &'a [Outcome],
    delivery: Option<DeliverySlip<'a>>,
}

impl<'a> CallFrame<'a> {
    pub(crate) fn new(
        caller: &'a AccountId,
        target: &'a AccountId,
        method: &'a str,
        args: &'a [u8],
        attached_value: Balance,
        gas: Gas,
        outcomes: &'a [Outcome],
        delivery: Option<DeliverySlip<'a>>,
    ) -> Self {
        Self {
            caller,
            target,
            method,
            args,
            attached_value,
            gas,
            outcomes,
            delivery,
        }
    }

    pub fn caller(&self) -> &AccountId {
        self.caller
    }

    pub fn target(&self) -> &AccountId {
        self.target
    }

    pub fn method(&self) -> &str {
        self.method
    }

    pub fn raw_args(&self) -> &[u8] {
        self.args
    }

    /// Decode the argument payload as canonical CBOR.
    pub fn args<T: serde::de::DeserializeOwned>(&self) -> Result<T, HostFailure> {
        serde_cbor::from_slice(self.args).map_err(HostFailure::from)
    }

    pub fn attached_value(&self) -> Balance {
        self.attached_value
    }

    /// Gas allocated to this invocation.
    pub fn gas(&self) -> Gas {
        self.gas
    }

    /// Outcomes of this promise's dependencies, one slot per dependency in
    /// declaration order. Empty for root calls.
    pub fn dependency_outcomes(&self) -> &'a [Outcome] {
        self.outcomes
    }

    /// Gate for restricted callback methods. Succeeds only when the frame
    /// was minted by the delivery path; a direct external invocation has no
    /// slip and fails before any business logic runs.
    pub fn require_delivery(&self) -> Result<&'a [Outcome], UnauthorizedCallback> {
        match self.delivery {
            Some(slip) => Ok(slip.outcomes()),
            None => Err(UnauthorizedCallback),
        }
    }
}

/// Facilities a contract may use while executing: its promise builder
/// session, its single-writer state scope, and the gas meter.
pub struct PromiseEnv<'a> {
    session: BuilderSession,
    state: StateScope<'a>,
    gas_budget: Gas,
    gas_used: Gas,
}

impl<'a> PromiseEnv<'a> {
    pub(crate) fn new(session: BuilderSession, state: StateScope<'a>, gas_budget: Gas) -> Self {
        Self {
            session,
            state,
            gas_budget,
            gas_used: 0,
        }
    }

    /// Builder session for deferring follow-up work.
    pub fn promises(&mut self) -> &mut BuilderSession {
        &mut self.session
    }

    /// This invocation's staged state scope.
    pub fn state(&mut self) -> &mut StateScope<'a> {
        &mut self.state
    }

    pub fn gas_used(&self) -> Gas {
        self.gas_used
    }

    pub fn gas_remaining(&self) -> Gas {
        self.gas_budget - self.gas_used
    }

    /// Meter execution work. Overruns surface as `GasExhausted`, the
    /// universal deadline — there is no other timeout.
    pub fn burn_gas(&mut self, amount: Gas) -> Result<(), HostFailure> {
        if amount > self.gas_remaining() {
            self.gas_used = self.gas_budget;
            return Err(HostFailure::GasExhausted);
        }
        self.gas_used += amount;
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (BuilderSession, StateScope<'a>, Gas) {
        (self.session, self.state, self.gas_used)
    }
}

/// Boundary to the VM collaborator executing contract code. Implementations
/// route `frame.method()` on `frame.target()` to contract logic and report
/// failures through [`HostFailure`] rather than panicking.
pub trait ContractHost {
    fn invoke(
        &mut self,
        frame: &CallFrame<'_>,
        env: &mut PromiseEnv<'_>,
    ) -> Result<Vec<u8>, HostFailure>;
}

/// Executes receipts against the host and converts results into recorded
/// outcomes. Sole owner of the delivery token.
pub struct Dispatcher {
    token: DeliveryToken,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            token: DeliveryToken::mint(),
        }
    }

    /// Dispatch one receipt. Host failures become `Outcome::Failure` — the
    /// scheduler never sees them as errors, and the originating contract
    /// gets its chance to react through a callback.
    pub fn dispatch<H: ContractHost>(
        &self,
        host: &mut H,
        receipt: &Receipt,
        caller: &AccountId,
        outcomes: &[Outcome],
        env: &mut PromiseEnv<'_>,
    ) -> Outcome {
        let delivery = receipt
            .restricted
            .then(|| DeliverySlip::new(&self.token, outcomes));
        let frame = CallFrame::new(
            caller,
            &receipt.call.target,
            &receipt.call.method,
            &receipt.call.args,
            receipt.call.attached_value,
            receipt.gas,
            outcomes,
            delivery,
        );
        match host.invoke(&frame, env) {
            Ok(payload) => Outcome::success(payload),
            Err(failure) => {
                log::debug!(
                    "receipt {} ({}::{}) failed: {failure}",
                    receipt.promise_id,
                    receipt.call.target,
                    receipt.call.method
                );
                Outcome::failure(failure.into_reason(&receipt.call.target, &receipt.call.method))
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
