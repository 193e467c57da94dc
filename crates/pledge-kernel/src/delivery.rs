use std::collections::BTreeSet;

use pledge_types::{Outcome, PromiseId};
use thiserror::Error;

use crate::error::KernelError;

/// Unforgeable proof that a call frame was produced by the dispatcher's
/// delivery path. Only the dispatcher can mint one: the constructor is
/// crate-private, the type is neither `Clone` nor constructible from its
/// (absent) public fields, so a restricted entry point guarded with
/// [`crate::dispatcher::CallFrame::require_delivery`] is unreachable from
/// any external invocation by construction.
#[derive(Debug)]
pub struct DeliveryToken {
    _priv: (),
}

impl DeliveryToken {
    pub(crate) fn mint() -> Self {
        Self { _priv: () }
    }
}

/// The token paired with the ordered dependency outcomes it vouches for.
/// Holding the token reference is what makes the slip constructible only
/// inside the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct DeliverySlip<'a> {
    _token: &'a DeliveryToken,
    outcomes: &'a [Outcome],
}

impl<'a> DeliverySlip<'a> {
    pub(crate) fn new(token: &'a DeliveryToken, outcomes: &'a [Outcome]) -> Self {
        Self {
            _token: token,
            outcomes,
        }
    }

    /// One slot per declared dependency, in declaration order.
    pub fn outcomes(&self) -> &'a [Outcome] {
        self.outcomes
    }
}

/// Error returned by the contract-side guard when a restricted method runs
/// without a delivery slip.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("restricted callback invoked outside the delivery path")]
pub struct UnauthorizedCallback;

/// Tracks which callback invocations already received their outcome list.
/// The scheduler's state machine makes double delivery unreachable in the
/// normal flow; this log turns any regression into a hard engine fault
/// instead of a silent second delivery.
#[derive(Debug, Default)]
pub struct DeliveryLog {
    delivered: BTreeSet<PromiseId>,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the single delivery slot for a callback invocation.
    pub fn begin(&mut self, callback: PromiseId) -> Result<(), KernelError> {
        if !self.delivered.insert(callback) {
            return Err(KernelError::DuplicateDelivery(callback));
        }
        Ok(())
    }

    pub fn was_delivered(&self, callback: PromiseId) -> bool {
        self.delivered.contains(&callback)
    }
}
