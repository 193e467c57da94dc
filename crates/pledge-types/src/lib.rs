//! Shared promise/receipt/outcome wire types for the deferred-call engine.

mod call;
mod ids;
mod outcome;
mod record;

pub use call::{Combinator, PromiseCall, balance_serde};
pub use ids::{AccountId, AccountIdError, Balance, Gas, PromiseId};
pub use outcome::{FailureReason, Outcome, OutcomeDecodeError};
pub use record::{OutcomeRecord, ReceiptRecord, RecordDecodeError};
