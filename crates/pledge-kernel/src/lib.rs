//! Deterministic promise engine: build deferred-call graphs, schedule them
//! into budgeted receipts, dispatch wave by wave, deliver callbacks exactly
//! once.

pub mod builder;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod journal;
pub mod ledger;
pub mod scheduler;
pub mod transaction;

pub use builder::{BuildError, BuilderSession, PromiseKind, PromiseRecord, SessionGraph};
pub use config::RuntimeConfig;
pub use delivery::{DeliveryLog, DeliverySlip, DeliveryToken, UnauthorizedCallback};
pub use dispatcher::{CallFrame, ContractHost, Dispatcher, HostFailure, PromiseEnv};
pub use error::KernelError;
pub use guard::{StateLedger, StateScope};
pub use ledger::{GasLedger, LedgerError};
pub use scheduler::{PromiseState, Receipt, Scheduler};
pub use transaction::{GasReport, Invocation, TransactionReport, TransactionRuntime};
