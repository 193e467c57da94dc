use indexmap::IndexMap;
use pledge_types::{AccountId, Balance, FailureReason, Gas, Outcome, OutcomeRecord, PromiseId};

use crate::builder::BuilderSession;
use crate::config::RuntimeConfig;
use crate::delivery::DeliveryLog;
use crate::dispatcher::{CallFrame, ContractHost, Dispatcher, PromiseEnv};
use crate::error::KernelError;
use crate::guard::StateLedger;
use crate::journal::{
    InvocationRecord, Journal, JournalRecord, TransactionEndedRecord, TransactionStatus,
    append_record,
};
use crate::ledger::GasLedger;
use crate::scheduler::{Receipt, Scheduler};

/// The invocation boundary handed in by the VM/runtime collaborator.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub caller: AccountId,
    pub target: AccountId,
    pub method: String,
    pub args: Vec<u8>,
    pub attached_value: Balance,
    pub attached_gas: Gas,
}

/// Final gas accounting for one transaction's promise tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasReport {
    pub attached: Gas,
    /// Debited from the budget: settled reservations plus entry execution.
    pub spent: Gas,
    /// Actually consumed by execution; `spent - used` was forfeited.
    pub used: Gas,
}

/// Everything a transaction resolved to once no receipt can make progress.
#[derive(Debug)]
pub struct TransactionReport {
    /// Outcome of the marked return promise, or of the entry invocation
    /// itself when no promise was marked.
    pub return_outcome: Outcome,
    /// Every recorded outcome, index-addressable by promise and ordered by
    /// arena id.
    pub outcomes: IndexMap<PromiseId, Outcome>,
    pub gas: GasReport,
}

/// Drives one transaction end to end: entry invocation, graph takeover,
/// wave-ordered dispatch, callback delivery, and journaling. Execution is
/// fully deterministic — same invocation, same seeded state, same records
/// on every replica.
pub struct TransactionRuntime<H: ContractHost, J: Journal> {
    host: H,
    journal: J,
    states: StateLedger,
    config: RuntimeConfig,
    dispatcher: Dispatcher,
}

impl<H: ContractHost, J: Journal> TransactionRuntime<H, J> {
    pub fn new(host: H, journal: J, states: StateLedger, config: RuntimeConfig) -> Self {
        Self {
            host,
            journal,
            states,
            config,
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn states(&self) -> &StateLedger {
        &self.states
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    pub fn run(&mut self, invocation: Invocation) -> Result<TransactionReport, KernelError> {
        append_record(
            &mut self.journal,
            &JournalRecord::InvocationStarted(InvocationRecord {
                caller: invocation.caller.to_string(),
                target: invocation.target.to_string(),
                method: invocation.method.clone(),
                attached_value: invocation.attached_value,
                attached_gas: invocation.attached_gas,
            }),
        )?;

        let mut ledger = GasLedger::new(invocation.attached_gas);
        let mut scheduler = Scheduler::new();
        let mut delivery_log = DeliveryLog::new();
        let mut return_promise = None;

        let entry_outcome =
            self.run_entry(&invocation, &mut ledger, &mut scheduler, &mut return_promise)?;

        loop {
            let wave = scheduler.next_wave(&mut ledger);
            if wave.is_empty() {
                debug_assert!(scheduler.is_idle(), "empty wave with unresolved promises");
                break;
            }
            log::debug!("dispatching wave of {} receipts", wave.len());
            for receipt in wave {
                self.dispatch_receipt(
                    receipt,
                    &mut ledger,
                    &mut scheduler,
                    &mut delivery_log,
                    &mut return_promise,
                )?;
            }
        }

        let return_outcome = match return_promise {
            Some(id) => scheduler
                .outcome(id)
                .cloned()
                .ok_or(KernelError::MissingOutcome(id))?,
            None => entry_outcome,
        };

        let status = if return_outcome.is_success() {
            TransactionStatus::Ok
        } else {
            TransactionStatus::Error
        };
        append_record(
            &mut self.journal,
            &JournalRecord::TransactionEnded(TransactionEndedRecord {
                status,
                gas_spent: ledger.spent(),
                gas_used: ledger.used(),
            }),
        )?;
        if ledger.spent() > ledger.used() {
            log::debug!(
                "transaction forfeited {} gas of unused reservations",
                ledger.spent() - ledger.used()
            );
        }

        Ok(TransactionReport {
            return_outcome,
            outcomes: scheduler
                .outcomes()
                .map(|(id, outcome)| (id, outcome.clone()))
                .collect(),
            gas: GasReport {
                attached: invocation.attached_gas,
                spent: ledger.spent(),
                used: ledger.used(),
            },
        })
    }

    /// Execute the entry invocation: the only call that arrives from an
    /// external actor and therefore never carries a delivery slip.
    fn run_entry(
        &mut self,
        invocation: &Invocation,
        ledger: &mut GasLedger,
        scheduler: &mut Scheduler,
        return_promise: &mut Option<PromiseId>,
    ) -> Result<Outcome, KernelError> {
        let session = BuilderSession::new(
            invocation.target.clone(),
            scheduler.next_id(),
            self.config.clone(),
        );
        let scope = self.states.scope(&invocation.target);
        let mut env = PromiseEnv::new(session, scope, invocation.attached_gas);
        let frame = CallFrame::new(
            &invocation.caller,
            &invocation.target,
            &invocation.method,
            &invocation.args,
            invocation.attached_value,
            invocation.attached_gas,
            &[],
            None,
        );
        let result = self.host.invoke(&frame, &mut env);
        let (session, scope, gas_used) = env.into_parts();
        ledger
            .consume(gas_used)
            .map_err(|err| KernelError::Ledger(err.to_string()))?;

        let outcome = match result {
            Ok(payload) => match session.finish() {
                Ok(graph) => {
                    // Entry mutations commit before anything is dispatched:
                    // visible to every receipt, retractable by none.
                    scope.commit();
                    *return_promise = graph.return_promise;
                    scheduler.absorb(graph, ledger);
                    Outcome::success(payload)
                }
                Err(err) => Outcome::failure(FailureReason::TargetAborted {
                    message: err.to_string(),
                }),
            },
            Err(failure) => {
                Outcome::failure(failure.into_reason(&invocation.target, &invocation.method))
            }
        };
        Ok(outcome)
    }

    fn dispatch_receipt(
        &mut self,
        receipt: Receipt,
        ledger: &mut GasLedger,
        scheduler: &mut Scheduler,
        delivery_log: &mut DeliveryLog,
        return_promise: &mut Option<PromiseId>,
    ) -> Result<(), KernelError> {
        append_record(&mut self.journal, &JournalRecord::Receipt(receipt.to_record()))?;

        let outcomes = scheduler.assemble_outcomes(receipt.promise_id)?;
        if receipt.restricted {
            // Claims the callback's single delivery slot; a second claim is
            // an engine fault, not a contract-visible failure.
            delivery_log.begin(receipt.promise_id)?;
        }
        let caller = scheduler
            .record(receipt.promise_id)
            .ok_or(KernelError::InvalidState(receipt.promise_id))?
            .originator
            .clone();
        scheduler.mark_dispatched(receipt.promise_id)?;

        let session = BuilderSession::new(
            receipt.call.target.clone(),
            scheduler.next_id(),
            self.config.clone(),
        );
        let scope = self.states.scope(&receipt.call.target);
        let mut env = PromiseEnv::new(session, scope, receipt.gas);
        let outcome =
            self.dispatcher
                .dispatch(&mut self.host, &receipt, &caller, &outcomes, &mut env);
        let (session, scope, gas_used) = env.into_parts();
        ledger
            .settle(scheduler.reservation(receipt.promise_id), gas_used)
            .map_err(|err| KernelError::Ledger(err.to_string()))?;

        let outcome = if outcome.is_success() {
            match session.finish() {
                Ok(graph) => {
                    scope.commit();
                    if !graph.is_empty() {
                        // A return marked inside this invocation re-points
                        // the transaction result when this receipt was the
                        // result so far.
                        if *return_promise == Some(receipt.promise_id) {
                            if let Some(next) = graph.return_promise {
                                *return_promise = Some(next);
                            }
                        }
                        scheduler.absorb(graph, ledger);
                    }
                    outcome
                }
                Err(err) => Outcome::failure(FailureReason::TargetAborted {
                    message: err.to_string(),
                }),
            }
        } else {
            // Failed callee: staged writes and built promises are discarded
            // together. Prior commits stand.
            outcome
        };

        scheduler.record_outcome(receipt.promise_id, outcome.clone())?;
        append_record(
            &mut self.journal,
            &JournalRecord::Outcome(OutcomeRecord {
                receipt_id: receipt.promise_id,
                outcome,
            }),
        )?;
        if receipt.restricted {
            scheduler.mark_delivered_feeders(receipt.promise_id)?;
        }
        Ok(())
    }
}
