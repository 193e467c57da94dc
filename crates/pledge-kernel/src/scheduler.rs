use pledge_types::{Combinator, FailureReason, Gas, Outcome, PromiseCall, PromiseId, ReceiptRecord};

use crate::builder::{PromiseKind, PromiseRecord, SessionGraph};
use crate::error::KernelError;
use crate::ledger::GasLedger;

/// Per-promise lifecycle. `Delivered` applies only to nodes whose outcome
/// was handed to a callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Built,
    Admitted,
    Dispatched,
    Resolved,
    Delivered,
}

/// A promise admitted into the gas ledger and ordered for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub promise_id: PromiseId,
    pub call: PromiseCall,
    /// Restricted receipts carry the delivery slip; their target method is
    /// reachable only through it.
    pub restricted: bool,
    pub dependency_ids: Vec<PromiseId>,
    /// Resolved allocation: declared static gas plus the prepaid
    /// unattached share. Already reserved in the ledger.
    pub gas: Gas,
    pub order_index: u64,
}

impl Receipt {
    pub fn to_record(&self) -> ReceiptRecord {
        ReceiptRecord {
            promise_id: self.promise_id,
            target: self.call.target.to_string(),
            method: self.call.method.clone(),
            args: self.call.args.clone(),
            attached_value: self.call.attached_value,
            static_gas: self.call.static_gas,
            dependency_ids: self.dependency_ids.clone(),
            order_index: self.order_index,
        }
    }
}

/// Exclusive owner of the promise arena, the dependency graph, and every
/// recorded outcome. Converts built promises into dispatch-ordered receipts
/// one wave at a time.
#[derive(Default)]
pub struct Scheduler {
    records: Vec<PromiseRecord>,
    states: Vec<PromiseState>,
    outcomes: Vec<Option<Outcome>>,
    /// Prepaid unattached share resolved when the node's graph was absorbed.
    shares: Vec<Gas>,
    /// Ledger reservation per admitted node, consumed at settlement.
    reservations: Vec<Gas>,
    order_counter: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena id the next built promise will receive.
    pub fn next_id(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn record(&self, id: PromiseId) -> Option<&PromiseRecord> {
        self.records.get(id.index())
    }

    pub fn state(&self, id: PromiseId) -> Option<PromiseState> {
        self.states.get(id.index()).copied()
    }

    pub fn outcome(&self, id: PromiseId) -> Option<&Outcome> {
        self.outcomes.get(id.index()).and_then(Option::as_ref)
    }

    /// All recorded outcomes in arena order.
    pub fn outcomes(&self) -> impl Iterator<Item = (PromiseId, &Outcome)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(idx, outcome)| {
                outcome
                    .as_ref()
                    .map(|o| (PromiseId::new(idx as u64), o))
            })
    }

    /// Absorb one invocation's graph. The unattached share is resolved here,
    /// once, from whatever the ledger still holds beyond the graph's declared
    /// static gas: late-built promises split what is left at their own
    /// takeover. Each node's share is capped at its declared static gas —
    /// settlement forfeits unused reservations, so an uncapped share would
    /// hand the whole budget to the first wave and starve every promise a
    /// callback builds later.
    pub fn absorb(&mut self, graph: SessionGraph, ledger: &GasLedger) {
        let call_nodes = graph
            .records
            .iter()
            .filter(|record| record.kind.call().is_some())
            .count() as u64;
        let declared: Gas = graph
            .records
            .iter()
            .filter_map(|record| record.kind.call())
            .map(|call| call.static_gas)
            .sum();
        let base_share = if call_nodes == 0 {
            0
        } else {
            ledger.remaining().saturating_sub(declared) / call_nodes
        };

        for record in graph.records {
            debug_assert_eq!(record.id.value(), self.next_id());
            let share = record
                .kind
                .call()
                .map(|call| base_share.min(call.static_gas))
                .unwrap_or(0);
            self.states.push(PromiseState::Built);
            self.outcomes.push(None);
            self.shares.push(share);
            self.reservations.push(0);
            self.records.push(record);
        }
    }

    /// Compute the next wave: every built node whose dependencies are fully
    /// resolved, scanned in declaration order. Join nodes resolve in place,
    /// failed ancestry propagates without dispatch or debit, and gas
    /// admission happens here — not at creation — so a rejected ancestor
    /// removes its whole unscheduled subtree before any reservation.
    pub fn next_wave(&mut self, ledger: &mut GasLedger) -> Vec<Receipt> {
        let mut wave = Vec::new();
        loop {
            let mut progressed = false;
            for idx in 0..self.records.len() {
                if self.states[idx] != PromiseState::Built {
                    continue;
                }
                if !self.dependencies_resolved(idx) {
                    continue;
                }
                match &self.records[idx].kind {
                    PromiseKind::Join => {
                        // Synchronization only: no dispatch, no gas.
                        self.states[idx] = PromiseState::Resolved;
                        self.outcomes[idx] = Some(Outcome::success(Vec::new()));
                        progressed = true;
                    }
                    PromiseKind::Call(_) if self.has_failed_ancestor(idx) => {
                        self.states[idx] = PromiseState::Resolved;
                        self.outcomes[idx] =
                            Some(Outcome::failure(FailureReason::AncestorFailed));
                        progressed = true;
                    }
                    PromiseKind::Call(call) | PromiseKind::Callback(call) => {
                        let allocation = call.static_gas + self.shares[idx];
                        match ledger.admit(allocation) {
                            Ok(()) => {
                                let record = &self.records[idx];
                                wave.push(Receipt {
                                    promise_id: record.id,
                                    call: call.clone(),
                                    restricted: record.kind.is_restricted(),
                                    dependency_ids: record.dependencies.clone(),
                                    gas: allocation,
                                    order_index: self.order_counter,
                                });
                                self.order_counter += 1;
                                self.reservations[idx] = allocation;
                                self.states[idx] = PromiseState::Admitted;
                                progressed = true;
                            }
                            Err(err) => {
                                log::warn!(
                                    "promise {} rejected at admission: {err}",
                                    self.records[idx].id
                                );
                                self.states[idx] = PromiseState::Resolved;
                                self.outcomes[idx] =
                                    Some(Outcome::failure(FailureReason::BudgetExceeded));
                                progressed = true;
                            }
                        }
                    }
                }
            }
            if !progressed {
                break;
            }
            // In-place resolutions (joins, propagated failures) can unlock
            // further nodes within the same wave; rescan until quiescent.
        }
        wave
    }

    /// Assemble the ordered outcome list for a node's dependency set,
    /// flattening join nodes into their parents' outcomes in declaration
    /// order. Callers must only invoke this once the dependencies resolved.
    pub fn assemble_outcomes(&self, id: PromiseId) -> Result<Vec<Outcome>, KernelError> {
        let record = self
            .records
            .get(id.index())
            .ok_or(KernelError::InvalidState(id))?;
        let mut slots = Vec::with_capacity(record.dependencies.len());
        self.collect_outcomes(&record.dependencies, &mut slots)?;
        Ok(slots)
    }

    fn collect_outcomes(
        &self,
        dependencies: &[PromiseId],
        slots: &mut Vec<Outcome>,
    ) -> Result<(), KernelError> {
        for dep in dependencies {
            let record = self
                .records
                .get(dep.index())
                .ok_or(KernelError::InvalidState(*dep))?;
            if record.combinator == Combinator::Joined {
                self.collect_outcomes(&record.dependencies, slots)?;
            } else {
                let outcome = self
                    .outcomes
                    .get(dep.index())
                    .and_then(Option::as_ref)
                    .ok_or(KernelError::MissingOutcome(*dep))?;
                slots.push(outcome.clone());
            }
        }
        Ok(())
    }

    pub fn mark_dispatched(&mut self, id: PromiseId) -> Result<(), KernelError> {
        match self.states.get_mut(id.index()) {
            Some(state @ PromiseState::Admitted) => {
                *state = PromiseState::Dispatched;
                Ok(())
            }
            _ => Err(KernelError::InvalidState(id)),
        }
    }

    /// Record the outcome of a dispatched receipt. Outcomes are immutable:
    /// recording twice is an engine fault.
    pub fn record_outcome(&mut self, id: PromiseId, outcome: Outcome) -> Result<(), KernelError> {
        match self.states.get_mut(id.index()) {
            Some(state @ PromiseState::Dispatched) => {
                *state = PromiseState::Resolved;
                self.outcomes[id.index()] = Some(outcome);
                Ok(())
            }
            _ => Err(KernelError::InvalidState(id)),
        }
    }

    /// Ledger reservation made for this node at admission.
    pub fn reservation(&self, id: PromiseId) -> Gas {
        self.reservations.get(id.index()).copied().unwrap_or(0)
    }

    /// Transition every node feeding the given callback — including joins
    /// between them — from `Resolved` to `Delivered`.
    pub fn mark_delivered_feeders(&mut self, callback: PromiseId) -> Result<(), KernelError> {
        let record = self
            .records
            .get(callback.index())
            .ok_or(KernelError::InvalidState(callback))?;
        let mut pending = record.dependencies.clone();
        while let Some(dep) = pending.pop() {
            let record = self
                .records
                .get(dep.index())
                .ok_or(KernelError::InvalidState(dep))?;
            if record.combinator == Combinator::Joined {
                pending.extend_from_slice(&record.dependencies);
            }
            if let Some(state) = self.states.get_mut(dep.index()) {
                if *state == PromiseState::Resolved {
                    *state = PromiseState::Delivered;
                }
            }
        }
        Ok(())
    }

    /// True once no node can make further progress.
    pub fn is_idle(&self) -> bool {
        self.states
            .iter()
            .all(|state| matches!(state, PromiseState::Resolved | PromiseState::Delivered))
    }

    fn dependencies_resolved(&self, idx: usize) -> bool {
        self.records[idx].dependencies.iter().all(|dep| {
            matches!(
                self.states.get(dep.index()),
                Some(PromiseState::Resolved | PromiseState::Delivered)
            )
        })
    }

    /// Whether any outcome feeding this node (joins flattened) is a failure.
    fn has_failed_ancestor(&self, idx: usize) -> bool {
        let mut pending: Vec<PromiseId> = self.records[idx].dependencies.clone();
        while let Some(dep) = pending.pop() {
            let Some(record) = self.records.get(dep.index()) else {
                continue;
            };
            if record.combinator == Combinator::Joined {
                pending.extend_from_slice(&record.dependencies);
                continue;
            }
            if matches!(
                self.outcomes.get(dep.index()),
                Some(Some(Outcome::Failure { .. }))
            ) {
                return true;
            }
        }
        false
    }
}
