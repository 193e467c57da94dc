use pledge_types::{AccountId, Balance, Combinator, Gas, PromiseCall, PromiseId};
use thiserror::Error;

use crate::config::RuntimeConfig;

/// What a promise node does once its dependencies resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromiseKind {
    /// A call into some contract. Fails fast if an ancestor failed.
    Call(PromiseCall),
    /// A restricted call back into the contract that built the graph.
    /// Dispatched once all parents are resolved, success or failure, with
    /// the ordered outcome list attached.
    Callback(PromiseCall),
    /// Pure synchronization node; carries no call and burns no gas.
    Join,
}

impl PromiseKind {
    pub fn call(&self) -> Option<&PromiseCall> {
        match self {
            PromiseKind::Call(call) | PromiseKind::Callback(call) => Some(call),
            PromiseKind::Join => None,
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, PromiseKind::Callback(_))
    }
}

/// One node of the dependency graph. Immutable once the session that built
/// it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromiseRecord {
    pub id: PromiseId,
    /// Account whose invocation built this promise; becomes the caller seen
    /// by the dispatched target.
    pub originator: AccountId,
    pub kind: PromiseKind,
    /// Parent promises, in declaration order. Outcome slots are assembled
    /// in exactly this order.
    pub dependencies: Vec<PromiseId>,
    pub combinator: Combinator,
}

/// Everything one invocation built: records with arena-global ids starting
/// at the session base, plus the optional return marker.
#[derive(Debug)]
pub struct SessionGraph {
    pub records: Vec<PromiseRecord>,
    pub return_promise: Option<PromiseId>,
}

impl SessionGraph {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Builder handed to a contract for the duration of one invocation.
///
/// Dependency ids are only meaningful within the session that issued them;
/// referencing a promise from an earlier invocation is rejected rather than
/// silently resolved.
pub struct BuilderSession {
    origin: AccountId,
    /// Arena id of this session's first promise; doubles as the count of
    /// promises built by earlier invocations of the transaction.
    base: u64,
    records: Vec<PromiseRecord>,
    return_promise: Option<PromiseId>,
    config: RuntimeConfig,
}

impl BuilderSession {
    pub(crate) fn new(origin: AccountId, base: u64, config: RuntimeConfig) -> Self {
        Self {
            origin,
            base,
            records: Vec::new(),
            return_promise: None,
            config,
        }
    }

    /// The account this session builds promises on behalf of.
    pub fn origin(&self) -> &AccountId {
        &self.origin
    }

    /// Schedule a root call with no dependencies; eligible for the first
    /// wave after this invocation returns.
    pub fn create(
        &mut self,
        target: AccountId,
        method: impl Into<String>,
        args: Vec<u8>,
        attached_value: Balance,
        static_gas: Gas,
    ) -> Result<PromiseId, BuildError> {
        let call = PromiseCall {
            target,
            method: method.into(),
            args,
            attached_value,
            static_gas,
        };
        self.push(PromiseKind::Call(call), Vec::new(), Combinator::Sequential)
    }

    /// Schedule a call that waits for every listed parent and is dispatched
    /// only if all of them succeed.
    pub fn then(
        &mut self,
        parents: &[PromiseId],
        target: AccountId,
        method: impl Into<String>,
        args: Vec<u8>,
        static_gas: Gas,
    ) -> Result<PromiseId, BuildError> {
        let deps = self.checked_dependencies(parents)?;
        let call = PromiseCall {
            target,
            method: method.into(),
            args,
            attached_value: 0,
            static_gas,
        };
        self.push(PromiseKind::Call(call), deps, Combinator::Sequential)
    }

    /// Schedule a restricted callback into this session's own contract,
    /// receiving the parents' outcomes in declaration order once all of
    /// them are resolved — failed or not.
    pub fn then_callback(
        &mut self,
        parents: &[PromiseId],
        method: impl Into<String>,
        args: Vec<u8>,
        static_gas: Gas,
    ) -> Result<PromiseId, BuildError> {
        let deps = self.checked_dependencies(parents)?;
        let call = PromiseCall {
            target: self.origin.clone(),
            method: method.into(),
            args,
            attached_value: 0,
            static_gas,
        };
        self.push(PromiseKind::Callback(call), deps, Combinator::Sequential)
    }

    /// Fan several promises into one dependency set for a later `then`.
    pub fn join(&mut self, parents: &[PromiseId]) -> Result<PromiseId, BuildError> {
        let deps = self.checked_dependencies(parents)?;
        self.push(PromiseKind::Join, deps, Combinator::Joined)
    }

    /// Mark a promise as the invocation's return value. At most one per
    /// invocation.
    pub fn mark_return(&mut self, id: PromiseId) -> Result<(), BuildError> {
        self.check_in_session(id)?;
        if let Some(existing) = self.return_promise {
            return Err(BuildError::ReturnAlreadySet { existing });
        }
        self.return_promise = Some(id);
        Ok(())
    }

    /// Validate and seal the session. Runs the mandatory cycle check before
    /// anything is handed to the scheduler.
    pub fn finish(self) -> Result<SessionGraph, BuildError> {
        validate_acyclic(&self.records, self.base)?;
        Ok(SessionGraph {
            records: self.records,
            return_promise: self.return_promise,
        })
    }

    fn next_id(&self) -> u64 {
        self.base + self.records.len() as u64
    }

    fn push(
        &mut self,
        kind: PromiseKind,
        dependencies: Vec<PromiseId>,
        combinator: Combinator,
    ) -> Result<PromiseId, BuildError> {
        let total = self.base as usize + self.records.len();
        if total >= self.config.max_promises_per_transaction {
            return Err(BuildError::TooManyPromises {
                limit: self.config.max_promises_per_transaction,
            });
        }
        let id = PromiseId::new(self.next_id());
        self.records.push(PromiseRecord {
            id,
            originator: self.origin.clone(),
            kind,
            dependencies,
            combinator,
        });
        Ok(id)
    }

    fn checked_dependencies(&self, parents: &[PromiseId]) -> Result<Vec<PromiseId>, BuildError> {
        if parents.is_empty() {
            return Err(BuildError::EmptyDependencies);
        }
        if parents.len() > self.config.max_dependencies_per_promise {
            return Err(BuildError::TooManyDependencies {
                limit: self.config.max_dependencies_per_promise,
            });
        }
        let mut deps = Vec::with_capacity(parents.len());
        for parent in parents {
            self.check_in_session(*parent)?;
            if deps.contains(parent) {
                return Err(BuildError::DuplicateDependency(*parent));
            }
            deps.push(*parent);
        }
        Ok(deps)
    }

    fn check_in_session(&self, id: PromiseId) -> Result<(), BuildError> {
        if id.value() < self.base {
            return Err(BuildError::ForeignPromise(id));
        }
        if id.value() >= self.next_id() {
            return Err(BuildError::UnknownPromise(id));
        }
        Ok(())
    }
}

/// Depth-first cycle check over a session's records. The typed builder API
/// cannot express a forward reference, but graphs also arrive from
/// persisted receipt records where dependency ids are arbitrary, so the
/// check is mandatory before scheduling.
pub(crate) fn validate_acyclic(records: &[PromiseRecord], base: u64) -> Result<(), BuildError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let index_of = |id: PromiseId| -> Option<usize> {
        let idx = id.value().checked_sub(base)? as usize;
        (idx < records.len()).then_some(idx)
    };

    let mut marks = vec![Mark::Unvisited; records.len()];
    for start in 0..records.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        // Iterative DFS: (node, next dependency position).
        let mut stack = vec![(start, 0usize)];
        marks[start] = Mark::InProgress;
        while let Some((node, pos)) = stack.pop() {
            match records[node].dependencies.get(pos) {
                None => {
                    marks[node] = Mark::Done;
                }
                Some(dep) => {
                    stack.push((node, pos + 1));
                    let Some(dep_idx) = index_of(*dep) else {
                        // Outside the session: already validated or foreign;
                        // either way it cannot close a cycle inside it.
                        continue;
                    };
                    match marks[dep_idx] {
                        Mark::InProgress => {
                            return Err(BuildError::CyclicDependency(records[node].id));
                        }
                        Mark::Unvisited => {
                            marks[dep_idx] = Mark::InProgress;
                            stack.push((dep_idx, 0));
                        }
                        Mark::Done => {}
                    }
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("dependency cycle detected at promise {0}")]
    CyclicDependency(PromiseId),
    #[error("promise {0} does not exist in this invocation")]
    UnknownPromise(PromiseId),
    #[error("promise {0} belongs to a different invocation")]
    ForeignPromise(PromiseId),
    #[error("promise {0} listed more than once in a dependency set")]
    DuplicateDependency(PromiseId),
    #[error("dependency set must not be empty")]
    EmptyDependencies,
    #[error("return promise already set to {existing}")]
    ReturnAlreadySet { existing: PromiseId },
    #[error("transaction promise limit of {limit} reached")]
    TooManyPromises { limit: usize },
    #[error("dependency limit of {limit} exceeded")]
    TooManyDependencies { limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    fn session() -> BuilderSession {
        BuilderSession::new(account("wallet"), 0, RuntimeConfig::default())
    }

    #[test]
    fn chains_and_joins_build_in_declaration_order() {
        let mut session = session();
        let a = session
            .create(account("oracle"), "price", vec![], 0, 30)
            .unwrap();
        let b = session
            .create(account("vault"), "balance", vec![], 0, 30)
            .unwrap();
        let gate = session.join(&[a, b]).unwrap();
        let done = session
            .then_callback(&[gate], "on_both", vec![], 20)
            .unwrap();
        session.mark_return(done).unwrap();

        let graph = session.finish().unwrap();
        assert_eq!(graph.records.len(), 4);
        assert_eq!(graph.records[2].dependencies, vec![a, b]);
        assert_eq!(graph.records[2].combinator, Combinator::Joined);
        assert!(graph.records[3].kind.is_restricted());
        assert_eq!(
            graph.records[3].kind.call().unwrap().target,
            account("wallet")
        );
        assert_eq!(graph.return_promise, Some(done));
    }

    #[test]
    fn rejects_unknown_and_foreign_dependencies() {
        let mut session = BuilderSession::new(account("wallet"), 10, RuntimeConfig::default());
        let err = session
            .then(&[PromiseId::new(3)], account("vault"), "m", vec![], 5)
            .unwrap_err();
        assert_eq!(err, BuildError::ForeignPromise(PromiseId::new(3)));

        let err = session
            .then(&[PromiseId::new(11)], account("vault"), "m", vec![], 5)
            .unwrap_err();
        assert_eq!(err, BuildError::UnknownPromise(PromiseId::new(11)));
    }

    #[test]
    fn return_can_only_be_marked_once() {
        let mut session = session();
        let a = session
            .create(account("oracle"), "price", vec![], 0, 10)
            .unwrap();
        let b = session
            .then_callback(&[a], "on_price", vec![], 10)
            .unwrap();
        session.mark_return(b).unwrap();
        assert_eq!(
            session.mark_return(a).unwrap_err(),
            BuildError::ReturnAlreadySet { existing: b }
        );
    }

    #[test]
    fn promise_limit_applies_across_the_arena() {
        let config = RuntimeConfig {
            max_promises_per_transaction: 3,
            ..RuntimeConfig::default()
        };
        // Two promises already live in the arena from earlier invocations.
        let mut session = BuilderSession::new(account("wallet"), 2, config);
        session
            .create(account("a1"), "m", vec![], 0, 1)
            .unwrap();
        let err = session.create(account("a1"), "m", vec![], 0, 1).unwrap_err();
        assert_eq!(err, BuildError::TooManyPromises { limit: 3 });
    }

    #[test]
    fn cycle_in_imported_records_is_rejected() {
        // The typed API cannot produce this, but replayed wire records can:
        // 0 -> 1 -> 0.
        let wallet = account("wallet");
        let call = |target: &str| {
            PromiseKind::Call(PromiseCall {
                target: account(target),
                method: "m".into(),
                args: vec![],
                attached_value: 0,
                static_gas: 1,
            })
        };
        let records = vec![
            PromiseRecord {
                id: PromiseId::new(0),
                originator: wallet.clone(),
                kind: call("a1"),
                dependencies: vec![PromiseId::new(1)],
                combinator: Combinator::Sequential,
            },
            PromiseRecord {
                id: PromiseId::new(1),
                originator: wallet,
                kind: call("b1"),
                dependencies: vec![PromiseId::new(0)],
                combinator: Combinator::Sequential,
            },
        ];
        let err = validate_acyclic(&records, 0).unwrap_err();
        assert!(matches!(err, BuildError::CyclicDependency(_)));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let records = vec![PromiseRecord {
            id: PromiseId::new(0),
            originator: account("wallet"),
            kind: PromiseKind::Join,
            dependencies: vec![PromiseId::new(0)],
            combinator: Combinator::Joined,
        }];
        assert!(matches!(
            validate_acyclic(&records, 0).unwrap_err(),
            BuildError::CyclicDependency(_)
        ));
    }

    #[test]
    fn duplicate_and_empty_dependency_sets_are_rejected() {
        let mut session = session();
        let a = session
            .create(account("oracle"), "price", vec![], 0, 10)
            .unwrap();
        assert_eq!(session.join(&[]).unwrap_err(), BuildError::EmptyDependencies);
        assert_eq!(
            session.join(&[a, a]).unwrap_err(),
            BuildError::DuplicateDependency(a)
        );
    }
}
