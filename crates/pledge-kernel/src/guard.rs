use std::collections::BTreeMap;

use pledge_types::AccountId;

/// Committed contract state for every account the transaction touches.
///
/// Commits are durable the moment they land: there is deliberately no
/// rollback surface, so a state change that must be conditional on a
/// promise's success has to be deferred into the callback that observes
/// the outcome. Dispatch works through [`StateScope`], which stages one
/// receipt's writes and discards them wholesale if the callee fails —
/// everything committed earlier, including the calling contract's
/// pre-promise mutations, stands.
#[derive(Debug, Default, Clone)]
pub struct StateLedger {
    committed: BTreeMap<AccountId, Vec<u8>>,
}

impl StateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account's state, e.g. from the ledger collaborator.
    pub fn seed(&mut self, account: AccountId, state: Vec<u8>) {
        self.committed.insert(account, state);
    }

    pub fn committed(&self, account: &AccountId) -> Option<&[u8]> {
        self.committed.get(account).map(Vec::as_slice)
    }

    /// Open the single-writer scope for one receipt's execution. The scope
    /// sees everything committed so far — receipts dispatched earlier in
    /// the wave included, since each commits before the next opens.
    pub fn scope(&mut self, account: &AccountId) -> StateScope<'_> {
        let staged = self.committed.get(account).cloned();
        StateScope {
            ledger: self,
            account: account.clone(),
            staged,
            dirty: false,
        }
    }
}

/// Staged view of one account's state for the duration of one receipt.
/// Dropping the scope without [`StateScope::commit`] discards the staged
/// writes; committing publishes them into the ledger.
#[derive(Debug)]
pub struct StateScope<'a> {
    ledger: &'a mut StateLedger,
    account: AccountId,
    staged: Option<Vec<u8>>,
    dirty: bool,
}

impl StateScope<'_> {
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Current state: staged writes first, committed state otherwise.
    pub fn read(&self) -> Option<&[u8]> {
        self.staged.as_deref()
    }

    pub fn write(&mut self, state: Vec<u8>) {
        self.staged = Some(state);
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.staged = None;
        self.dirty = true;
    }

    /// Publish the staged writes. Consumes the scope: one commit per
    /// receipt, no partial publication.
    pub fn commit(self) {
        if !self.dirty {
            return;
        }
        match self.staged {
            Some(state) => {
                self.ledger.committed.insert(self.account, state);
            }
            None => {
                self.ledger.committed.remove(&self.account);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    #[test]
    fn committed_scope_is_durable() {
        let mut ledger = StateLedger::new();
        let mut scope = ledger.scope(&account("vault"));
        scope.write(b"v1".to_vec());
        scope.commit();
        assert_eq!(ledger.committed(&account("vault")), Some(b"v1".as_ref()));
    }

    #[test]
    fn dropped_scope_discards_staged_writes() {
        let mut ledger = StateLedger::new();
        ledger.seed(account("vault"), b"v1".to_vec());
        {
            let mut scope = ledger.scope(&account("vault"));
            scope.write(b"v2".to_vec());
            // Callee failed: scope dropped, nothing published.
        }
        assert_eq!(ledger.committed(&account("vault")), Some(b"v1".as_ref()));
    }

    #[test]
    fn scope_reads_through_to_committed_state() {
        let mut ledger = StateLedger::new();
        ledger.seed(account("vault"), b"seed".to_vec());
        let scope = ledger.scope(&account("vault"));
        assert_eq!(scope.read(), Some(b"seed".as_ref()));
    }

    #[test]
    fn untouched_scope_commits_nothing() {
        let mut ledger = StateLedger::new();
        ledger.seed(account("vault"), b"seed".to_vec());
        let scope = ledger.scope(&account("vault"));
        scope.commit();
        assert_eq!(ledger.committed(&account("vault")), Some(b"seed".as_ref()));
    }
}
