use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Computation budget unit metering all work within a transaction's promise tree.
pub type Gas = u64;

/// Value attached to a call and transferred to the target on dispatch.
pub type Balance = u128;

/// Identity of a contract account.
///
/// Lowercase alphanumerics plus `.`, `_`, `-`, between 2 and 64 characters,
/// never starting or ending with a separator.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Result<Self, AccountIdError> {
        let id = id.into();
        if id.len() < 2 || id.len() > 64 {
            return Err(AccountIdError::Length(id.len()));
        }
        let separator = |c: char| matches!(c, '.' | '_' | '-');
        if id.starts_with(separator) || id.ends_with(separator) {
            return Err(AccountIdError::EdgeSeparator(id));
        }
        match id
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || separator(*c)))
        {
            Some(bad) => Err(AccountIdError::Character(bad)),
            None => Ok(Self(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccountId").field(&self.0).finish()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("account id length must be 2..=64, got {0}")]
    Length(usize),
    #[error("account id '{0}' starts or ends with a separator")]
    EdgeSeparator(String),
    #[error("account id contains invalid character '{0}'")]
    Character(char),
}

/// Arena index identifying one promise within a transaction. Only valid for
/// dependency references inside the invocation that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromiseId(u64);

impl PromiseId {
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for PromiseId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_account_ids() {
        for id in ["alice", "token.factory", "dex-v2_main", "a1"] {
            assert!(AccountId::new(id).is_ok(), "rejected {id}");
        }
    }

    #[test]
    fn rejects_malformed_account_ids() {
        assert_eq!(AccountId::new("a").unwrap_err(), AccountIdError::Length(1));
        assert!(matches!(
            AccountId::new(".alice").unwrap_err(),
            AccountIdError::EdgeSeparator(_)
        ));
        assert_eq!(
            AccountId::new("Alice").unwrap_err(),
            AccountIdError::Character('A')
        );
    }
}
