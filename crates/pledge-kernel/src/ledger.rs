use pledge_types::Gas;
use thiserror::Error;

/// Per-transaction gas ledger shared by the scheduler (admission) and the
/// dispatcher (settlement).
///
/// The balance is strictly decreasing: admission moves gas from `remaining`
/// into `reserved`, settlement moves the full reservation into `spent`.
/// Nothing is ever credited back — an execution that uses less than its
/// reservation forfeits the difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasLedger {
    initial: Gas,
    reserved: Gas,
    spent: Gas,
    used: Gas,
}

impl GasLedger {
    pub fn new(attached: Gas) -> Self {
        Self {
            initial: attached,
            reserved: 0,
            spent: 0,
            used: 0,
        }
    }

    pub fn initial(&self) -> Gas {
        self.initial
    }

    pub fn remaining(&self) -> Gas {
        self.initial - self.reserved - self.spent
    }

    /// Total gas debited from the budget (reservations already settled).
    pub fn spent(&self) -> Gas {
        self.spent
    }

    /// Gas actually consumed by execution; the `spent - used` difference is
    /// forfeited reservation surplus.
    pub fn used(&self) -> Gas {
        self.used
    }

    /// Reserve `amount` for a receipt about to be scheduled. Rejected
    /// admissions leave the ledger untouched.
    pub fn admit(&mut self, amount: Gas) -> Result<(), LedgerError> {
        let remaining = self.remaining();
        if amount > remaining {
            return Err(LedgerError::BudgetExceeded {
                requested: amount,
                remaining,
            });
        }
        self.reserved += amount;
        Ok(())
    }

    /// Settle a receipt's reservation after dispatch. The whole reservation
    /// is debited; `used` is recorded for accounting only.
    pub fn settle(&mut self, reservation: Gas, used: Gas) -> Result<(), LedgerError> {
        if reservation > self.reserved {
            return Err(LedgerError::ReservationUnderflow {
                reservation,
                reserved: self.reserved,
            });
        }
        self.reserved -= reservation;
        self.spent += reservation;
        self.used += used.min(reservation);
        Ok(())
    }

    /// Debit gas consumed outside any reservation (the transaction's entry
    /// invocation, which has no receipt of its own).
    pub fn consume(&mut self, amount: Gas) -> Result<(), LedgerError> {
        let remaining = self.remaining();
        if amount > remaining {
            return Err(LedgerError::BudgetExceeded {
                requested: amount,
                remaining,
            });
        }
        self.spent += amount;
        self.used += amount;
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("gas budget exceeded: requested {requested}, remaining {remaining}")]
    BudgetExceeded { requested: Gas, remaining: Gas },
    #[error("settlement of {reservation} exceeds outstanding reservations ({reserved})")]
    ReservationUnderflow { reservation: Gas, reserved: Gas },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_within_budget_reserves() {
        let mut ledger = GasLedger::new(100);
        ledger.admit(30).unwrap();
        assert_eq!(ledger.remaining(), 70);
        assert_eq!(ledger.spent(), 0);
    }

    #[test]
    fn rejected_admission_leaves_no_debit() {
        let mut ledger = GasLedger::new(50);
        ledger.admit(40).unwrap();
        let err = ledger.admit(20).unwrap_err();
        assert_eq!(
            err,
            LedgerError::BudgetExceeded {
                requested: 20,
                remaining: 10
            }
        );
        assert_eq!(ledger.remaining(), 10);
    }

    #[test]
    fn settlement_forfeits_unused_reservation() {
        let mut ledger = GasLedger::new(100);
        ledger.admit(30).unwrap();
        ledger.settle(30, 12).unwrap();
        // The full 30 is gone; only 12 was genuinely consumed.
        assert_eq!(ledger.remaining(), 70);
        assert_eq!(ledger.spent(), 30);
        assert_eq!(ledger.used(), 12);
    }

    #[test]
    fn total_debits_never_exceed_initial() {
        let mut ledger = GasLedger::new(100);
        ledger.admit(60).unwrap();
        ledger.settle(60, 60).unwrap();
        ledger.consume(25).unwrap();
        assert!(ledger.admit(20).is_err());
        ledger.admit(15).unwrap();
        ledger.settle(15, 3).unwrap();
        assert_eq!(ledger.spent(), 100);
        assert!(ledger.spent() <= ledger.initial());
        assert_eq!(ledger.remaining(), 0);
    }

    #[test]
    fn settlement_underflow_is_an_error() {
        let mut ledger = GasLedger::new(10);
        let err = ledger.settle(5, 5).unwrap_err();
        assert!(matches!(err, LedgerError::ReservationUnderflow { .. }));
    }
}
