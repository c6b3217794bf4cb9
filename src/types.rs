use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LoanError, Result};

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for an installment
pub type InstallmentId = Uuid;

/// unique identifier for a ledger event
pub type EventId = Uuid;

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// requested by the employee, awaiting approval
    Requested,
    /// approved but not yet disbursed
    Approved,
    /// disbursed and repaying
    Active,
    /// fully amortized, no due installments remain
    Closed,
    /// rejected by the approval workflow
    Rejected,
    /// withdrawn before activation
    Cancelled,
}

impl LoanStatus {
    /// terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Closed | LoanStatus::Rejected | LoanStatus::Cancelled
        )
    }

    /// legality of a status transition
    pub fn can_transition(&self, to: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, to),
            (Requested, Approved)
                | (Requested, Rejected)
                | (Requested, Cancelled)
                | (Approved, Active)
                | (Approved, Cancelled)
                | (Active, Closed)
        )
    }
}

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentStatus {
    /// scheduled, awaiting payment
    Due,
    /// settled by payroll deduction or manual payment
    Paid,
    /// retired and replaced; permanent history, never deleted
    Skipped,
}

/// how an installment was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Payroll,
    Manual,
}

/// repayment policy: exactly one of a fixed duration or a fixed
/// per-installment amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepaymentPolicy {
    /// N equal monthly installments (amount derived from principal)
    FixedDuration { months: u32 },
    /// fixed installment amount (duration derived from principal)
    FixedAmount { amount: Money },
}

impl RepaymentPolicy {
    /// resolve a policy from optional caller inputs; supplying neither or
    /// both is ambiguous
    pub fn from_parts(duration_months: Option<u32>, amount: Option<Money>) -> Result<Self> {
        match (duration_months, amount) {
            (Some(months), None) => Ok(RepaymentPolicy::FixedDuration { months }),
            (None, Some(amount)) => Ok(RepaymentPolicy::FixedAmount { amount }),
            _ => Err(LoanError::AmbiguousPolicy),
        }
    }
}
