use thiserror::Error;

use crate::decimal::Money;
use crate::types::{InstallmentId, InstallmentStatus, LoanId, LoanStatus};

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("invalid principal: {amount}")]
    InvalidPrincipal {
        amount: Money,
    },

    #[error("invalid repayment policy: {message}")]
    InvalidPolicy {
        message: String,
    },

    #[error("ambiguous repayment policy: supply exactly one of duration or installment amount")]
    AmbiguousPolicy,

    #[error("installment {installment_id} cannot be skipped: status is {status:?}")]
    InstallmentNotSkippable {
        installment_id: InstallmentId,
        status: InstallmentStatus,
    },

    #[error("installment {installment_id} cannot be paid: status is {status:?}")]
    InstallmentNotPayable {
        installment_id: InstallmentId,
        status: InstallmentStatus,
    },

    #[error("nothing to restructure: outstanding balance is {outstanding}")]
    NothingToRestructure {
        outstanding: Money,
    },

    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: LoanStatus,
        to: LoanStatus,
    },

    #[error("concurrent modification of loan {loan_id}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        loan_id: LoanId,
        expected: u64,
        actual: u64,
    },

    #[error("loan not found: {loan_id}")]
    LoanNotFound {
        loan_id: LoanId,
    },

    #[error("installment {installment_id} not found on loan {loan_id}")]
    InstallmentNotFound {
        loan_id: LoanId,
        installment_id: InstallmentId,
    },

    #[error("storage failure: {message}")]
    Storage {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, LoanError>;
