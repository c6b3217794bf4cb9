use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{EventId, InstallmentId, LoanId, PaymentMethod};

/// ledger-affecting actions recorded against a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoanEventKind {
    /// loan originated and scheduled
    Disburse {
        amount: Money,
    },
    /// principal increase, folded into derived total principal
    TopUp {
        amount: Money,
    },
    /// future installments retired and re-amortized
    Restructure {
        top_up: Option<Money>,
        installment_amount: Money,
        duration_months: u32,
    },
    /// one installment deferred to the schedule tail
    SkipInstallment {
        installment_id: InstallmentId,
        replacement_id: InstallmentId,
    },
    /// installment settled by the payroll/manual collaborator
    Payment {
        installment_id: InstallmentId,
        amount: Money,
        method: PaymentMethod,
    },
    /// free-text annotation
    Note,
}

/// immutable audit record; appended in the same commit as the mutation it
/// describes, never updated or deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanEvent {
    pub id: EventId,
    pub loan_id: LoanId,
    pub kind: LoanEventKind,
    pub effective_date: NaiveDate,
    pub notes: Option<String>,
    /// opaque acting-user id from the identity collaborator
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl LoanEvent {
    pub fn new(
        loan_id: LoanId,
        kind: LoanEventKind,
        effective_date: NaiveDate,
        notes: Option<String>,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            kind,
            effective_date,
            notes,
            created_by: created_by.to_string(),
            created_at,
        }
    }

    /// principal delta this event contributes to total principal to date
    pub fn top_up_delta(&self) -> Money {
        match self.kind {
            LoanEventKind::TopUp { amount } => amount,
            _ => Money::ZERO,
        }
    }
}
