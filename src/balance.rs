use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::ledger::{Installment, LoanSnapshot};
use crate::types::{InstallmentId, InstallmentStatus, LoanId, LoanStatus};

// Everything in this module is a pure function over a ledger snapshot,
// recomputed on every read. No caching.

/// total principal disbursed to date: original principal plus every
/// top-up event's delta
pub fn total_principal_to_date(snapshot: &LoanSnapshot) -> Money {
    let top_ups: Money = snapshot.events.iter().map(|e| e.top_up_delta()).sum();
    snapshot.loan.principal + top_ups
}

/// sum of amounts actually paid, regardless of due date
pub fn paid_amount(snapshot: &LoanSnapshot) -> Money {
    snapshot
        .installments
        .iter()
        .filter(|i| i.is_paid())
        .map(|i| i.amount)
        .sum()
}

/// total principal to date minus amounts actually paid
pub fn outstanding_balance(snapshot: &LoanSnapshot) -> Money {
    total_principal_to_date(snapshot) - paid_amount(snapshot)
}

/// the due installment with the earliest due date on or after `today`
pub fn next_due<'a>(snapshot: &'a LoanSnapshot, today: NaiveDate) -> Option<&'a Installment> {
    snapshot
        .installments
        .iter()
        .filter(|i| i.is_due() && i.due_date >= today)
        .min_by_key(|i| i.due_date)
}

/// paid installments over all non-skipped installments. Skipped
/// installments were superseded, not defaulted, so they leave the
/// denominator.
pub fn progress(snapshot: &LoanSnapshot) -> Decimal {
    let total = snapshot
        .installments
        .iter()
        .filter(|i| i.status != InstallmentStatus::Skipped)
        .count();
    if total == 0 {
        return Decimal::ZERO;
    }
    let paid = snapshot.installments.iter().filter(|i| i.is_paid()).count();
    Decimal::from(paid as u64) / Decimal::from(total as u64)
}

/// derived metrics for the query surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub loan_id: LoanId,
    pub status: LoanStatus,
    pub total_principal: Money,
    pub paid_amount: Money,
    pub outstanding_balance: Money,
    pub next_due_id: Option<InstallmentId>,
    pub next_due_date: Option<NaiveDate>,
    pub next_due_amount: Option<Money>,
    pub paid_count: u32,
    pub total_count: u32,
    pub progress: Decimal,
}

/// compute all derived metrics in one pass over the snapshot
pub fn summarize(snapshot: &LoanSnapshot, today: NaiveDate) -> LoanSummary {
    let next = next_due(snapshot, today);
    LoanSummary {
        loan_id: snapshot.loan.id,
        status: snapshot.loan.status,
        total_principal: total_principal_to_date(snapshot),
        paid_amount: paid_amount(snapshot),
        outstanding_balance: outstanding_balance(snapshot),
        next_due_id: next.map(|i| i.id),
        next_due_date: next.map(|i| i.due_date),
        next_due_amount: next.map(|i| i.amount),
        paid_count: snapshot.installments.iter().filter(|i| i.is_paid()).count() as u32,
        total_count: snapshot
            .installments
            .iter()
            .filter(|i| i.status != InstallmentStatus::Skipped)
            .count() as u32,
        progress: progress(snapshot),
    }
}

/// ledger self-check: the non-skipped installment amounts must sum to the
/// total principal to date, to the minor unit
pub fn conservation_holds(snapshot: &LoanSnapshot) -> bool {
    let scheduled: Money = snapshot
        .installments
        .iter()
        .filter(|i| i.status != InstallmentStatus::Skipped)
        .map(|i| i.amount)
        .sum();
    scheduled == total_principal_to_date(snapshot)
}
