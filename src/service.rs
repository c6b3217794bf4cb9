use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::dates::add_months;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{LoanEvent, LoanEventKind};
use crate::ledger::{Installment, LedgerStore, Loan, LoanMutation, LoanSnapshot};
use crate::schedule::Schedule;
use crate::types::{
    InstallmentId, InstallmentStatus, LoanId, LoanStatus, PaymentMethod, RepaymentPolicy,
};

/// skipped-reason recorded on installments retired by a restructure
pub const RESTRUCTURED_REASON: &str = "Restructured";

/// request to originate a loan
#[derive(Debug, Clone)]
pub struct OriginateRequest {
    pub employee_id: String,
    pub principal: Money,
    pub policy: RepaymentPolicy,
    pub start_date: NaiveDate,
    /// true when the approval workflow has already confirmed; otherwise the
    /// loan starts as `Requested`
    pub activate: bool,
    pub deduct_from_payroll: bool,
    pub notes: Option<String>,
}

/// request to restructure a loan. Exactly one of `new_duration_months` /
/// `new_installment_amount` must be supplied.
#[derive(Debug, Clone)]
pub struct RestructureRequest {
    pub effective_date: NaiveDate,
    pub top_up: Option<Money>,
    pub new_duration_months: Option<u32>,
    pub new_installment_amount: Option<Money>,
    pub notes: Option<String>,
}

/// result of a restructure
#[derive(Debug, Clone, PartialEq)]
pub struct RestructureOutcome {
    /// principal of the replacement schedule (outstanding remainder + top-up)
    pub new_principal: Money,
    pub installment_amount: Money,
    pub duration_months: u32,
}

/// the only component permitted to mutate the installment set.
///
/// Every mutating operation is a single optimistic commit: read a versioned
/// snapshot, compute, commit with the expected version. A
/// `ConcurrentModification` result means another mutation interleaved; the
/// caller retries from a fresh read.
pub struct LoanService {
    store: Arc<dyn LedgerStore>,
}

impl LoanService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// read access to the underlying ledger (query surface)
    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    /// servicing mutations only apply to active loans; terminal and
    /// not-yet-disbursed loans are rejected
    fn ensure_active(loan: &Loan) -> Result<()> {
        match loan.status {
            LoanStatus::Active => Ok(()),
            from => Err(LoanError::InvalidStateTransition {
                from,
                to: LoanStatus::Active,
            }),
        }
    }

    /// originate a loan: validate, generate the initial schedule
    /// (version 1, numbers from 1), persist, append the disburse event
    pub fn originate(
        &self,
        request: OriginateRequest,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<Loan> {
        let schedule = Schedule::generate(
            request.principal,
            request.policy,
            request.start_date,
            1,
            1,
        )?;

        let loan = Loan {
            id: Uuid::new_v4(),
            employee_id: request.employee_id,
            principal: request.principal,
            installment_amount: schedule.installment_amount,
            duration_months: schedule.duration_months,
            start_date: request.start_date,
            status: if request.activate {
                LoanStatus::Active
            } else {
                LoanStatus::Requested
            },
            deduct_from_payroll: request.deduct_from_payroll,
            notes: request.notes,
        };

        let installments: Vec<Installment> = schedule
            .installments
            .iter()
            .map(|draft| Installment::from_draft(loan.id, draft, None))
            .collect();

        let event = LoanEvent::new(
            loan.id,
            LoanEventKind::Disburse {
                amount: loan.principal,
            },
            request.start_date,
            None,
            actor,
            time.now(),
        );

        self.store.insert_loan(loan.clone(), installments, vec![event])?;

        info!(
            loan_id = %loan.id,
            employee_id = %loan.employee_id,
            principal = %loan.principal,
            duration_months = loan.duration_months,
            "loan originated"
        );

        Ok(loan)
    }

    /// status transition driven by the approval workflow. Enforces the
    /// state machine; terminal states admit no exit.
    pub fn transition(&self, loan_id: LoanId, to: LoanStatus) -> Result<Loan> {
        let snapshot = self.store.snapshot(loan_id)?;
        let from = snapshot.loan.status;
        if !from.can_transition(to) {
            return Err(LoanError::InvalidStateTransition { from, to });
        }

        let mut loan = snapshot.loan.clone();
        loan.status = to;
        self.store.commit(
            snapshot.version,
            LoanMutation {
                loan: loan.clone(),
                installment_updates: Vec::new(),
                new_installments: Vec::new(),
                events: Vec::new(),
            },
        )?;

        info!(%loan_id, ?from, ?to, "loan status changed");
        Ok(loan)
    }

    /// defer one due installment to the tail of the active schedule.
    ///
    /// The skipped installment stays in the ledger as history; exactly one
    /// replacement of the same amount is appended one month after the
    /// current tail due date, and the loan grows by one period.
    pub fn skip_installment(
        &self,
        loan_id: LoanId,
        installment_id: InstallmentId,
        reason: &str,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<Installment> {
        let snapshot = self.store.snapshot(loan_id)?;
        Self::ensure_active(&snapshot.loan)?;
        let target = snapshot
            .installment(installment_id)
            .ok_or(LoanError::InstallmentNotFound {
                loan_id,
                installment_id,
            })?;
        if !target.is_due() {
            return Err(LoanError::InstallmentNotSkippable {
                installment_id,
                status: target.status,
            });
        }

        let tail = snapshot.tail_due_date().unwrap_or(target.due_date);

        let replacement = Installment {
            id: Uuid::new_v4(),
            loan_id,
            number: snapshot.max_installment_number() + 1,
            amount: target.amount,
            due_date: add_months(tail, 1),
            status: InstallmentStatus::Due,
            paid_at: None,
            paid_method: None,
            skipped_reason: None,
            rescheduled_from: Some(target.id),
            schedule_version: snapshot.max_schedule_version() + 1,
        };

        let mut skipped = target.clone();
        skipped.status = InstallmentStatus::Skipped;
        skipped.skipped_reason = Some(reason.to_string());

        let mut loan = snapshot.loan.clone();
        loan.duration_months += 1;

        let event = LoanEvent::new(
            loan_id,
            LoanEventKind::SkipInstallment {
                installment_id: target.id,
                replacement_id: replacement.id,
            },
            target.due_date,
            Some(reason.to_string()),
            actor,
            time.now(),
        );

        self.store.commit(
            snapshot.version,
            LoanMutation {
                loan,
                installment_updates: vec![skipped],
                new_installments: vec![replacement.clone()],
                events: vec![event],
            },
        )?;

        info!(
            %loan_id,
            skipped = %installment_id,
            replacement = %replacement.id,
            due = %replacement.due_date,
            "installment skipped to tail"
        );

        Ok(replacement)
    }

    /// retire the future, re-amortize the remainder.
    ///
    /// Every due installment dated on or after the effective date is marked
    /// skipped with reason "Restructured" and a fresh schedule is generated
    /// over the unscheduled remainder of the outstanding balance plus any
    /// top-up. Paid and already-skipped installments are never touched.
    pub fn restructure(
        &self,
        loan_id: LoanId,
        request: RestructureRequest,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<RestructureOutcome> {
        let policy = RepaymentPolicy::from_parts(
            request.new_duration_months,
            request.new_installment_amount,
        )?;
        if let Some(top_up) = request.top_up {
            if top_up.is_negative() {
                return Err(LoanError::InvalidPolicy {
                    message: format!("top-up amount must not be negative, got {top_up}"),
                });
            }
        }
        // an explicit zero top-up is the same as none
        let top_up_delta = request.top_up.filter(|t| t.is_positive());

        let snapshot = self.store.snapshot(loan_id)?;

        // a payment cannot be un-made: every paid installment reduces the
        // outstanding balance, whatever its due date. Checked before the
        // status guard so a fully amortized (closed) loan reports
        // NothingToRestructure rather than a status error.
        let total_principal = crate::balance::total_principal_to_date(&snapshot);
        let paid = crate::balance::paid_amount(&snapshot);
        let outstanding = total_principal - paid;
        if !outstanding.is_positive() {
            return Err(LoanError::NothingToRestructure { outstanding });
        }
        Self::ensure_active(&snapshot.loan)?;

        let (retired, surviving_due): (Vec<&Installment>, Vec<&Installment>) = snapshot
            .installments
            .iter()
            .filter(|i| i.is_due())
            .partition(|i| i.due_date >= request.effective_date);

        // overdue installments dated before the effective date stay in
        // place, so the new schedule only covers what they don't
        let surviving_total: Money = surviving_due.iter().map(|i| i.amount).sum();
        let top_up = top_up_delta.unwrap_or(Money::ZERO);
        let new_principal = outstanding - surviving_total + top_up;
        if !new_principal.is_positive() {
            return Err(LoanError::NothingToRestructure {
                outstanding: new_principal,
            });
        }

        let mut events = Vec::new();
        // replay order: top-up first, then the restructure that folds it in
        if top_up.is_positive() {
            events.push(LoanEvent::new(
                loan_id,
                LoanEventKind::TopUp { amount: top_up },
                request.effective_date,
                request.notes.clone(),
                actor,
                time.now(),
            ));
        }

        let schedule = Schedule::generate(
            new_principal,
            policy,
            request.effective_date,
            snapshot.max_installment_number() + 1,
            snapshot.max_schedule_version() + 1,
        )?;

        let installment_updates: Vec<Installment> = retired
            .iter()
            .map(|original| {
                let mut row = (*original).clone();
                row.status = InstallmentStatus::Skipped;
                row.skipped_reason = Some(RESTRUCTURED_REASON.to_string());
                row
            })
            .collect();

        let new_installments: Vec<Installment> = schedule
            .installments
            .iter()
            .map(|draft| Installment::from_draft(loan_id, draft, None))
            .collect();

        let mut loan = snapshot.loan.clone();
        loan.installment_amount = schedule.installment_amount;
        loan.duration_months = schedule.duration_months;

        events.push(LoanEvent::new(
            loan_id,
            LoanEventKind::Restructure {
                top_up: top_up_delta,
                installment_amount: schedule.installment_amount,
                duration_months: schedule.duration_months,
            },
            request.effective_date,
            request.notes,
            actor,
            time.now(),
        ));

        self.store.commit(
            snapshot.version,
            LoanMutation {
                loan,
                installment_updates,
                new_installments,
                events,
            },
        )?;

        info!(
            %loan_id,
            new_principal = %new_principal,
            installment_amount = %schedule.installment_amount,
            duration_months = schedule.duration_months,
            "loan restructured"
        );

        Ok(RestructureOutcome {
            new_principal,
            installment_amount: schedule.installment_amount,
            duration_months: schedule.duration_months,
        })
    }

    /// entry point for the payroll/manual-payment collaborator: settle one
    /// due installment. Closes the loan when no due installments remain.
    pub fn record_payment(
        &self,
        loan_id: LoanId,
        installment_id: InstallmentId,
        method: PaymentMethod,
        paid_at: DateTime<Utc>,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<Installment> {
        let snapshot = self.store.snapshot(loan_id)?;
        Self::ensure_active(&snapshot.loan)?;
        let target = snapshot
            .installment(installment_id)
            .ok_or(LoanError::InstallmentNotFound {
                loan_id,
                installment_id,
            })?;
        if !target.is_due() {
            return Err(LoanError::InstallmentNotPayable {
                installment_id,
                status: target.status,
            });
        }

        let mut paid = target.clone();
        paid.status = InstallmentStatus::Paid;
        paid.paid_at = Some(paid_at);
        paid.paid_method = Some(method);

        let mut loan = snapshot.loan.clone();
        let remaining_due = snapshot
            .installments
            .iter()
            .filter(|i| i.is_due() && i.id != installment_id)
            .count();
        if remaining_due == 0 && loan.status.can_transition(LoanStatus::Closed) {
            loan.status = LoanStatus::Closed;
        }

        let event = LoanEvent::new(
            loan_id,
            LoanEventKind::Payment {
                installment_id,
                amount: target.amount,
                method,
            },
            paid_at.date_naive(),
            None,
            actor,
            time.now(),
        );

        self.store.commit(
            snapshot.version,
            LoanMutation {
                loan: loan.clone(),
                installment_updates: vec![paid.clone()],
                new_installments: Vec::new(),
                events: vec![event],
            },
        )?;

        info!(
            %loan_id,
            installment = %installment_id,
            amount = %paid.amount,
            ?method,
            closed = (loan.status == LoanStatus::Closed),
            "installment paid"
        );

        Ok(paid)
    }

    /// append a free-text note event to the loan's audit log
    pub fn add_note(
        &self,
        loan_id: LoanId,
        text: &str,
        actor: &str,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        let snapshot = self.store.snapshot(loan_id)?;
        let event = LoanEvent::new(
            loan_id,
            LoanEventKind::Note,
            time.now().date_naive(),
            Some(text.to_string()),
            actor,
            time.now(),
        );
        self.store.commit(
            snapshot.version,
            LoanMutation {
                loan: snapshot.loan.clone(),
                installment_updates: Vec::new(),
                new_installments: Vec::new(),
                events: vec![event],
            },
        )
    }

    /// versioned read of a loan's full ledger state
    pub fn snapshot(&self, loan_id: LoanId) -> Result<LoanSnapshot> {
        self.store.snapshot(loan_id)
    }
}
