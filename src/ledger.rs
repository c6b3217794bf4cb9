use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::LoanEvent;
use crate::schedule::InstallmentDraft;
use crate::types::{InstallmentId, InstallmentStatus, LoanId, LoanStatus, PaymentMethod};

/// one employee's borrowing arrangement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub employee_id: String,
    /// original principal; never rewritten, top-ups live in the event log
    pub principal: Money,
    /// currently-effective per-period amount
    pub installment_amount: Money,
    /// currently-effective duration in months
    pub duration_months: u32,
    pub start_date: NaiveDate,
    pub status: LoanStatus,
    pub deduct_from_payroll: bool,
    pub notes: Option<String>,
}

/// one scheduled payment within a loan's schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub loan_id: LoanId,
    /// position within its schedule version; strictly increasing across the
    /// loan's whole history, never reused
    pub number: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_method: Option<PaymentMethod>,
    pub skipped_reason: Option<String>,
    /// backward pointer to the skipped installment this one replaced
    pub rescheduled_from: Option<InstallmentId>,
    pub schedule_version: u32,
}

impl Installment {
    /// materialize a generator draft as a due installment row
    pub fn from_draft(
        loan_id: LoanId,
        draft: &InstallmentDraft,
        rescheduled_from: Option<InstallmentId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            number: draft.number,
            amount: draft.amount,
            due_date: draft.due_date,
            status: InstallmentStatus::Due,
            paid_at: None,
            paid_method: None,
            skipped_reason: None,
            rescheduled_from,
            schedule_version: draft.schedule_version,
        }
    }

    pub fn is_due(&self) -> bool {
        self.status == InstallmentStatus::Due
    }

    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }
}

/// versioned point-in-time read model of one loan's ledger state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanSnapshot {
    /// optimistic-lock version; passed back on commit
    pub version: u64,
    pub loan: Loan,
    /// ordered by installment number
    pub installments: Vec<Installment>,
    /// append order (chronological)
    pub events: Vec<LoanEvent>,
}

impl LoanSnapshot {
    pub fn installment(&self, id: InstallmentId) -> Option<&Installment> {
        self.installments.iter().find(|i| i.id == id)
    }

    /// query surface: installments filtered by status
    pub fn installments_with_status(&self, status: InstallmentStatus) -> Vec<&Installment> {
        self.installments
            .iter()
            .filter(|i| i.status == status)
            .collect()
    }

    /// query surface: event history, most recent first
    pub fn events_desc(&self) -> Vec<&LoanEvent> {
        self.events.iter().rev().collect()
    }

    /// highest installment number across all schedule versions
    pub fn max_installment_number(&self) -> u32 {
        self.installments.iter().map(|i| i.number).max().unwrap_or(0)
    }

    /// highest schedule version seen on this loan
    pub fn max_schedule_version(&self) -> u32 {
        self.installments
            .iter()
            .map(|i| i.schedule_version)
            .max()
            .unwrap_or(0)
    }

    /// latest due date among installments still due
    pub fn tail_due_date(&self) -> Option<NaiveDate> {
        self.installments
            .iter()
            .filter(|i| i.is_due())
            .map(|i| i.due_date)
            .max()
    }
}

/// atomic write set for one loan: replace the loan row, update existing
/// installments in place, insert new installments, append events.
/// Installments are never deleted and events are never rewritten.
#[derive(Debug, Clone)]
pub struct LoanMutation {
    pub loan: Loan,
    pub installment_updates: Vec<Installment>,
    pub new_installments: Vec<Installment>,
    pub events: Vec<LoanEvent>,
}

/// typed repository over the loan ledger.
///
/// Mutations on the same loan are serialized by the optimistic version
/// check: `commit` with a stale `expected_version` fails with
/// `ConcurrentModification` and the caller retries from a fresh snapshot.
/// Reads never block writers. A commit is all-or-nothing.
pub trait LedgerStore: Send + Sync {
    /// persist a newly originated loan with its initial schedule and events
    fn insert_loan(
        &self,
        loan: Loan,
        installments: Vec<Installment>,
        events: Vec<LoanEvent>,
    ) -> Result<()>;

    /// versioned read of one loan's full ledger state
    fn snapshot(&self, loan_id: LoanId) -> Result<LoanSnapshot>;

    /// apply a mutation atomically if the version still matches
    fn commit(&self, expected_version: u64, mutation: LoanMutation) -> Result<()>;

    /// all loans for one employee (query surface)
    fn loans_for_employee(&self, employee_id: &str) -> Result<Vec<Loan>>;
}

struct LoanRecord {
    version: u64,
    loan: Loan,
    installments: Vec<Installment>,
    events: Vec<LoanEvent>,
}

/// in-memory ledger store. Each loan's record sits behind its own lock, so
/// mutations on different loans proceed in parallel.
#[derive(Default)]
pub struct MemoryLedger {
    records: RwLock<HashMap<LoanId, Mutex<LoanRecord>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn storage_err(context: &str) -> LoanError {
    LoanError::Storage {
        message: format!("lock poisoned: {context}"),
    }
}

impl LedgerStore for MemoryLedger {
    fn insert_loan(
        &self,
        loan: Loan,
        installments: Vec<Installment>,
        events: Vec<LoanEvent>,
    ) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| storage_err("ledger map"))?;

        records.insert(
            loan.id,
            Mutex::new(LoanRecord {
                version: 1,
                loan,
                installments,
                events,
            }),
        );
        Ok(())
    }

    fn snapshot(&self, loan_id: LoanId) -> Result<LoanSnapshot> {
        let records = self.records.read().map_err(|_| storage_err("ledger map"))?;
        let record = records
            .get(&loan_id)
            .ok_or(LoanError::LoanNotFound { loan_id })?
            .lock()
            .map_err(|_| storage_err("loan record"))?;

        Ok(LoanSnapshot {
            version: record.version,
            loan: record.loan.clone(),
            installments: record.installments.clone(),
            events: record.events.clone(),
        })
    }

    fn commit(&self, expected_version: u64, mutation: LoanMutation) -> Result<()> {
        let loan_id = mutation.loan.id;
        let records = self.records.read().map_err(|_| storage_err("ledger map"))?;
        let mut record = records
            .get(&loan_id)
            .ok_or(LoanError::LoanNotFound { loan_id })?
            .lock()
            .map_err(|_| storage_err("loan record"))?;

        if record.version != expected_version {
            return Err(LoanError::ConcurrentModification {
                loan_id,
                expected: expected_version,
                actual: record.version,
            });
        }

        // validate the whole write set before touching anything, so a
        // failed commit leaves the record unchanged
        for update in &mutation.installment_updates {
            if !record.installments.iter().any(|i| i.id == update.id) {
                return Err(LoanError::InstallmentNotFound {
                    loan_id,
                    installment_id: update.id,
                });
            }
        }

        record.loan = mutation.loan;
        for update in mutation.installment_updates {
            if let Some(existing) = record.installments.iter_mut().find(|i| i.id == update.id) {
                *existing = update;
            }
        }
        record.installments.extend(mutation.new_installments);
        record.installments.sort_by_key(|i| i.number);
        record.events.extend(mutation.events);
        record.version += 1;

        Ok(())
    }

    fn loans_for_employee(&self, employee_id: &str) -> Result<Vec<Loan>> {
        let records = self.records.read().map_err(|_| storage_err("ledger map"))?;
        let mut loans = Vec::new();
        for record in records.values() {
            let record = record.lock().map_err(|_| storage_err("loan record"))?;
            if record.loan.employee_id == employee_id {
                loans.push(record.loan.clone());
            }
        }
        loans.sort_by_key(|l| l.start_date);
        Ok(loans)
    }
}
