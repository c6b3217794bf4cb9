use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dates::add_months;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::types::RepaymentPolicy;

/// one not-yet-persisted installment produced by the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentDraft {
    pub number: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub schedule_version: u32,
}

/// a generated amortization schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub principal: Money,
    /// per-period amount (every installment except possibly the last)
    pub installment_amount: Money,
    pub duration_months: u32,
    pub installments: Vec<InstallmentDraft>,
}

impl Schedule {
    /// generate an ordered installment list for a principal and repayment
    /// policy. Pure computation, no I/O.
    ///
    /// Due dates are `start_date + k` calendar months (month-end clamped).
    /// Every installment except the last carries the per-period amount; the
    /// last absorbs the rounding remainder so the schedule sums exactly to
    /// the principal.
    pub fn generate(
        principal: Money,
        policy: RepaymentPolicy,
        start_date: NaiveDate,
        first_number: u32,
        schedule_version: u32,
    ) -> Result<Self> {
        if !principal.is_positive() {
            return Err(LoanError::InvalidPrincipal { amount: principal });
        }

        let (per_period, duration) = match policy {
            RepaymentPolicy::FixedDuration { months } => {
                if months == 0 {
                    return Err(LoanError::InvalidPolicy {
                        message: "duration must be at least one month".to_string(),
                    });
                }
                (principal.div_periods_floor(months), months)
            }
            RepaymentPolicy::FixedAmount { amount } => {
                if !amount.is_positive() {
                    return Err(LoanError::InvalidPolicy {
                        message: format!("installment amount must be positive, got {amount}"),
                    });
                }
                let periods = principal.periods_to_cover(amount).ok_or_else(|| {
                    LoanError::InvalidPolicy {
                        message: format!(
                            "installment amount {amount} against principal {principal} \
                             needs more periods than a schedule can hold"
                        ),
                    }
                })?;
                (amount, periods)
            }
        };

        let mut installments = Vec::with_capacity(duration as usize);
        for k in 0..duration {
            let is_last = k == duration - 1;
            let amount = if is_last {
                // rounding closure: the tail absorbs whatever the uniform
                // per-period amount left over
                principal - per_period * Decimal::from(duration - 1)
            } else {
                per_period
            };

            installments.push(InstallmentDraft {
                number: first_number + k,
                amount,
                due_date: add_months(start_date, k),
                schedule_version,
            });
        }

        Ok(Self {
            principal,
            installment_amount: per_period,
            duration_months: duration,
            installments,
        })
    }

    /// sum of all installment amounts; always equals the principal
    pub fn total(&self) -> Money {
        self.installments.iter().map(|i| i.amount).sum()
    }
}
