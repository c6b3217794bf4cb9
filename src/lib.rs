pub mod balance;
pub mod dates;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod schedule;
pub mod service;
pub mod types;

// re-export key types
pub use balance::{summarize, LoanSummary};
pub use decimal::Money;
pub use errors::{LoanError, Result};
pub use events::{LoanEvent, LoanEventKind};
pub use ledger::{Installment, LedgerStore, Loan, LoanMutation, LoanSnapshot, MemoryLedger};
pub use schedule::{InstallmentDraft, Schedule};
pub use service::{LoanService, OriginateRequest, RestructureOutcome, RestructureRequest};
pub use types::{
    EventId, InstallmentId, InstallmentStatus, LoanId, LoanStatus, PaymentMethod, RepaymentPolicy,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
