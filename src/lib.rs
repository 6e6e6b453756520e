pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod interest;
pub mod ledger;
pub mod loan;
pub mod payments;
pub mod restructure;
pub mod schedule;
pub mod serialization;
pub mod service;
pub mod store;
pub mod types;
pub mod waiver;

// re-export key types
pub use config::{AccountMap, AccountRole, EngineConfig, InterestRecognition, WaiverSchedulePolicy};
pub use decimal::{Money, Rate};
pub use errors::{LoanError, Result};
pub use events::{Event, EventStore};
pub use interest::{AmortizationLine, AmortizationResult, InterestEngine, PenaltyEngine, PenaltyPolicy};
pub use ledger::{
    Account, AccountType, ChartOfAccounts, Direction, EntryStatus, JournalEntry, JournalEntryType,
    JournalLine, LedgerEvent, LedgerPoster, PostingRequest, ReconciliationQueue,
};
pub use loan::{ComponentSplit, LoanAccount};
pub use payments::{AllocationResult, LineAllocation, PaymentAllocator};
pub use restructure::{RestructureChange, RestructureEngine, RestructurePlan};
pub use schedule::{ScheduleBuilder, ScheduleLine};
pub use serialization::LoanStatement;
pub use service::{
    BookLoanRequest, BookedLoan, ImportLoanRequest, LoanService, PostingStatus, RepaymentOutcome,
    RepaymentRequest, RestructureOutcome, RetryReport, SweepReport, WaiverResult,
};
pub use store::{InMemoryStore, JournalRepository, LoanLocks, LoanRepository, ScheduleRepository};
pub use types::{
    InterestStrategy, LoanId, LoanStatus, LoanTerms, PaymentMethod, PeriodUnit, ScheduleStatus,
    WaiverComponent,
};
pub use waiver::{WaiverEngine, WaiverOutcome};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
