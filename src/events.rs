use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::ledger::JournalEntryType;
use crate::types::{LoanId, LoanStatus, WaiverComponent};

/// all events that can be emitted by the loan engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    LoanBooked {
        loan_id: LoanId,
        principal: Money,
        total_interest: Money,
        term: u32,
        disbursement_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    LoanImported {
        loan_id: LoanId,
        principal: Money,
        total_paid: Money,
        total_outstanding: Money,
        timestamp: DateTime<Utc>,
    },
    LoanClosed {
        loan_id: LoanId,
        closed_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    LoanWrittenOff {
        loan_id: LoanId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // payment events
    RepaymentApplied {
        loan_id: LoanId,
        amount: Money,
        applied_to_penalty: Money,
        applied_to_interest: Money,
        applied_to_principal: Money,
        unallocated: Money,
        lines_touched: usize,
        timestamp: DateTime<Utc>,
    },
    PenaltyAssessed {
        loan_id: LoanId,
        installment: u32,
        amount: Money,
        days_overdue: i64,
        timestamp: DateTime<Utc>,
    },

    // modification events
    LoanRestructured {
        loan_id: LoanId,
        old_term: u32,
        new_term: u32,
        old_rate: Rate,
        new_rate: Rate,
        new_total_outstanding: Money,
        timestamp: DateTime<Utc>,
    },
    WaiverApplied {
        loan_id: LoanId,
        component: WaiverComponent,
        amount: Money,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // ledger events
    JournalPosted {
        loan_id: LoanId,
        entry_id: Uuid,
        entry_type: JournalEntryType,
        reference: String,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    LedgerPostingFailed {
        loan_id: LoanId,
        entry_type: JournalEntryType,
        reference: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    AccountProvisioned {
        code: String,
        name: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// loan the event concerns, if any
    pub fn loan_id(&self) -> Option<LoanId> {
        match self {
            Event::LoanBooked { loan_id, .. }
            | Event::LoanImported { loan_id, .. }
            | Event::LoanClosed { loan_id, .. }
            | Event::LoanWrittenOff { loan_id, .. }
            | Event::StatusChanged { loan_id, .. }
            | Event::RepaymentApplied { loan_id, .. }
            | Event::PenaltyAssessed { loan_id, .. }
            | Event::LoanRestructured { loan_id, .. }
            | Event::WaiverApplied { loan_id, .. }
            | Event::JournalPosted { loan_id, .. }
            | Event::LedgerPostingFailed { loan_id, .. } => Some(*loan_id),
            Event::AccountProvisioned { .. } => None,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }
}
