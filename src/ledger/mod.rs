pub mod accounts;
pub mod poster;
pub mod reconciliation;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::types::LoanId;

pub use accounts::{resolve_or_provision, Account, AccountType, ChartOfAccounts};
pub use poster::{LedgerEvent, LedgerPoster, PostingRequest};
pub use reconciliation::{FailedPosting, ReconciliationQueue};

/// side of a journal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "DEBIT",
            Self::Credit => "CREDIT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// business event a journal entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalEntryType {
    Disbursement,
    Repayment,
    WriteOff,
    Waiver,
    RestructureMemo,
}

impl JournalEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disbursement => "DISBURSEMENT",
            Self::Repayment => "REPAYMENT",
            Self::WriteOff => "WRITE_OFF",
            Self::Waiver => "WAIVER",
            Self::RestructureMemo => "RESTRUCTURE_MEMO",
        }
    }
}

impl fmt::Display for JournalEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Draft,
    Posted,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Draft => f.write_str("DRAFT"),
            EntryStatus::Posted => f.write_str("POSTED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_code: String,
    pub direction: Direction,
    pub amount: Money,
    pub description: String,
}

impl JournalLine {
    pub fn debit(account_code: &str, amount: Money, description: impl Into<String>) -> Self {
        Self {
            account_code: account_code.to_string(),
            direction: Direction::Debit,
            amount,
            description: description.into(),
        }
    }

    pub fn credit(account_code: &str, amount: Money, description: impl Into<String>) -> Self {
        Self {
            account_code: account_code.to_string(),
            direction: Direction::Credit,
            amount,
            description: description.into(),
        }
    }

    /// positive for debit, negative for credit
    pub fn signed_amount(&self) -> Money {
        match self.direction {
            Direction::Debit => self.amount,
            Direction::Credit => Money::ZERO - self.amount,
        }
    }
}

/// double-entry record of one business event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub loan_id: LoanId,
    pub entry_date: NaiveDate,
    pub entry_type: JournalEntryType,
    pub reference: String,
    pub description: String,
    pub lines: Vec<JournalLine>,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub posted_by: Option<String>,
}

impl JournalEntry {
    pub fn new(
        loan_id: LoanId,
        entry_date: NaiveDate,
        entry_type: JournalEntryType,
        reference: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            entry_date,
            entry_type,
            reference: reference.into(),
            description: description.into(),
            lines: Vec::new(),
            status: EntryStatus::Draft,
            created_at,
            posted_at: None,
            posted_by: None,
        }
    }

    /// append a line; zero-amount lines are dropped
    pub fn push(&mut self, line: JournalLine) {
        if !line.amount.is_zero() {
            self.lines.push(line);
        }
    }

    pub fn total_debits(&self) -> Money {
        self.lines
            .iter()
            .filter(|l| l.direction == Direction::Debit)
            .map(|l| l.amount)
            .sum()
    }

    pub fn total_credits(&self) -> Money {
        self.lines
            .iter()
            .filter(|l| l.direction == Direction::Credit)
            .map(|l| l.amount)
            .sum()
    }

    /// total debits, which equals the total credits of a valid entry
    pub fn amount(&self) -> Money {
        self.total_debits()
    }

    pub fn is_posted(&self) -> bool {
        self.status == EntryStatus::Posted
    }

    /// at least two lines, no negative amounts, debits equal credits
    pub fn validate_balance(&self) -> Result<()> {
        let debits = self.total_debits();
        let credits = self.total_credits();

        if let Some(line) = self.lines.iter().find(|l| l.amount.is_negative()) {
            return Err(LoanError::invalid_amount(&line.account_code, line.amount));
        }
        if self.lines.len() < 2 || debits != credits || debits.is_zero() {
            return Err(LoanError::LedgerImbalance { debits, credits });
        }
        Ok(())
    }

    /// one-way DRAFT -> POSTED
    pub fn post(&mut self, actor: &str, at: DateTime<Utc>) -> Result<()> {
        if self.is_posted() {
            return Err(LoanError::invalid_transition(self.status, "post"));
        }
        self.validate_balance()?;
        self.status = EntryStatus::Posted;
        self.posted_at = Some(at);
        self.posted_by = Some(actor.to_string());
        Ok(())
    }
}
