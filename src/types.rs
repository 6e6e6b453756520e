use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};

/// unique identifier for a loan
pub type LoanId = Uuid;

/// loan account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// disbursed and performing
    Active,
    /// fully repaid
    Closed,
    /// at least one installment past due
    Overdue,
    /// past due beyond the default threshold
    Defaulted,
    /// balance removed from the books
    WrittenOff,
}

impl LoanStatus {
    /// closed and written-off loans accept no further money movement
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Closed | LoanStatus::WrittenOff)
    }

    pub fn is_in_arrears(&self) -> bool {
        matches!(self, LoanStatus::Overdue | LoanStatus::Defaulted)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Closed => "CLOSED",
            LoanStatus::Overdue => "OVERDUE",
            LoanStatus::Defaulted => "DEFAULTED",
            LoanStatus::WrittenOff => "WRITTEN_OFF",
        };
        f.write_str(s)
    }
}

/// schedule line status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Pending,
    Current,
    Partial,
    Paid,
    Overdue,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScheduleStatus::Pending => "PENDING",
            ScheduleStatus::Current => "CURRENT",
            ScheduleStatus::Partial => "PARTIAL",
            ScheduleStatus::Paid => "PAID",
            ScheduleStatus::Overdue => "OVERDUE",
        };
        f.write_str(s)
    }
}

/// interest convention used to build a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestStrategy {
    FlatRate,
    Simple,
    AddOn,
    ReducingBalance,
    DecliningBalance,
    CompoundInterest,
}

/// length of one repayment period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodUnit {
    Month,
    Week,
}

impl PeriodUnit {
    pub fn periods_per_year(&self) -> u32 {
        match self {
            PeriodUnit::Month => 12,
            PeriodUnit::Week => 52,
        }
    }
}

/// channel the money moved through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Bank,
    MobileMoney,
}

/// outstanding component a waiver applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaiverComponent {
    Interest,
    Penalty,
    Principal,
    Full,
}

impl fmt::Display for WaiverComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaiverComponent::Interest => "interest",
            WaiverComponent::Penalty => "penalty",
            WaiverComponent::Principal => "principal",
            WaiverComponent::Full => "full",
        };
        f.write_str(s)
    }
}

/// loan terms a schedule is generated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    /// rate per period as a fraction (0.02 for 2%)
    pub rate: Rate,
    pub term: u32,
    pub period_unit: PeriodUnit,
    pub strategy: InterestStrategy,
}

impl LoanTerms {
    pub fn monthly(principal: Money, rate: Rate, term: u32, strategy: InterestStrategy) -> Self {
        Self {
            principal,
            rate,
            term,
            period_unit: PeriodUnit::Month,
            strategy,
        }
    }

    pub fn weekly(principal: Money, rate: Rate, term: u32, strategy: InterestStrategy) -> Self {
        Self {
            principal,
            rate,
            term,
            period_unit: PeriodUnit::Week,
            strategy,
        }
    }

    /// reject inputs the interest engine cannot price
    pub fn validate(&self) -> Result<()> {
        if self.term < 1 {
            return Err(LoanError::InvalidTerm { term: self.term });
        }
        if !self.principal.is_positive() {
            return Err(LoanError::invalid_amount("principal", self.principal));
        }
        if self.rate.is_negative() {
            return Err(LoanError::invalid_amount("rate", self.rate.as_decimal()));
        }
        Ok(())
    }
}
