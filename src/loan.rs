use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::payments::AllocationResult;
use crate::schedule::ScheduleLine;
use crate::types::{LoanId, LoanStatus, LoanTerms, PaymentMethod};

/// an amount split across the account's balance components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComponentSplit {
    pub penalty: Money,
    pub interest: Money,
    pub principal: Money,
    pub excess: Money,
}

impl ComponentSplit {
    pub fn applied(&self) -> Money {
        self.penalty + self.interest + self.principal
    }
}

/// loan account state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanAccount {
    // identification
    pub id: LoanId,
    pub reference: String,

    // terms the current schedule was generated from
    pub terms: LoanTerms,
    pub principal: Money,
    pub rate: Rate,
    pub term: u32,

    // running balances
    pub outstanding_principal: Money,
    pub outstanding_interest: Money,
    pub outstanding_penalty: Money,
    pub total_outstanding: Money,

    // lifetime tracking
    pub total_interest_scheduled: Money,
    pub total_principal_paid: Money,
    pub total_interest_paid: Money,
    pub total_penalty_paid: Money,
    pub total_waived: Money,
    pub restructure_count: u32,

    // dates
    pub disbursement_date: NaiveDate,
    pub closed_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub payment_method: PaymentMethod,
    pub status: LoanStatus,
}

impl LoanAccount {
    /// new active loan owing the full scheduled amount
    pub fn new(
        id: LoanId,
        reference: String,
        terms: LoanTerms,
        total_interest: Money,
        disbursement_date: NaiveDate,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        let mut loan = Self {
            id,
            reference,
            terms,
            principal: terms.principal,
            rate: terms.rate,
            term: terms.term,
            outstanding_principal: terms.principal,
            outstanding_interest: total_interest,
            outstanding_penalty: Money::ZERO,
            total_outstanding: Money::ZERO,
            total_interest_scheduled: total_interest,
            total_principal_paid: Money::ZERO,
            total_interest_paid: Money::ZERO,
            total_penalty_paid: Money::ZERO,
            total_waived: Money::ZERO,
            restructure_count: 0,
            disbursement_date,
            closed_date: None,
            created_at: now,
            updated_at: now,
            payment_method,
            status: LoanStatus::Active,
        };
        loan.recompute_total();
        loan
    }

    /// take outstanding figures from the schedule
    pub fn sync_from_schedule(&mut self, lines: &[ScheduleLine]) {
        self.outstanding_principal = lines.iter().map(|l| l.outstanding_principal).sum();
        self.outstanding_interest = lines.iter().map(|l| l.outstanding_interest).sum();
        self.outstanding_penalty = lines.iter().map(|l| l.outstanding_penalty()).sum();
        self.recompute_total();
    }

    pub fn recompute_total(&mut self) {
        self.total_outstanding =
            self.outstanding_principal + self.outstanding_interest + self.outstanding_penalty;
    }

    /// reject money movement on closed or written-off loans
    pub fn ensure_open(&self, attempted: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(LoanError::invalid_transition(self.status, attempted));
        }
        Ok(())
    }

    /// decrement balances by an allocation's split.
    ///
    /// A component the schedule pays beyond what the account still owes (after
    /// an advisory waiver) spills into the next component in waterfall order.
    /// Anything the account cannot absorb at all comes back as `excess`.
    pub fn apply_allocation(&mut self, allocation: &AllocationResult, now: DateTime<Utc>) -> ComponentSplit {
        let wants = [allocation.to_penalty, allocation.to_interest, allocation.to_principal];
        let capacity = [self.outstanding_penalty, self.outstanding_interest, self.outstanding_principal];
        let mut taken = [Money::ZERO; 3];

        let mut carry = Money::ZERO;
        for i in 0..3 {
            let want = wants[i] + carry;
            taken[i] = want.min(capacity[i]);
            carry = want - taken[i];
        }
        for i in 0..3 {
            if !carry.is_positive() {
                break;
            }
            let room = capacity[i] - taken[i];
            let extra = carry.min(room);
            taken[i] += extra;
            carry -= extra;
        }

        let split = ComponentSplit {
            penalty: taken[0],
            interest: taken[1],
            principal: taken[2],
            excess: carry,
        };

        self.outstanding_penalty -= split.penalty;
        self.outstanding_interest -= split.interest;
        self.outstanding_principal -= split.principal;

        self.total_penalty_paid += split.penalty;
        self.total_interest_paid += split.interest;
        self.total_principal_paid += split.principal;

        self.recompute_total();
        self.updated_at = now;
        split
    }

    pub fn is_settled(&self, tolerance: Money) -> bool {
        self.total_outstanding <= tolerance
    }

    /// move to CLOSED once the balance is within tolerance; returns true on transition
    pub fn close_if_settled(&mut self, tolerance: Money, today: NaiveDate) -> bool {
        if self.status.is_terminal() || !self.is_settled(tolerance) {
            return false;
        }
        self.status = LoanStatus::Closed;
        self.closed_date = Some(today);
        true
    }

    /// derive arrears status from the schedule; terminal loans never move.
    ///
    /// Returns the previous status when it changed.
    pub fn update_status(
        &mut self,
        lines: &[ScheduleLine],
        today: NaiveDate,
        default_after_days: u32,
    ) -> Option<LoanStatus> {
        if self.status.is_terminal() {
            return None;
        }

        let oldest_days = lines
            .iter()
            .map(|l| l.days_past_due(today))
            .max()
            .unwrap_or(0);

        let next = if oldest_days == 0 {
            LoanStatus::Active
        } else if oldest_days > default_after_days as i64 {
            LoanStatus::Defaulted
        } else {
            LoanStatus::Overdue
        };

        if next == self.status {
            return None;
        }
        let previous = self.status;
        self.status = next;
        Some(previous)
    }

    /// zero every balance; returns what each component held
    pub fn write_off(&mut self, now: DateTime<Utc>) -> ComponentSplit {
        let split = ComponentSplit {
            penalty: self.outstanding_penalty,
            interest: self.outstanding_interest,
            principal: self.outstanding_principal,
            excess: Money::ZERO,
        };
        self.total_waived += split.applied();
        self.outstanding_principal = Money::ZERO;
        self.outstanding_interest = Money::ZERO;
        self.outstanding_penalty = Money::ZERO;
        self.recompute_total();
        self.status = LoanStatus::WrittenOff;
        self.updated_at = now;
        split
    }

    pub fn invariants_hold(&self) -> bool {
        self.total_outstanding
            == self.outstanding_principal + self.outstanding_interest + self.outstanding_penalty
            && !self.outstanding_principal.is_negative()
            && !self.outstanding_interest.is_negative()
            && !self.outstanding_penalty.is_negative()
    }
}
