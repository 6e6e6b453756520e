use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{LoanId, ScheduleStatus};

/// persisted repayment schedule line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleLine {
    pub id: Uuid,
    pub loan_id: LoanId,
    pub installment: u32,
    pub due_date: NaiveDate,

    pub principal_due: Money,
    pub interest_due: Money,
    pub total_due: Money,

    pub principal_paid: Money,
    pub interest_paid: Money,
    pub total_paid: Money,

    pub outstanding_principal: Money,
    pub outstanding_interest: Money,
    pub outstanding_total: Money,

    // penalties sit outside total_due
    pub penalty_due: Money,
    pub penalty_paid: Money,
    /// day the overdue sweep charged this line; it is charged at most once
    #[serde(default)]
    pub penalty_assessed_on: Option<NaiveDate>,

    pub status: ScheduleStatus,
    pub paid_date: Option<NaiveDate>,
}

impl ScheduleLine {
    pub fn new(
        loan_id: LoanId,
        installment: u32,
        due_date: NaiveDate,
        principal_due: Money,
        interest_due: Money,
        today: NaiveDate,
    ) -> Self {
        let total_due = principal_due + interest_due;
        Self {
            id: Uuid::new_v4(),
            loan_id,
            installment,
            due_date,
            principal_due,
            interest_due,
            total_due,
            principal_paid: Money::ZERO,
            interest_paid: Money::ZERO,
            total_paid: Money::ZERO,
            outstanding_principal: principal_due,
            outstanding_interest: interest_due,
            outstanding_total: total_due,
            penalty_due: Money::ZERO,
            penalty_paid: Money::ZERO,
            penalty_assessed_on: None,
            status: status_for_due_date(due_date, today),
            paid_date: None,
        }
    }

    pub fn outstanding_penalty(&self) -> Money {
        self.penalty_due - self.penalty_paid
    }

    /// everything still owed on this line, penalty included
    pub fn amount_owed(&self) -> Money {
        self.outstanding_total + self.outstanding_penalty()
    }

    pub fn is_paid(&self) -> bool {
        self.status == ScheduleStatus::Paid
    }

    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        !self.is_paid() && self.due_date < today
    }

    pub fn days_past_due(&self, today: NaiveDate) -> i64 {
        if self.is_past_due(today) {
            (today - self.due_date).num_days()
        } else {
            0
        }
    }

    /// record a payment split and move the line's status
    pub fn apply(
        &mut self,
        penalty: Money,
        interest: Money,
        principal: Money,
        paid_on: NaiveDate,
        today: NaiveDate,
    ) {
        self.penalty_paid += penalty;
        self.interest_paid += interest;
        self.principal_paid += principal;
        self.recompute();

        if self.amount_owed().is_zero() {
            self.status = ScheduleStatus::Paid;
            self.paid_date = Some(paid_on);
        } else {
            self.refresh_status(today);
        }
    }

    pub fn add_penalty(&mut self, amount: Money) {
        self.penalty_due += amount;
    }

    /// charge the late penalty and remember that it was charged
    pub fn assess_penalty(&mut self, amount: Money, today: NaiveDate) {
        self.add_penalty(amount);
        self.penalty_assessed_on = Some(today);
    }

    pub fn penalty_assessed(&self) -> bool {
        self.penalty_assessed_on.is_some()
    }

    /// derive totals and outstanding figures from the due/paid columns
    pub fn recompute(&mut self) {
        self.total_due = self.principal_due + self.interest_due;
        self.total_paid = self.principal_paid + self.interest_paid;
        self.outstanding_principal = self.principal_due - self.principal_paid;
        self.outstanding_interest = self.interest_due - self.interest_paid;
        self.outstanding_total = self.total_due - self.total_paid;
    }

    /// re-derive a non-paid line's status against `today`
    pub fn refresh_status(&mut self, today: NaiveDate) {
        if self.is_paid() {
            return;
        }
        let has_payments = self.total_paid.is_positive() || self.penalty_paid.is_positive();
        self.status = if self.due_date < today {
            ScheduleStatus::Overdue
        } else if has_payments {
            ScheduleStatus::Partial
        } else {
            status_for_due_date(self.due_date, today)
        };
    }

    pub fn invariants_hold(&self) -> bool {
        self.total_due == self.principal_due + self.interest_due
            && self.outstanding_total == self.total_due - self.total_paid
            && !self.outstanding_total.is_negative()
            && !self.outstanding_penalty().is_negative()
    }
}

/// initial status of an unpaid line
pub fn status_for_due_date(due_date: NaiveDate, today: NaiveDate) -> ScheduleStatus {
    if due_date < today {
        ScheduleStatus::Overdue
    } else if due_date == today {
        ScheduleStatus::Current
    } else {
        ScheduleStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn line(due: NaiveDate, today: NaiveDate) -> ScheduleLine {
        ScheduleLine::new(Uuid::new_v4(), 1, due, Money::from_major(600), Money::from_major(400), today)
    }

    #[test]
    fn test_initial_status_by_due_date() {
        let today = date(2024, 6, 15);
        assert_eq!(line(date(2024, 6, 14), today).status, ScheduleStatus::Overdue);
        assert_eq!(line(date(2024, 6, 15), today).status, ScheduleStatus::Current);
        assert_eq!(line(date(2024, 6, 16), today).status, ScheduleStatus::Pending);
    }

    #[test]
    fn test_partial_then_paid() {
        let today = date(2024, 6, 1);
        let mut l = line(date(2024, 7, 1), today);

        l.apply(Money::ZERO, Money::from_major(400), Money::from_major(100), today, today);
        assert_eq!(l.status, ScheduleStatus::Partial);
        assert_eq!(l.outstanding_total, Money::from_major(500));
        assert_eq!(l.outstanding_principal, Money::from_major(500));
        assert!(l.invariants_hold());

        l.apply(Money::ZERO, Money::ZERO, Money::from_major(500), today, today);
        assert_eq!(l.status, ScheduleStatus::Paid);
        assert_eq!(l.paid_date, Some(today));
        assert!(l.outstanding_total.is_zero());
        assert!(l.invariants_hold());
    }

    #[test]
    fn test_partial_on_past_due_line_stays_overdue() {
        let today = date(2024, 8, 1);
        let mut l = line(date(2024, 7, 1), today);
        l.apply(Money::ZERO, Money::from_major(100), Money::ZERO, today, today);
        assert_eq!(l.status, ScheduleStatus::Overdue);
        assert_eq!(l.days_past_due(today), 31);
    }

    #[test]
    fn test_penalty_is_owed_but_outside_total_due() {
        let today = date(2024, 8, 1);
        let mut l = line(date(2024, 7, 1), today);
        l.add_penalty(Money::from_major(50));
        assert_eq!(l.total_due, Money::from_major(1_000));
        assert_eq!(l.amount_owed(), Money::from_major(1_050));
        assert!(l.invariants_hold());
    }

    #[test]
    fn test_assessment_survives_a_zeroed_penalty() {
        let today = date(2024, 8, 1);
        let mut l = line(date(2024, 7, 1), today);
        assert!(!l.penalty_assessed());

        l.assess_penalty(Money::from_major(50), today);
        l.penalty_due = Money::ZERO;
        assert_eq!(l.penalty_assessed_on, Some(today));
        assert!(l.penalty_assessed());
    }
}
