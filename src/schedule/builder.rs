use chrono::{Days, Months, NaiveDate};

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::interest::AmortizationResult;
use crate::types::{LoanId, PeriodUnit};

use super::ScheduleLine;

/// anchors an amortization template to calendar dates
#[derive(Debug, Clone, Copy)]
pub struct ScheduleBuilder {
    period_unit: PeriodUnit,
}

impl ScheduleBuilder {
    pub fn new(period_unit: PeriodUnit) -> Self {
        Self { period_unit }
    }

    /// anchor + `periods` periods; month arithmetic clamps to month end
    pub fn due_date(&self, anchor: NaiveDate, periods: u32) -> Result<NaiveDate> {
        let due = match self.period_unit {
            PeriodUnit::Month => anchor.checked_add_months(Months::new(periods)),
            PeriodUnit::Week => anchor.checked_add_days(Days::new(7 * periods as u64)),
        };
        due.ok_or(LoanError::InvalidConfiguration {
            message: format!("due date out of range: {} + {} periods", anchor, periods),
        })
    }

    /// lines numbered 1..n, due one period apart after `anchor`
    pub fn build(
        &self,
        loan_id: LoanId,
        template: &AmortizationResult,
        anchor: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<ScheduleLine>> {
        self.build_from(loan_id, template, anchor, today, 1)
    }

    /// like [`build`](Self::build) but numbering starts at `first_installment`
    pub fn build_from(
        &self,
        loan_id: LoanId,
        template: &AmortizationResult,
        anchor: NaiveDate,
        today: NaiveDate,
        first_installment: u32,
    ) -> Result<Vec<ScheduleLine>> {
        if template.lines.is_empty() {
            return Err(LoanError::ScheduleNotFound { loan_id });
        }

        template
            .lines
            .iter()
            .enumerate()
            .map(|(idx, tl)| {
                let due_date = self.due_date(anchor, idx as u32 + 1)?;
                Ok(ScheduleLine::new(
                    loan_id,
                    first_installment + idx as u32,
                    due_date,
                    tl.principal,
                    tl.interest,
                    today,
                ))
            })
            .collect()
    }

    /// rebuild a backdated schedule, distributing `total_paid` oldest-first
    pub fn build_with_history(
        &self,
        loan_id: LoanId,
        template: &AmortizationResult,
        anchor: NaiveDate,
        today: NaiveDate,
        total_paid: Money,
    ) -> Result<Vec<ScheduleLine>> {
        if total_paid.is_negative() || total_paid > template.total_amount {
            return Err(LoanError::invalid_amount("total_paid", total_paid));
        }

        let mut lines = self.build(loan_id, template, anchor, today)?;
        let mut remaining = total_paid;

        for line in lines.iter_mut() {
            if !remaining.is_positive() {
                break;
            }
            let take = remaining.min(line.outstanding_total);
            let interest = take.min(line.outstanding_interest);
            let principal = take - interest;

            line.apply(Money::ZERO, interest, principal, line.due_date.min(today), today);
            remaining -= take;
        }

        Ok(lines)
    }
}
