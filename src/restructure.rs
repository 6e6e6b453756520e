use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::interest::InterestEngine;
use crate::loan::LoanAccount;
use crate::schedule::{ScheduleBuilder, ScheduleLine};
use crate::types::LoanStatus;

/// requested change to a loan's terms; rates are annual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestructureChange {
    ExtendTerm { new_term: u32 },
    ChangeRate { annual_rate: Rate },
    ReduceInstallment { target: Money },
    Terms { new_term: u32, annual_rate: Rate },
}

/// recomputed figures and the replacement schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestructurePlan {
    pub old_term: u32,
    pub new_term: u32,
    pub old_rate: Rate,
    /// periodic rate after the change
    pub new_rate: Rate,
    pub outstanding_principal: Money,
    pub new_interest: Money,
    /// `new_interest` less the interest the account still owed
    pub interest_adjustment: Money,
    pub carried_penalty: Money,
    pub new_total_outstanding: Money,
    pub installment: Money,
    /// unpaid lines this plan replaces
    pub discarded_lines: usize,
    pub new_lines: Vec<ScheduleLine>,
}

/// recomputes outstanding balances under new terms
#[derive(Debug, Clone, Copy)]
pub struct RestructureEngine {
    max_term: u32,
}

impl RestructureEngine {
    pub fn new(max_term: u32) -> Self {
        Self { max_term }
    }

    /// plan a restructure of `loan` against its current `lines`
    pub fn plan(
        &self,
        loan: &LoanAccount,
        lines: &[ScheduleLine],
        change: RestructureChange,
        today: NaiveDate,
    ) -> Result<RestructurePlan> {
        if loan.status != LoanStatus::Active {
            return Err(LoanError::invalid_transition(loan.status, "restructure"));
        }

        let periods_per_year = loan.terms.period_unit.periods_per_year();
        let current_annual = Rate::from_decimal(loan.rate.as_decimal() * Decimal::from(periods_per_year));
        let unpaid = lines.iter().filter(|l| !l.is_paid()).count() as u32;

        let (new_term, annual_rate) = match change {
            RestructureChange::ExtendTerm { new_term } => {
                self.check_term(loan, new_term)?;
                (new_term, current_annual)
            }
            RestructureChange::ChangeRate { annual_rate } => {
                check_rate(annual_rate)?;
                (unpaid.max(1), annual_rate)
            }
            RestructureChange::Terms { new_term, annual_rate } => {
                self.check_term(loan, new_term)?;
                check_rate(annual_rate)?;
                (new_term, annual_rate)
            }
            RestructureChange::ReduceInstallment { target } => {
                (self.term_for_target(loan, current_annual, target)?, current_annual)
            }
        };

        let principal = loan.outstanding_principal;
        let carried_penalty = loan.outstanding_penalty;
        let new_interest = restructured_interest(principal, annual_rate, new_term, periods_per_year)?;

        let template = InterestEngine::spread(principal, new_interest, new_term)?;
        let first_installment = lines
            .iter()
            .filter(|l| l.is_paid())
            .map(|l| l.installment)
            .max()
            .unwrap_or(0)
            + 1;

        let builder = ScheduleBuilder::new(loan.terms.period_unit);
        let mut new_lines = builder.build_from(loan.id, &template, today, today, first_installment)?;
        if let Some(first) = new_lines.first_mut() {
            first.add_penalty(carried_penalty);
        }

        Ok(RestructurePlan {
            old_term: loan.term,
            new_term,
            old_rate: loan.rate,
            new_rate: Rate::from_decimal(annual_rate.as_decimal() / Decimal::from(periods_per_year)),
            outstanding_principal: principal,
            new_interest,
            interest_adjustment: new_interest - loan.outstanding_interest,
            carried_penalty,
            new_total_outstanding: principal + new_interest + carried_penalty,
            installment: template.installment,
            discarded_lines: unpaid as usize,
            new_lines,
        })
    }

    /// move the loan's figures onto the plan
    pub fn apply(&self, loan: &mut LoanAccount, plan: &RestructurePlan, now: DateTime<Utc>) {
        loan.term = plan.new_term;
        loan.rate = plan.new_rate;
        loan.terms.term = plan.new_term;
        loan.terms.rate = plan.new_rate;
        loan.outstanding_principal = plan.outstanding_principal;
        loan.outstanding_interest = plan.new_interest;
        loan.outstanding_penalty = plan.carried_penalty;
        loan.recompute_total();
        loan.restructure_count += 1;
        loan.updated_at = now;
    }

    fn check_term(&self, loan: &LoanAccount, new_term: u32) -> Result<()> {
        if new_term <= loan.term || new_term > self.max_term {
            return Err(LoanError::InvalidTerm { term: new_term });
        }
        Ok(())
    }

    /// shortest term past the current one whose installment fits `target`
    fn term_for_target(&self, loan: &LoanAccount, annual_rate: Rate, target: Money) -> Result<u32> {
        if !target.is_positive() {
            return Err(LoanError::invalid_amount("target_installment", target));
        }
        let periods_per_year = loan.terms.period_unit.periods_per_year();

        for n in loan.term + 1..=self.max_term {
            let interest = restructured_interest(loan.outstanding_principal, annual_rate, n, periods_per_year)?;
            let total = loan.outstanding_principal + interest + loan.outstanding_penalty;
            if total.split_even(n).first().map_or(false, |share| *share <= target) {
                return Ok(n);
            }
        }
        Err(LoanError::invalid_amount("target_installment", target))
    }
}

/// principal x annual rate x (term / periods per year)
pub fn restructured_interest(
    principal: Money,
    annual_rate: Rate,
    term: u32,
    periods_per_year: u32,
) -> Result<Money> {
    let interest = principal
        .as_decimal()
        .checked_mul(annual_rate.as_decimal())
        .and_then(|d| d.checked_mul(Decimal::from(term)))
        .ok_or_else(|| LoanError::invalid_amount("rate", annual_rate.as_decimal()))?;
    Ok(Money::from_decimal(interest / Decimal::from(periods_per_year)))
}

fn check_rate(rate: Rate) -> Result<()> {
    if rate.is_zero() || rate.is_negative() {
        return Err(LoanError::invalid_amount("rate", rate.as_decimal()));
    }
    Ok(())
}
