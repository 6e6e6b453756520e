//! Interest engine: pure amortization of loan terms into a per-period schedule.
//!
//! Every strategy is a plain function from `(principal, rate, term)` to an
//! [`AmortizationResult`]. Amounts are rounded to the cent and the final
//! installment absorbs rounding residue, so the lines always sum exactly to the
//! result's totals.

pub mod compound;
pub mod declining;
pub mod flat;
pub mod penalty;
pub mod reducing;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::types::{InterestStrategy, LoanTerms};

pub use penalty::{PenaltyEngine, PenaltyPolicy};

/// one period of an amortization template, not yet anchored to a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizationLine {
    pub installment: u32,
    pub opening_balance: Money,
    pub principal: Money,
    pub interest: Money,
    pub total: Money,
    pub closing_balance: Money,
}

/// totals plus per-period template consumed by the schedule builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizationResult {
    pub principal: Money,
    pub total_interest: Money,
    pub total_amount: Money,
    /// regular periodic installment (first period for declining schedules)
    pub installment: Money,
    pub lines: Vec<AmortizationLine>,
}

impl AmortizationResult {
    /// derive totals from the lines so they can never drift from the schedule
    pub(crate) fn from_lines(principal: Money, lines: Vec<AmortizationLine>) -> Self {
        let total_interest: Money = lines.iter().map(|l| l.interest).sum();
        let total_amount: Money = lines.iter().map(|l| l.total).sum();
        let installment = lines.first().map(|l| l.total).unwrap_or(Money::ZERO);

        Self {
            principal,
            total_interest,
            total_amount,
            installment,
            lines,
        }
    }

    pub fn term(&self) -> u32 {
        self.lines.len() as u32
    }
}

/// running-balance line builder shared by the strategies
pub(crate) struct LineWriter {
    balance: Money,
    lines: Vec<AmortizationLine>,
}

impl LineWriter {
    pub(crate) fn new(principal: Money, term: u32) -> Self {
        Self {
            balance: principal,
            lines: Vec::with_capacity(term as usize),
        }
    }

    pub(crate) fn balance(&self) -> Money {
        self.balance
    }

    pub(crate) fn push(&mut self, principal: Money, interest: Money) {
        let opening_balance = self.balance;
        self.balance -= principal;
        self.lines.push(AmortizationLine {
            installment: self.lines.len() as u32 + 1,
            opening_balance,
            principal,
            interest,
            total: principal + interest,
            closing_balance: self.balance,
        });
    }

    pub(crate) fn finish(self, principal: Money) -> AmortizationResult {
        AmortizationResult::from_lines(principal, self.lines)
    }
}

/// interest engine entry points
pub struct InterestEngine;

impl InterestEngine {
    /// amortize `terms` under its interest strategy
    pub fn generate_schedule(terms: &LoanTerms) -> Result<AmortizationResult> {
        terms.validate()?;

        match terms.strategy {
            InterestStrategy::FlatRate => flat::flat_rate(terms.principal, terms.rate, terms.term),
            InterestStrategy::Simple => flat::simple(terms.principal, terms.rate, terms.term),
            InterestStrategy::AddOn => flat::add_on(terms.principal, terms.rate, terms.term),
            InterestStrategy::ReducingBalance => {
                reducing::reducing_balance(terms.principal, terms.rate, terms.term)
            }
            InterestStrategy::DecliningBalance => {
                declining::declining_balance(terms.principal, terms.rate, terms.term)
            }
            InterestStrategy::CompoundInterest => {
                compound::compound_interest(terms.principal, terms.rate, terms.term)
            }
        }
    }

    /// spread known principal and interest totals evenly over `term` periods
    pub fn spread(principal: Money, total_interest: Money, term: u32) -> Result<AmortizationResult> {
        if term < 1 {
            return Err(LoanError::InvalidTerm { term });
        }
        if principal.is_negative() {
            return Err(LoanError::invalid_amount("principal", principal));
        }
        if total_interest.is_negative() {
            return Err(LoanError::invalid_amount("total_interest", total_interest));
        }

        Ok(flat::spread(principal, total_interest, term))
    }

}

/// interest for one period on `balance`
pub(crate) fn period_interest(balance: Money, rate: Rate) -> Money {
    balance.apply_rate(rate)
}

/// `principal x factor`, rejecting terms whose figures leave the decimal range
pub(crate) fn scaled(principal: Money, factor: Option<Decimal>, rate: Rate) -> Result<Money> {
    factor
        .and_then(|f| principal.checked_mul(f))
        .ok_or_else(|| LoanError::invalid_amount("rate", rate.as_decimal()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeriodUnit;
    use rust_decimal_macros::dec;

    const ALL_STRATEGIES: [InterestStrategy; 6] = [
        InterestStrategy::FlatRate,
        InterestStrategy::Simple,
        InterestStrategy::AddOn,
        InterestStrategy::ReducingBalance,
        InterestStrategy::DecliningBalance,
        InterestStrategy::CompoundInterest,
    ];

    fn terms(principal: i64, rate: Rate, term: u32, strategy: InterestStrategy) -> LoanTerms {
        LoanTerms::monthly(Money::from_major(principal), rate, term, strategy)
    }

    #[test]
    fn test_schedule_completeness_across_strategies() {
        let cases = [
            (100_000, Rate::from_decimal(dec!(0.01)), 12),
            (12_345, Rate::from_decimal(dec!(0.035)), 7),
            (999, Rate::from_decimal(dec!(0.1)), 1),
            (50_000, Rate::ZERO, 9),
            (250_000, Rate::from_decimal(dec!(0.0125)), 36),
        ];

        for strategy in ALL_STRATEGIES {
            for (principal, rate, term) in cases {
                let t = terms(principal, rate, term, strategy);
                let result = InterestEngine::generate_schedule(&t).unwrap();

                assert_eq!(result.lines.len() as u32, term, "{:?}", strategy);

                let sum_total: Money = result.lines.iter().map(|l| l.total).sum();
                let sum_principal: Money = result.lines.iter().map(|l| l.principal).sum();
                let sum_interest: Money = result.lines.iter().map(|l| l.interest).sum();

                assert_eq!(sum_total, result.total_amount, "{:?}", strategy);
                assert_eq!(sum_principal, t.principal, "{:?}", strategy);
                assert_eq!(sum_interest, result.total_interest, "{:?}", strategy);
                assert_eq!(result.total_amount, t.principal + result.total_interest);

                let last = result.lines.last().unwrap();
                assert_eq!(last.closing_balance, Money::ZERO, "{:?}", strategy);

                for line in &result.lines {
                    assert_eq!(line.total, line.principal + line.interest);
                    assert!(!line.principal.is_negative(), "{:?} {:?}", strategy, line);
                    assert!(!line.interest.is_negative(), "{:?} {:?}", strategy, line);
                }
            }
        }
    }

    #[test]
    fn test_zero_rate_degenerates_to_equal_principal() {
        for strategy in ALL_STRATEGIES {
            let result = InterestEngine::generate_schedule(&terms(1_000, Rate::ZERO, 3, strategy)).unwrap();
            assert_eq!(result.total_interest, Money::ZERO);
            assert_eq!(result.total_amount, Money::from_major(1_000));
            assert_eq!(result.lines[0].principal, Money::from_minor(33_333));
            assert_eq!(result.lines[2].principal, Money::from_minor(33_334));
        }
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let bad_term = terms(1_000, Rate::from_percentage(1), 0, InterestStrategy::FlatRate);
        assert_eq!(
            InterestEngine::generate_schedule(&bad_term),
            Err(LoanError::InvalidTerm { term: 0 })
        );

        let bad_principal = LoanTerms {
            principal: Money::from_major(-5),
            ..terms(1_000, Rate::from_percentage(1), 6, InterestStrategy::ReducingBalance)
        };
        assert!(matches!(
            InterestEngine::generate_schedule(&bad_principal),
            Err(LoanError::InvalidAmount { .. })
        ));

        let bad_rate = terms(1_000, Rate::from_decimal(dec!(-0.01)), 6, InterestStrategy::DecliningBalance);
        assert!(matches!(
            InterestEngine::generate_schedule(&bad_rate),
            Err(LoanError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let t = LoanTerms {
            period_unit: PeriodUnit::Week,
            ..terms(73_500, Rate::from_decimal(dec!(0.0075)), 26, InterestStrategy::ReducingBalance)
        };
        let a = InterestEngine::generate_schedule(&t).unwrap();
        let b = InterestEngine::generate_schedule(&t).unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn test_spread() {
        let result = InterestEngine::spread(Money::from_major(1_000), Money::from_major(100), 4).unwrap();
        assert_eq!(result.installment, Money::from_major(275));
        assert_eq!(result.total_amount, Money::from_major(1_100));

        assert_eq!(
            InterestEngine::spread(Money::from_major(1_000), Money::ZERO, 0),
            Err(LoanError::InvalidTerm { term: 0 })
        );
    }

    #[test]
    fn test_out_of_range_terms_are_rejected_not_panicking() {
        // (1 + 1.0)^100 overflows the decimal range
        for strategy in ALL_STRATEGIES {
            let t = terms(1_000, Rate::ONE, 100, strategy);
            let result = InterestEngine::generate_schedule(&t);
            match strategy {
                InterestStrategy::ReducingBalance | InterestStrategy::CompoundInterest => {
                    assert!(matches!(result, Err(LoanError::InvalidAmount { .. })), "{:?}", strategy);
                }
                _ => assert!(result.is_ok(), "{:?}", strategy),
            }
        }

        let huge = LoanTerms {
            principal: Money::from_decimal(Decimal::MAX / dec!(10)),
            ..terms(1, Rate::from_percentage(50), 120, InterestStrategy::FlatRate)
        };
        assert!(matches!(
            InterestEngine::generate_schedule(&huge),
            Err(LoanError::InvalidAmount { .. })
        ));
    }
}
