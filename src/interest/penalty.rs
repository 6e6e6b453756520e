use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

/// penalty charged once on an installment that stays unpaid past the grace period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyPolicy {
    /// fraction of the installment's outstanding total
    pub rate: Rate,
    /// days after the due date before the penalty applies
    pub grace_days: u32,
    /// floor for a non-zero penalty
    pub minimum_penalty: Money,
}

impl PenaltyPolicy {
    pub fn new(rate: Rate, grace_days: u32) -> Self {
        Self {
            rate,
            grace_days,
            minimum_penalty: Money::ZERO,
        }
    }
}

/// engine for late-payment penalties
pub struct PenaltyEngine {
    pub policy: PenaltyPolicy,
}

impl PenaltyEngine {
    pub fn new(policy: PenaltyPolicy) -> Self {
        Self { policy }
    }

    /// penalty on `overdue_amount` after `days_overdue`
    pub fn calculate_penalty(&self, overdue_amount: Money, days_overdue: i64) -> PenaltyCalculation {
        if days_overdue <= self.policy.grace_days as i64 || !overdue_amount.is_positive() {
            return PenaltyCalculation {
                penalty_amount: Money::ZERO,
                overdue_base: overdue_amount,
                days_overdue,
                grace_applied: true,
            };
        }

        let penalty_amount = overdue_amount
            .apply_rate(self.policy.rate)
            .max(self.policy.minimum_penalty);

        PenaltyCalculation {
            penalty_amount,
            overdue_base: overdue_amount,
            days_overdue,
            grace_applied: false,
        }
    }
}

/// penalty calculation result
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyCalculation {
    pub penalty_amount: Money,
    pub overdue_base: Money,
    pub days_overdue: i64,
    pub grace_applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalty_within_grace() {
        let engine = PenaltyEngine::new(PenaltyPolicy::new(Rate::from_percentage(5), 7));
        let calc = engine.calculate_penalty(Money::from_major(1_000), 7);
        assert_eq!(calc.penalty_amount, Money::ZERO);
        assert!(calc.grace_applied);
    }

    #[test]
    fn test_penalty_after_grace() {
        let engine = PenaltyEngine::new(PenaltyPolicy::new(Rate::from_percentage(5), 7));
        let calc = engine.calculate_penalty(Money::from_major(1_000), 8);
        assert_eq!(calc.penalty_amount, Money::from_major(50));
        assert!(!calc.grace_applied);
    }

    #[test]
    fn test_minimum_penalty() {
        let policy = PenaltyPolicy {
            minimum_penalty: Money::from_major(100),
            ..PenaltyPolicy::new(Rate::from_percentage(1), 0)
        };
        let engine = PenaltyEngine::new(policy);
        assert_eq!(engine.calculate_penalty(Money::from_major(500), 3).penalty_amount, Money::from_major(100));
        assert_eq!(engine.calculate_penalty(Money::ZERO, 30).penalty_amount, Money::ZERO);
    }
}
