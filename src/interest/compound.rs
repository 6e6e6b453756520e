use crate::decimal::{Money, Rate};
use crate::errors::Result;

use super::{period_interest, scaled, AmortizationResult, LineWriter};

/// compound interest: total = P x (1 + r)^n paid in equal installments.
///
/// Each installment first covers reducing-balance interest on the remaining
/// principal; the rest retires principal. Once principal is exhausted the
/// remaining installments carry only the compounded interest.
pub fn compound_interest(principal: Money, rate: Rate, term: u32) -> Result<AmortizationResult> {
    let total_amount = scaled(principal, rate.growth_factor(term), rate)?;
    let installments = total_amount.split_even(term);

    let mut writer = LineWriter::new(principal, term);
    for (idx, installment) in installments.into_iter().enumerate() {
        let balance = writer.balance();
        let principal_part = if idx as u32 + 1 == term {
            balance
        } else {
            (installment - period_interest(balance, rate))
                .max(Money::ZERO)
                .min(balance)
        };
        writer.push(principal_part, installment - principal_part);
    }
    Ok(writer.finish(principal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_compound_total_is_compounded_up_front() {
        let result = compound_interest(Money::from_major(10_000), Rate::from_percentage(10), 2).unwrap();

        // 10000 x 1.1^2
        assert_eq!(result.total_amount, Money::from_major(12_100));
        assert_eq!(result.total_interest, Money::from_major(2_100));
        assert_eq!(result.lines[0].total, Money::from_major(6_050));
        assert_eq!(result.lines[0].interest, Money::from_major(1_000));
        assert_eq!(result.lines[0].principal, Money::from_major(5_050));
        assert_eq!(result.lines[1].principal, Money::from_major(4_950));
        assert_eq!(result.lines[1].interest, Money::from_major(1_100));
    }

    #[test]
    fn test_compound_exceeds_reducing_balance() {
        let p = Money::from_major(50_000);
        let r = Rate::from_decimal(dec!(0.03));
        let compound = compound_interest(p, r, 24).unwrap();
        let reducing = super::super::reducing::reducing_balance(p, r, 24).unwrap();
        assert!(compound.total_interest > reducing.total_interest);
        assert_eq!(compound.lines.last().unwrap().closing_balance, Money::ZERO);
    }
}
