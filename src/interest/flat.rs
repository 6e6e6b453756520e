use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};

use super::{scaled, AmortizationResult, LineWriter};

/// flat rate: interest = principal x rate x term, spread evenly
pub fn flat_rate(principal: Money, rate: Rate, term: u32) -> Result<AmortizationResult> {
    let total_interest = scaled(principal, rate.as_decimal().checked_mul(Decimal::from(term)), rate)?;
    if total_interest.checked_add(principal).is_none() {
        return Err(LoanError::invalid_amount("rate", rate.as_decimal()));
    }
    Ok(spread(principal, total_interest, term))
}

/// simple interest, priced the same way as flat rate
pub fn simple(principal: Money, rate: Rate, term: u32) -> Result<AmortizationResult> {
    flat_rate(principal, rate, term)
}

/// add-on interest, priced the same way as flat rate
pub fn add_on(principal: Money, rate: Rate, term: u32) -> Result<AmortizationResult> {
    flat_rate(principal, rate, term)
}

/// equal principal and equal interest shares; the last period takes the cent residue
pub(crate) fn spread(principal: Money, total_interest: Money, term: u32) -> AmortizationResult {
    let principal_shares = principal.split_even(term);
    let interest_shares = total_interest.split_even(term);

    let mut writer = LineWriter::new(principal, term);
    for (p, i) in principal_shares.into_iter().zip(interest_shares) {
        writer.push(p, i);
    }
    writer.finish(principal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_flat_rate_scenario() {
        let result = flat_rate(Money::from_major(12_000), Rate::from_percentage(10), 12).unwrap();

        assert_eq!(result.total_interest, Money::from_major(14_400));
        assert_eq!(result.total_amount, Money::from_major(26_400));
        assert_eq!(result.installment, Money::from_str_exact("2200.00").unwrap());
        assert_eq!(result.lines.len(), 12);

        for line in &result.lines {
            assert_eq!(line.principal, Money::from_major(1_000));
            assert_eq!(line.interest, Money::from_major(1_200));
            assert_eq!(line.total, Money::from_major(2_200));
        }
    }

    #[test]
    fn test_final_line_absorbs_residue() {
        let result = flat_rate(Money::from_major(10_000), Rate::from_decimal(dec!(0.015)), 3).unwrap();

        // interest 450 splits evenly; principal 3333.33 x 2 + 3333.34
        assert_eq!(result.lines[0].principal, Money::from_minor(333_333));
        assert_eq!(result.lines[2].principal, Money::from_minor(333_334));
        assert_eq!(result.lines[0].interest, Money::from_major(150));
        assert_eq!(result.total_amount, Money::from_major(10_450));
    }

    #[test]
    fn test_conventions_price_identically() {
        let p = Money::from_major(7_777);
        let r = Rate::from_decimal(dec!(0.021));
        assert_eq!(flat_rate(p, r, 5), simple(p, r, 5));
        assert_eq!(flat_rate(p, r, 5), add_on(p, r, 5));
    }
}
