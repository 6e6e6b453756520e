use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};

use super::{period_interest, scaled, AmortizationResult, LineWriter};

/// equal installments, interest on the remaining balance each period
pub fn reducing_balance(principal: Money, rate: Rate, term: u32) -> Result<AmortizationResult> {
    let installment = annuity_installment(principal, rate, term)?;
    // the schedule total is bounded by installment x term
    scaled(installment, Some(Decimal::from(term)), rate)?;

    let mut writer = LineWriter::new(principal, term);
    for period in 1..=term {
        let balance = writer.balance();
        let interest = period_interest(balance, rate);
        let principal_part = if period == term {
            balance
        } else {
            (installment - interest).max(Money::ZERO).min(balance)
        };
        writer.push(principal_part, interest);
    }
    Ok(writer.finish(principal))
}

/// M = P * r * (1 + r)^n / ((1 + r)^n - 1), or P / n when the rate is zero
pub fn annuity_installment(principal: Money, rate: Rate, term: u32) -> Result<Money> {
    if term == 0 {
        return Ok(principal);
    }
    if rate.is_zero() {
        return Ok(principal / Decimal::from(term));
    }

    let compound = rate
        .growth_factor(term)
        .ok_or_else(|| LoanError::invalid_amount("rate", rate.as_decimal()))?;
    let numerator = scaled(principal, compound.checked_mul(rate.as_decimal()), rate)?;
    let denominator = compound - Decimal::ONE;

    Ok(Money::from_decimal(numerator.as_decimal() / denominator))
}
