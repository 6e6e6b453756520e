use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};

use super::{period_interest, scaled, AmortizationResult, LineWriter};

/// fixed principal per period, interest on the balance before the reduction
pub fn declining_balance(principal: Money, rate: Rate, term: u32) -> Result<AmortizationResult> {
    // total interest never exceeds principal x rate x term
    let ceiling = scaled(principal, rate.as_decimal().checked_mul(Decimal::from(term)), rate)?;
    if ceiling.checked_add(principal).is_none() {
        return Err(LoanError::invalid_amount("rate", rate.as_decimal()));
    }

    let shares = principal.split_even(term);

    let mut writer = LineWriter::new(principal, term);
    for (idx, share) in shares.into_iter().enumerate() {
        let balance = writer.balance();
        let interest = period_interest(balance, rate);
        let principal_part = if idx as u32 + 1 == term { balance } else { share };
        writer.push(principal_part, interest);
    }
    Ok(writer.finish(principal))
}
