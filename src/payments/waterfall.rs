use chrono::NaiveDate;

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::schedule::ScheduleLine;

use super::{AllocationResult, LineAllocation};

/// applies payments to schedule lines: penalty, then interest, then principal,
/// line by line from the oldest due date
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentAllocator;

impl PaymentAllocator {
    pub fn new() -> Self {
        Self
    }

    /// allocate `amount` across `lines`, mutating their paid/outstanding columns.
    ///
    /// Paid lines are skipped. Whatever cannot be absorbed comes back as
    /// `unallocated`, so applied + unallocated always equals `amount`.
    pub fn allocate(
        &self,
        amount: Money,
        paid_on: NaiveDate,
        today: NaiveDate,
        lines: &mut [ScheduleLine],
    ) -> Result<AllocationResult> {
        if !amount.is_positive() {
            return Err(LoanError::invalid_amount("payment", amount));
        }

        let mut order: Vec<usize> = (0..lines.len()).filter(|&i| !lines[i].is_paid()).collect();
        order.sort_by_key(|&i| (lines[i].due_date, lines[i].installment));

        let mut remaining = amount;
        let mut allocations = Vec::new();

        for idx in order {
            if !remaining.is_positive() {
                break;
            }
            let line = &mut lines[idx];
            let mut split = LineAllocation::new(line.installment, line.id);

            for component in [
                PaymentComponent::Penalty,
                PaymentComponent::Interest,
                PaymentComponent::Principal,
            ] {
                remaining = self.apply_to_component(component, remaining, line, &mut split);
                if remaining.is_zero() {
                    break;
                }
            }

            if split.total().is_positive() {
                line.apply(split.penalty, split.interest, split.principal, paid_on, today);
                allocations.push(split);
            }
        }

        let to_penalty = allocations.iter().map(|a| a.penalty).sum();
        let to_interest = allocations.iter().map(|a| a.interest).sum();
        let to_principal = allocations.iter().map(|a| a.principal).sum();

        Ok(AllocationResult {
            amount,
            paid_on,
            allocations,
            to_penalty,
            to_interest,
            to_principal,
            unallocated: remaining,
        })
    }

    fn apply_to_component(
        &self,
        component: PaymentComponent,
        available: Money,
        line: &ScheduleLine,
        split: &mut LineAllocation,
    ) -> Money {
        let (balance, applied_field) = match component {
            PaymentComponent::Penalty => (line.outstanding_penalty(), &mut split.penalty),
            PaymentComponent::Interest => (line.outstanding_interest, &mut split.interest),
            PaymentComponent::Principal => (line.outstanding_principal, &mut split.principal),
        };

        let payment = available.min(balance).max(Money::ZERO);
        *applied_field = payment;

        available - payment
    }
}

#[derive(Debug, Clone, Copy)]
enum PaymentComponent {
    Penalty,
    Interest,
    Principal,
}
