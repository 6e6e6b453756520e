pub mod waterfall;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;

pub use waterfall::PaymentAllocator;

/// what a single payment did to one schedule line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAllocation {
    pub installment: u32,
    pub line_id: Uuid,
    pub penalty: Money,
    pub interest: Money,
    pub principal: Money,
}

impl LineAllocation {
    pub(crate) fn new(installment: u32, line_id: Uuid) -> Self {
        Self {
            installment,
            line_id,
            penalty: Money::ZERO,
            interest: Money::ZERO,
            principal: Money::ZERO,
        }
    }

    pub fn total(&self) -> Money {
        self.penalty + self.interest + self.principal
    }
}

/// breakdown of a payment across the schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub amount: Money,
    pub paid_on: NaiveDate,
    pub allocations: Vec<LineAllocation>,
    pub to_penalty: Money,
    pub to_interest: Money,
    pub to_principal: Money,
    /// left over once every line is covered
    pub unallocated: Money,
}

impl AllocationResult {
    pub fn applied(&self) -> Money {
        self.to_penalty + self.to_interest + self.to_principal
    }
}
