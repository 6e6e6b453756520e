use thiserror::Error;

use crate::decimal::Money;
use crate::types::LoanId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoanError {
    #[error("invalid term: {term} (must be at least 1)")]
    InvalidTerm {
        term: u32,
    },

    #[error("invalid amount for {field}: {amount}")]
    InvalidAmount {
        field: String,
        amount: String,
    },

    #[error("loan not found: {loan_id}")]
    LoanNotFound {
        loan_id: LoanId,
    },

    #[error("no schedule for loan {loan_id}")]
    ScheduleNotFound {
        loan_id: LoanId,
    },

    #[error("invalid state transition: cannot {attempted} while {current}")]
    InvalidStateTransition {
        current: String,
        attempted: String,
    },

    #[error("ledger imbalance: debits {debits}, credits {credits}")]
    LedgerImbalance {
        debits: Money,
        credits: Money,
    },

    #[error("ledger posting failed for {reference}: {message}")]
    LedgerPostingFailure {
        reference: String,
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("store error: {message}")]
    Store {
        message: String,
    },
}

impl LoanError {
    pub fn invalid_amount(field: &str, amount: impl ToString) -> Self {
        LoanError::InvalidAmount {
            field: field.to_string(),
            amount: amount.to_string(),
        }
    }

    pub fn invalid_transition(current: impl ToString, attempted: impl ToString) -> Self {
        LoanError::InvalidStateTransition {
            current: current.to_string(),
            attempted: attempted.to_string(),
        }
    }

    pub fn store(message: impl ToString) -> Self {
        LoanError::Store {
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
