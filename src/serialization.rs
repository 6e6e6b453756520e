/// serialization support for loan statements
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::ledger::{EntryStatus, JournalEntry, JournalEntryType};
use crate::loan::LoanAccount;
use crate::schedule::ScheduleLine;
use crate::types::{InterestStrategy, LoanId, LoanStatus, PeriodUnit};

/// serializable view of a loan, its schedule and its journals
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanStatement {
    pub loan_id: LoanId,
    pub reference: String,
    pub status: LoanStatus,
    pub as_of: NaiveDate,
    pub terms: TermsView,
    pub balances: BalanceView,
    pub arrears: ArrearsView,
    pub next_installment: Option<InstallmentView>,
    pub schedule: Vec<ScheduleLine>,
    pub journals: Vec<JournalView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TermsView {
    pub principal: Money,
    pub rate: Rate,
    pub term: u32,
    pub period_unit: PeriodUnit,
    pub strategy: InterestStrategy,
    pub disbursement_date: NaiveDate,
    pub restructure_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceView {
    pub outstanding_principal: Money,
    pub outstanding_interest: Money,
    pub outstanding_penalty: Money,
    pub total_outstanding: Money,
    pub total_principal_paid: Money,
    pub total_interest_paid: Money,
    pub total_penalty_paid: Money,
    pub total_waived: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArrearsView {
    pub overdue_installments: u32,
    pub amount_in_arrears: Money,
    pub oldest_days_past_due: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallmentView {
    pub installment: u32,
    pub due_date: NaiveDate,
    pub amount_owed: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JournalView {
    pub id: Uuid,
    pub entry_date: NaiveDate,
    pub entry_type: JournalEntryType,
    pub reference: String,
    pub amount: Money,
    pub status: EntryStatus,
}

impl LoanStatement {
    pub fn build(
        loan: &LoanAccount,
        schedule: Vec<ScheduleLine>,
        journals: &[JournalEntry],
        as_of: NaiveDate,
    ) -> Self {
        let past_due: Vec<&ScheduleLine> = schedule.iter().filter(|l| l.is_past_due(as_of)).collect();

        let arrears = ArrearsView {
            overdue_installments: past_due.len() as u32,
            amount_in_arrears: past_due.iter().map(|l| l.amount_owed()).sum(),
            oldest_days_past_due: past_due
                .iter()
                .map(|l| l.days_past_due(as_of))
                .max()
                .unwrap_or(0),
        };

        let next_installment = if loan.status.is_terminal() {
            None
        } else {
            schedule
                .iter()
                .filter(|l| !l.is_paid())
                .min_by_key(|l| (l.due_date, l.installment))
                .map(|l| InstallmentView {
                    installment: l.installment,
                    due_date: l.due_date,
                    amount_owed: l.amount_owed(),
                })
        };

        LoanStatement {
            loan_id: loan.id,
            reference: loan.reference.clone(),
            status: loan.status,
            as_of,
            terms: TermsView {
                principal: loan.principal,
                rate: loan.rate,
                term: loan.term,
                period_unit: loan.terms.period_unit,
                strategy: loan.terms.strategy,
                disbursement_date: loan.disbursement_date,
                restructure_count: loan.restructure_count,
            },
            balances: BalanceView {
                outstanding_principal: loan.outstanding_principal,
                outstanding_interest: loan.outstanding_interest,
                outstanding_penalty: loan.outstanding_penalty,
                total_outstanding: loan.total_outstanding,
                total_principal_paid: loan.total_principal_paid,
                total_interest_paid: loan.total_interest_paid,
                total_penalty_paid: loan.total_penalty_paid,
                total_waived: loan.total_waived,
            },
            arrears,
            next_installment,
            schedule,
            journals: journals
                .iter()
                .map(|e| JournalView {
                    id: e.id,
                    entry_date: e.entry_date,
                    entry_type: e.entry_type,
                    reference: e.reference.clone(),
                    amount: e.amount(),
                    status: e.status,
                })
                .collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
