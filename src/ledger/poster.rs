use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{AccountRole, EngineConfig, InterestRecognition};
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::store::JournalRepository;
use crate::types::{LoanId, PaymentMethod, WaiverComponent};

use super::accounts::{resolve_or_provision, ChartOfAccounts};
use super::{EntryStatus, JournalEntry, JournalEntryType, JournalLine};

/// money-moving event and the amounts it carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Disbursement {
        principal: Money,
        /// scheduled interest, booked as unearned under upfront recognition
        scheduled_interest: Money,
        method: PaymentMethod,
    },
    Repayment {
        method: PaymentMethod,
        penalty: Money,
        interest: Money,
        principal: Money,
    },
    /// balances removed by a full write-off, per component
    WriteOff {
        principal: Money,
        interest: Money,
        penalty: Money,
    },
    Waiver {
        component: WaiverComponent,
        amount: Money,
    },
    RestructureMemo {
        /// new scheduled interest minus the interest it replaces
        interest_adjustment: Money,
    },
}

impl LedgerEvent {
    pub fn entry_type(&self) -> JournalEntryType {
        match self {
            LedgerEvent::Disbursement { .. } => JournalEntryType::Disbursement,
            LedgerEvent::Repayment { .. } => JournalEntryType::Repayment,
            LedgerEvent::WriteOff { .. } => JournalEntryType::WriteOff,
            LedgerEvent::Waiver { .. } => JournalEntryType::Waiver,
            LedgerEvent::RestructureMemo { .. } => JournalEntryType::RestructureMemo,
        }
    }
}

/// a journal the poster is asked to write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRequest {
    pub loan_id: LoanId,
    /// unique per business event; reposting the same reference is idempotent
    pub reference: String,
    pub entry_date: NaiveDate,
    pub description: String,
    pub event: LedgerEvent,
}

impl PostingRequest {
    pub fn new(
        loan_id: LoanId,
        reference: impl Into<String>,
        entry_date: NaiveDate,
        description: impl Into<String>,
        event: LedgerEvent,
    ) -> Self {
        Self {
            loan_id,
            reference: reference.into(),
            entry_date,
            description: description.into(),
            event,
        }
    }

    pub fn entry_type(&self) -> JournalEntryType {
        self.event.entry_type()
    }
}

/// account codes resolved once against the chart
#[derive(Debug, Clone)]
struct ResolvedChart {
    cash: String,
    bank: String,
    mobile_money: String,
    receivable: String,
    unearned_interest: String,
    interest_income: String,
    penalty_income: String,
    bad_debt_expense: String,
    waiver_expense: String,
}

impl ResolvedChart {
    fn asset_for(&self, method: PaymentMethod) -> &str {
        match method {
            PaymentMethod::Cash => &self.cash,
            PaymentMethod::Bank => &self.bank,
            PaymentMethod::MobileMoney => &self.mobile_money,
        }
    }
}

/// builds balanced journal entries and posts them in two phases
#[derive(Debug, Clone)]
pub struct LedgerPoster {
    chart: ResolvedChart,
    recognition: InterestRecognition,
    memo_amount: Money,
    actor: String,
}

impl LedgerPoster {
    /// resolve every configured account, provisioning the ones the chart lacks
    pub fn new(
        config: &EngineConfig,
        accounts: &dyn ChartOfAccounts,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Self> {
        config.validate()?;
        let now = time_provider.now();

        let mut resolve = |role: AccountRole| -> Result<String> {
            let code = config.account_code(role)?;
            let (account, provisioned) = resolve_or_provision(accounts, code, role.as_str(), now)?;
            if provisioned {
                events.emit(Event::AccountProvisioned {
                    code: account.code.clone(),
                    name: account.name.clone(),
                    timestamp: now,
                });
            }
            Ok(account.code)
        };

        let chart = ResolvedChart {
            cash: resolve(AccountRole::Cash)?,
            bank: resolve(AccountRole::Bank)?,
            mobile_money: resolve(AccountRole::MobileMoney)?,
            receivable: resolve(AccountRole::LoansReceivable)?,
            unearned_interest: resolve(AccountRole::UnearnedInterest)?,
            interest_income: resolve(AccountRole::InterestIncome)?,
            penalty_income: resolve(AccountRole::PenaltyIncome)?,
            bad_debt_expense: resolve(AccountRole::BadDebtExpense)?,
            waiver_expense: resolve(AccountRole::WaiverExpense)?,
        };

        Ok(Self {
            chart,
            recognition: config.interest_recognition,
            memo_amount: config.restructure_memo_amount,
            actor: config.posting_actor.clone(),
        })
    }

    pub fn recognition(&self) -> InterestRecognition {
        self.recognition
    }

    /// draft entry for `request`, balance-checked
    pub fn build_entry(&self, request: &PostingRequest, now: DateTime<Utc>) -> Result<JournalEntry> {
        let mut entry = JournalEntry::new(
            request.loan_id,
            request.entry_date,
            request.entry_type(),
            request.reference.clone(),
            request.description.clone(),
            now,
        );
        let c = &self.chart;

        match &request.event {
            LedgerEvent::Disbursement {
                principal,
                scheduled_interest,
                method,
            } => {
                entry.push(JournalLine::debit(&c.receivable, *principal, "loan principal"));
                entry.push(JournalLine::credit(c.asset_for(*method), *principal, "disbursement"));
                if self.recognition == InterestRecognition::Upfront {
                    entry.push(JournalLine::debit(&c.receivable, *scheduled_interest, "scheduled interest"));
                    entry.push(JournalLine::credit(&c.unearned_interest, *scheduled_interest, "unearned interest"));
                }
            }
            LedgerEvent::Repayment {
                method,
                penalty,
                interest,
                principal,
            } => {
                let received = *penalty + *interest + *principal;
                entry.push(JournalLine::debit(c.asset_for(*method), received, "repayment received"));
                match self.recognition {
                    InterestRecognition::CashBasis => {
                        entry.push(JournalLine::credit(&c.receivable, *principal, "principal repaid"));
                        entry.push(JournalLine::credit(&c.interest_income, *interest, "interest income"));
                    }
                    InterestRecognition::Upfront => {
                        entry.push(JournalLine::credit(&c.receivable, *principal + *interest, "principal and interest repaid"));
                        entry.push(JournalLine::debit(&c.unearned_interest, *interest, "interest earned"));
                        entry.push(JournalLine::credit(&c.interest_income, *interest, "interest income"));
                    }
                }
                entry.push(JournalLine::credit(&c.penalty_income, *penalty, "penalty income"));
            }
            LedgerEvent::WriteOff {
                principal,
                interest,
                penalty,
            } => {
                entry.push(JournalLine::debit(&c.bad_debt_expense, *principal, "principal written off"));
                entry.push(JournalLine::credit(&c.receivable, *principal, "receivable removed"));
                self.forgo_interest(&mut entry, &c.bad_debt_expense, *interest, "interest written off");
                entry.push(JournalLine::debit(&c.bad_debt_expense, *penalty, "penalty written off"));
                entry.push(JournalLine::credit(&c.penalty_income, *penalty, "penalty forgone"));
            }
            LedgerEvent::Waiver { component, amount } => match component {
                WaiverComponent::Interest => {
                    self.forgo_interest(&mut entry, &c.waiver_expense, *amount, "interest waived");
                }
                // penalties are never carried in the receivable
                WaiverComponent::Penalty => {
                    entry.push(JournalLine::debit(&c.waiver_expense, *amount, "penalty waived"));
                    entry.push(JournalLine::credit(&c.penalty_income, *amount, "penalty forgone"));
                }
                WaiverComponent::Principal | WaiverComponent::Full => {
                    entry.push(JournalLine::debit(&c.waiver_expense, *amount, format!("{} waived", component)));
                    entry.push(JournalLine::credit(&c.receivable, *amount, "receivable reduced"));
                }
            },
            LedgerEvent::RestructureMemo { interest_adjustment } => {
                entry.push(JournalLine::debit(&c.receivable, self.memo_amount, "restructure memo"));
                entry.push(JournalLine::credit(&c.receivable, self.memo_amount, "restructure memo"));
                if self.recognition == InterestRecognition::Upfront {
                    let delta = interest_adjustment.abs();
                    if interest_adjustment.is_positive() {
                        entry.push(JournalLine::debit(&c.receivable, delta, "rescheduled interest"));
                        entry.push(JournalLine::credit(&c.unearned_interest, delta, "unearned interest"));
                    } else {
                        entry.push(JournalLine::debit(&c.unearned_interest, delta, "unearned interest released"));
                        entry.push(JournalLine::credit(&c.receivable, delta, "rescheduled interest"));
                    }
                }
            }
        }

        entry.validate_balance()?;
        Ok(entry)
    }

    /// interest given up. Cash basis never booked it, so the expense is offset
    /// against income; upfront recognition reverses it out of the receivable.
    fn forgo_interest(&self, entry: &mut JournalEntry, expense: &str, amount: Money, description: &str) {
        let c = &self.chart;
        match self.recognition {
            InterestRecognition::CashBasis => {
                entry.push(JournalLine::debit(expense, amount, description));
                entry.push(JournalLine::credit(&c.interest_income, amount, "interest forgone"));
            }
            InterestRecognition::Upfront => {
                entry.push(JournalLine::debit(&c.unearned_interest, amount, description));
                entry.push(JournalLine::credit(&c.receivable, amount, "receivable reduced"));
            }
        }
    }

    /// validate, persist as DRAFT, then mark POSTED.
    ///
    /// A reference that already has a posted entry returns that entry; a
    /// leftover draft under the reference is posted instead of duplicated.
    pub fn post(
        &self,
        request: &PostingRequest,
        journals: &dyn JournalRepository,
        now: DateTime<Utc>,
    ) -> Result<JournalEntry> {
        let failure = |e: LoanError| LoanError::LedgerPostingFailure {
            reference: request.reference.clone(),
            message: e.to_string(),
        };

        let existing = journals.find_by_reference(&request.reference).map_err(failure)?;
        let mut entry = match existing {
            Some(entry) if entry.status == EntryStatus::Posted => {
                debug!(reference = %request.reference, "journal already posted");
                return Ok(entry);
            }
            Some(draft) => draft,
            None => {
                let draft = self.build_entry(request, now)?;
                journals.save_draft(&draft).map_err(failure)?;
                draft
            }
        };

        entry.post(&self.actor, now)?;
        journals.mark_posted(&entry).map_err(failure)?;

        info!(
            entry_id = %entry.id,
            entry_type = %entry.entry_type,
            reference = %entry.reference,
            amount = %entry.amount(),
            "journal posted"
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Direction;
    use crate::store::InMemoryStore;
    use hourglass_rs::TimeSource;
    use uuid::Uuid;

    fn setup(config: &EngineConfig) -> (LedgerPoster, InMemoryStore, SafeTimeProvider, EventStore) {
        let store = InMemoryStore::new();
        let time = SafeTimeProvider::new(TimeSource::Test(Utc::now()));
        let mut events = EventStore::new();
        let poster = LedgerPoster::new(config, &store, &time, &mut events).unwrap();
        (poster, store, time, events)
    }

    fn request(event: LedgerEvent) -> PostingRequest {
        PostingRequest::new(
            Uuid::new_v4(),
            format!("REF-{}", Uuid::new_v4()),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            "test",
            event,
        )
    }

    fn lines_of(entry: &JournalEntry) -> Vec<(&str, Direction, Money)> {
        entry
            .lines
            .iter()
            .map(|l| (l.account_code.as_str(), l.direction, l.amount))
            .collect()
    }

    #[test]
    fn test_missing_accounts_are_provisioned() {
        let (_, store, _, events) = setup(&EngineConfig::sacco_default());
        assert_eq!(events.events().len(), 9);
        assert!(store.find_account_by_code("5200").unwrap().is_some());

        // second poster against the same chart provisions nothing
        let time = SafeTimeProvider::new(TimeSource::Test(Utc::now()));
        let mut again = EventStore::new();
        LedgerPoster::new(&EngineConfig::sacco_default(), &store, &time, &mut again).unwrap();
        assert!(again.events().is_empty());
    }

    #[test]
    fn test_disbursement_cash_basis() {
        let (poster, _, time, _) = setup(&EngineConfig::sacco_default());
        let entry = poster
            .build_entry(
                &request(LedgerEvent::Disbursement {
                    principal: Money::from_major(12_000),
                    scheduled_interest: Money::from_major(14_400),
                    method: PaymentMethod::MobileMoney,
                }),
                time.now(),
            )
            .unwrap();

        assert_eq!(
            lines_of(&entry),
            vec![
                ("1100", Direction::Debit, Money::from_major(12_000)),
                ("1020", Direction::Credit, Money::from_major(12_000)),
            ]
        );
    }

    #[test]
    fn test_disbursement_upfront_books_unearned_interest() {
        let config = EngineConfig {
            interest_recognition: InterestRecognition::Upfront,
            ..EngineConfig::sacco_default()
        };
        let (poster, _, time, _) = setup(&config);
        let entry = poster
            .build_entry(
                &request(LedgerEvent::Disbursement {
                    principal: Money::from_major(1_000),
                    scheduled_interest: Money::from_major(120),
                    method: PaymentMethod::Cash,
                }),
                time.now(),
            )
            .unwrap();

        assert_eq!(entry.lines.len(), 4);
        assert_eq!(entry.total_debits(), Money::from_major(1_120));
        assert!(entry
            .lines
            .iter()
            .any(|l| l.account_code == "2100" && l.direction == Direction::Credit));
    }

    #[test]
    fn test_repayment_lines_omit_zero_components() {
        let (poster, _, time, _) = setup(&EngineConfig::sacco_default());
        let entry = poster
            .build_entry(
                &request(LedgerEvent::Repayment {
                    method: PaymentMethod::Cash,
                    penalty: Money::ZERO,
                    interest: Money::from_major(400),
                    principal: Money::from_major(1_100),
                }),
                time.now(),
            )
            .unwrap();

        assert_eq!(
            lines_of(&entry),
            vec![
                ("1000", Direction::Debit, Money::from_major(1_500)),
                ("1100", Direction::Credit, Money::from_major(1_100)),
                ("4000", Direction::Credit, Money::from_major(400)),
            ]
        );
    }

    #[test]
    fn test_repayment_upfront_releases_unearned() {
        let config = EngineConfig {
            interest_recognition: InterestRecognition::Upfront,
            ..EngineConfig::sacco_default()
        };
        let (poster, _, time, _) = setup(&config);
        let entry = poster
            .build_entry(
                &request(LedgerEvent::Repayment {
                    method: PaymentMethod::Bank,
                    penalty: Money::from_major(10),
                    interest: Money::from_major(40),
                    principal: Money::from_major(50),
                }),
                time.now(),
            )
            .unwrap();

        assert_eq!(entry.total_debits(), Money::from_major(140));
        assert_eq!(entry.total_credits(), Money::from_major(140));
        assert!(entry.lines.iter().any(|l| l.account_code == "4100"));
    }

    #[test]
    fn test_restructure_memo_is_self_offsetting() {
        let (poster, _, time, _) = setup(&EngineConfig::sacco_default());
        let entry = poster
            .build_entry(
                &request(LedgerEvent::RestructureMemo { interest_adjustment: Money::from_major(300) }),
                time.now(),
            )
            .unwrap();
        assert_eq!(
            lines_of(&entry),
            vec![
                ("1100", Direction::Debit, Money::CENT),
                ("1100", Direction::Credit, Money::CENT),
            ]
        );
    }

    #[test]
    fn test_upfront_restructure_moves_interest_change_through_unearned() {
        let config = EngineConfig {
            interest_recognition: InterestRecognition::Upfront,
            ..EngineConfig::sacco_default()
        };
        let (poster, _, time, _) = setup(&config);

        let raised = poster
            .build_entry(
                &request(LedgerEvent::RestructureMemo { interest_adjustment: Money::from_major(300) }),
                time.now(),
            )
            .unwrap();
        assert_eq!(
            lines_of(&raised)[2..],
            [
                ("1100", Direction::Debit, Money::from_major(300)),
                ("2100", Direction::Credit, Money::from_major(300)),
            ]
        );

        let lowered = poster
            .build_entry(
                &request(LedgerEvent::RestructureMemo { interest_adjustment: Money::from_major(-80) }),
                time.now(),
            )
            .unwrap();
        assert_eq!(
            lines_of(&lowered)[2..],
            [
                ("2100", Direction::Debit, Money::from_major(80)),
                ("1100", Direction::Credit, Money::from_major(80)),
            ]
        );
    }

    #[test]
    fn test_cash_basis_forgone_interest_stays_off_the_receivable() {
        let (poster, _, time, _) = setup(&EngineConfig::sacco_default());

        let waiver = poster
            .build_entry(
                &request(LedgerEvent::Waiver {
                    component: WaiverComponent::Interest,
                    amount: Money::from_major(75),
                }),
                time.now(),
            )
            .unwrap();
        assert_eq!(
            lines_of(&waiver),
            vec![
                ("5200", Direction::Debit, Money::from_major(75)),
                ("4000", Direction::Credit, Money::from_major(75)),
            ]
        );

        let write_off = poster
            .build_entry(
                &request(LedgerEvent::WriteOff {
                    principal: Money::from_major(500),
                    interest: Money::from_major(60),
                    penalty: Money::from_major(20),
                }),
                time.now(),
            )
            .unwrap();
        assert_eq!(
            lines_of(&write_off),
            vec![
                ("5100", Direction::Debit, Money::from_major(500)),
                ("1100", Direction::Credit, Money::from_major(500)),
                ("5100", Direction::Debit, Money::from_major(60)),
                ("4000", Direction::Credit, Money::from_major(60)),
                ("5100", Direction::Debit, Money::from_major(20)),
                ("4100", Direction::Credit, Money::from_major(20)),
            ]
        );
    }

    #[test]
    fn test_upfront_interest_write_off_reverses_unearned() {
        let config = EngineConfig {
            interest_recognition: InterestRecognition::Upfront,
            ..EngineConfig::sacco_default()
        };
        let (poster, _, time, _) = setup(&config);
        let entry = poster
            .build_entry(
                &request(LedgerEvent::WriteOff {
                    principal: Money::from_major(500),
                    interest: Money::from_major(60),
                    penalty: Money::ZERO,
                }),
                time.now(),
            )
            .unwrap();
        assert_eq!(
            lines_of(&entry),
            vec![
                ("5100", Direction::Debit, Money::from_major(500)),
                ("1100", Direction::Credit, Money::from_major(500)),
                ("2100", Direction::Debit, Money::from_major(60)),
                ("1100", Direction::Credit, Money::from_major(60)),
            ]
        );
    }

    #[test]
    fn test_zero_write_off_is_an_imbalance() {
        let (poster, _, time, _) = setup(&EngineConfig::sacco_default());
        let result = poster.build_entry(
            &request(LedgerEvent::WriteOff {
                principal: Money::ZERO,
                interest: Money::ZERO,
                penalty: Money::ZERO,
            }),
            time.now(),
        );
        assert!(matches!(result, Err(LoanError::LedgerImbalance { .. })));
    }

    #[test]
    fn test_post_is_two_phase_and_idempotent() {
        let (poster, store, time, _) = setup(&EngineConfig::sacco_default());
        let req = request(LedgerEvent::Waiver {
            component: WaiverComponent::Interest,
            amount: Money::from_major(75),
        });

        let first = poster.post(&req, &store, time.now()).unwrap();
        assert_eq!(first.status, EntryStatus::Posted);
        assert_eq!(first.posted_by.as_deref(), Some("system"));

        let second = poster.post(&req, &store, time.now()).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(store.entries_for_loan(req.loan_id).unwrap().len(), 1);
    }
}
