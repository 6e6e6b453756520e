use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::ledger::{Account, AccountType, ChartOfAccounts, EntryStatus, JournalEntry};
use crate::loan::LoanAccount;
use crate::schedule::ScheduleLine;
use crate::types::LoanId;

pub trait LoanRepository: Send + Sync {
    fn create_loan(&self, loan: &LoanAccount) -> Result<()>;

    fn get_loan(&self, loan_id: LoanId) -> Result<Option<LoanAccount>>;

    fn update_loan(&self, loan: &LoanAccount) -> Result<()>;

    fn list_loans(&self) -> Result<Vec<LoanAccount>>;
}

pub trait ScheduleRepository: Send + Sync {
    fn insert_lines(&self, lines: &[ScheduleLine]) -> Result<()>;

    /// lines of a loan ordered by installment number
    fn lines_for_loan(&self, loan_id: LoanId) -> Result<Vec<ScheduleLine>>;

    fn update_lines(&self, lines: &[ScheduleLine]) -> Result<()>;

    /// drop every line not yet PAID; returns how many went
    fn delete_unpaid_lines(&self, loan_id: LoanId) -> Result<usize>;
}

pub trait JournalRepository: Send + Sync {
    fn save_draft(&self, entry: &JournalEntry) -> Result<()>;

    /// replace a stored draft with its posted form
    fn mark_posted(&self, entry: &JournalEntry) -> Result<()>;

    fn find_by_reference(&self, reference: &str) -> Result<Option<JournalEntry>>;

    fn entries_for_loan(&self, loan_id: LoanId) -> Result<Vec<JournalEntry>>;
}

/// in-process store for loans, schedules, journals and the chart
#[derive(Debug, Default)]
pub struct InMemoryStore {
    loans: DashMap<LoanId, LoanAccount>,
    schedules: DashMap<LoanId, Vec<ScheduleLine>>,
    journals: DashMap<Uuid, JournalEntry>,
    references: DashMap<String, Uuid>,
    accounts: DashMap<String, Account>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.accounts.iter().map(|a| a.value().clone()).collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        accounts
    }

    pub fn journal_count(&self) -> usize {
        self.journals.len()
    }

    /// balance of `code` across posted journals, on the account's normal side
    pub fn account_balance(&self, code: &str) -> Result<Money> {
        let normal = AccountType::from_code(code)?.normal_balance();
        let balance = self
            .journals
            .iter()
            .filter(|e| e.is_posted())
            .flat_map(|e| e.value().lines.clone())
            .filter(|l| l.account_code == code)
            .map(|l| if l.direction == normal { l.amount } else { Money::ZERO - l.amount })
            .sum();
        Ok(balance)
    }
}

impl LoanRepository for InMemoryStore {
    fn create_loan(&self, loan: &LoanAccount) -> Result<()> {
        if self.loans.contains_key(&loan.id) {
            return Err(LoanError::store(format!("loan {} already exists", loan.id)));
        }
        self.loans.insert(loan.id, loan.clone());
        Ok(())
    }

    fn get_loan(&self, loan_id: LoanId) -> Result<Option<LoanAccount>> {
        Ok(self.loans.get(&loan_id).map(|l| l.value().clone()))
    }

    fn update_loan(&self, loan: &LoanAccount) -> Result<()> {
        match self.loans.get_mut(&loan.id) {
            Some(mut stored) => {
                *stored = loan.clone();
                Ok(())
            }
            None => Err(LoanError::LoanNotFound { loan_id: loan.id }),
        }
    }

    fn list_loans(&self) -> Result<Vec<LoanAccount>> {
        let mut loans: Vec<LoanAccount> = self.loans.iter().map(|l| l.value().clone()).collect();
        loans.sort_by_key(|l| (l.created_at, l.id));
        Ok(loans)
    }
}

impl ScheduleRepository for InMemoryStore {
    /// all or nothing: every installment is checked before any line is stored.
    /// Callers hold the loan's lock, so nothing lands between check and insert.
    fn insert_lines(&self, lines: &[ScheduleLine]) -> Result<()> {
        let mut seen = HashSet::new();
        for line in lines {
            let stored = self
                .schedules
                .get(&line.loan_id)
                .map_or(false, |s| s.iter().any(|l| l.installment == line.installment));
            if stored || !seen.insert((line.loan_id, line.installment)) {
                return Err(LoanError::store(format!(
                    "installment {} already exists for loan {}",
                    line.installment, line.loan_id
                )));
            }
        }

        for line in lines {
            let mut schedule = self.schedules.entry(line.loan_id).or_default();
            schedule.push(line.clone());
            schedule.sort_by_key(|l| l.installment);
        }
        Ok(())
    }

    fn lines_for_loan(&self, loan_id: LoanId) -> Result<Vec<ScheduleLine>> {
        Ok(self
            .schedules
            .get(&loan_id)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }

    fn update_lines(&self, lines: &[ScheduleLine]) -> Result<()> {
        for line in lines {
            let mut schedule = self
                .schedules
                .get_mut(&line.loan_id)
                .ok_or(LoanError::ScheduleNotFound { loan_id: line.loan_id })?;
            let stored = schedule
                .iter_mut()
                .find(|l| l.id == line.id)
                .ok_or_else(|| LoanError::store(format!("schedule line {} not found", line.id)))?;
            *stored = line.clone();
        }
        Ok(())
    }

    fn delete_unpaid_lines(&self, loan_id: LoanId) -> Result<usize> {
        let mut schedule = self
            .schedules
            .get_mut(&loan_id)
            .ok_or(LoanError::ScheduleNotFound { loan_id })?;
        let before = schedule.len();
        schedule.retain(|l| l.is_paid());
        Ok(before - schedule.len())
    }
}

impl JournalRepository for InMemoryStore {
    fn save_draft(&self, entry: &JournalEntry) -> Result<()> {
        if entry.status != EntryStatus::Draft {
            return Err(LoanError::store(format!("entry {} is not a draft", entry.id)));
        }
        if self.references.contains_key(&entry.reference) {
            return Err(LoanError::store(format!(
                "journal reference {} already used",
                entry.reference
            )));
        }
        self.references.insert(entry.reference.clone(), entry.id);
        self.journals.insert(entry.id, entry.clone());
        Ok(())
    }

    fn mark_posted(&self, entry: &JournalEntry) -> Result<()> {
        let mut stored = self
            .journals
            .get_mut(&entry.id)
            .ok_or_else(|| LoanError::store(format!("journal entry {} not found", entry.id)))?;
        if stored.is_posted() {
            return Err(LoanError::invalid_transition(stored.status, "repost"));
        }
        if !entry.is_posted() {
            return Err(LoanError::store(format!("entry {} has not been posted", entry.id)));
        }
        *stored = entry.clone();
        Ok(())
    }

    fn find_by_reference(&self, reference: &str) -> Result<Option<JournalEntry>> {
        let id = match self.references.get(reference) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.journals.get(&id).map(|e| e.value().clone()))
    }

    fn entries_for_loan(&self, loan_id: LoanId) -> Result<Vec<JournalEntry>> {
        let mut entries: Vec<JournalEntry> = self
            .journals
            .iter()
            .filter(|e| e.loan_id == loan_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| (e.created_at, e.entry_date));
        Ok(entries)
    }
}

impl ChartOfAccounts for InMemoryStore {
    fn find_account_by_code(&self, code: &str) -> Result<Option<Account>> {
        Ok(self.accounts.get(code).map(|a| a.value().clone()))
    }

    fn create_account(&self, account: Account) -> Result<Account> {
        let stored = self
            .accounts
            .entry(account.code.clone())
            .or_insert(account)
            .value()
            .clone();
        Ok(stored)
    }
}

/// per-loan mutual exclusion for read-modify-write cycles
#[derive(Debug, Default)]
pub struct LoanLocks {
    locks: DashMap<LoanId, Arc<Mutex<()>>>,
}

impl LoanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// run `f` while holding the loan's lock
    pub fn with_loan<T>(&self, loan_id: LoanId, f: impl FnOnce() -> Result<T>) -> Result<T> {
        // clone the handle so the map shard is not held while `f` runs
        let lock = self
            .locks
            .entry(loan_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{JournalEntryType, JournalLine};
    use chrono::{NaiveDate, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lines(loan_id: LoanId) -> Vec<ScheduleLine> {
        (1..=3)
            .map(|k| {
                ScheduleLine::new(
                    loan_id,
                    k,
                    date(2024, k + 1, 1),
                    Money::from_major(100),
                    Money::from_major(10),
                    date(2024, 1, 1),
                )
            })
            .collect()
    }

    #[test]
    fn test_schedule_roundtrip_and_delete_unpaid() {
        let store = InMemoryStore::new();
        let loan_id = Uuid::new_v4();
        let mut schedule = lines(loan_id);
        store.insert_lines(&schedule).unwrap();

        let today = date(2024, 1, 1);
        schedule[0].apply(Money::ZERO, Money::from_major(10), Money::from_major(100), today, today);
        store.update_lines(&schedule[..1]).unwrap();

        assert_eq!(store.delete_unpaid_lines(loan_id).unwrap(), 2);
        let remaining = store.lines_for_loan(loan_id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].is_paid());
    }

    #[test]
    fn test_duplicate_installment_rejected() {
        let store = InMemoryStore::new();
        let loan_id = Uuid::new_v4();
        let schedule = lines(loan_id);
        store.insert_lines(&schedule).unwrap();
        assert!(matches!(
            store.insert_lines(&schedule[..1]),
            Err(LoanError::Store { .. })
        ));
    }

    #[test]
    fn test_rejected_batch_stores_nothing() {
        let store = InMemoryStore::new();
        let loan_id = Uuid::new_v4();
        let schedule = lines(loan_id);
        store.insert_lines(&schedule[..1]).unwrap();

        // installments 2 and 3 are new, 1 collides
        assert!(matches!(store.insert_lines(&schedule), Err(LoanError::Store { .. })));
        assert_eq!(store.lines_for_loan(loan_id).unwrap().len(), 1);

        // duplicates within one batch
        let other = Uuid::new_v4();
        let mut batch = lines(other);
        batch.push(batch[0].clone());
        assert!(matches!(store.insert_lines(&batch), Err(LoanError::Store { .. })));
        assert!(store.lines_for_loan(other).unwrap().is_empty());
    }

    #[test]
    fn test_account_balance_follows_normal_side() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        let mut disbursed = JournalEntry::new(
            Uuid::new_v4(),
            date(2024, 1, 1),
            JournalEntryType::Disbursement,
            "DSB-1",
            "disbursement",
            now,
        );
        disbursed.push(JournalLine::debit("1100", Money::from_major(1_000), "loan"));
        disbursed.push(JournalLine::credit("1000", Money::from_major(1_000), "cash"));
        store.save_draft(&disbursed).unwrap();
        // drafts do not count
        assert!(store.account_balance("1100").unwrap().is_zero());

        disbursed.post("system", now).unwrap();
        store.mark_posted(&disbursed).unwrap();
        assert_eq!(store.account_balance("1100").unwrap(), Money::from_major(1_000));
        assert_eq!(store.account_balance("1000").unwrap(), Money::from_major(-1_000));
        assert!(store.account_balance("4000").unwrap().is_zero());
        assert!(store.account_balance("x").is_err());
    }

    #[test]
    fn test_create_account_keeps_first() {
        let store = InMemoryStore::new();
        let first = store.create_account(Account::new("1000", "cash", Utc::now()).unwrap()).unwrap();
        let second = store.create_account(Account::new("1000", "till", Utc::now()).unwrap()).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.accounts().len(), 1);
    }

    #[test]
    fn test_loan_locks_serialize_access() {
        let locks = LoanLocks::new();
        let loan_id = Uuid::new_v4();
        let counter = Mutex::new(0u32);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    locks
                        .with_loan(loan_id, || {
                            let mut c = counter.lock().unwrap();
                            *c += 1;
                            Ok(())
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(*counter.lock().unwrap(), 8);
    }
}
