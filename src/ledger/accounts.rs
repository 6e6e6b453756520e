use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use crate::errors::{LoanError, Result};

use super::Direction;

/// account categories, numbered by the leading digit of the code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    /// infer the category from an account code's leading digit
    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim().chars().next() {
            Some('1') => Ok(Self::Asset),
            Some('2') => Ok(Self::Liability),
            Some('3') => Ok(Self::Equity),
            Some('4') => Ok(Self::Revenue),
            Some('5') | Some('6') => Ok(Self::Expense),
            _ => Err(LoanError::InvalidConfiguration {
                message: format!("cannot infer account type from code {:?}", code),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
        }
    }

    /// side that increases the balance
    pub fn normal_balance(&self) -> Direction {
        match self {
            Self::Asset | Self::Expense => Direction::Debit,
            Self::Liability | Self::Equity | Self::Revenue => Direction::Credit,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ledger account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(code: &str, name: &str, created_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            account_type: AccountType::from_code(code)?,
            created_at,
        })
    }
}

/// chart-of-accounts lookup
pub trait ChartOfAccounts: Send + Sync {
    fn find_account_by_code(&self, code: &str) -> Result<Option<Account>>;

    fn create_account(&self, account: Account) -> Result<Account>;
}

/// look an account up, creating it when the chart lacks it.
///
/// Returns the account and whether it was provisioned by this call.
pub fn resolve_or_provision(
    chart: &dyn ChartOfAccounts,
    code: &str,
    name: &str,
    now: DateTime<Utc>,
) -> Result<(Account, bool)> {
    if let Some(account) = chart.find_account_by_code(code)? {
        return Ok((account, false));
    }

    let account = chart.create_account(Account::new(code, name, now)?)?;
    warn!(
        account_code = %account.code,
        account_name = %account.name,
        account_type = %account.account_type,
        "provisioned missing ledger account"
    );
    Ok((account, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    #[derive(Default)]
    struct MapChart {
        accounts: DashMap<String, Account>,
    }

    impl ChartOfAccounts for MapChart {
        fn find_account_by_code(&self, code: &str) -> Result<Option<Account>> {
            Ok(self.accounts.get(code).map(|a| a.clone()))
        }

        fn create_account(&self, account: Account) -> Result<Account> {
            self.accounts.insert(account.code.clone(), account.clone());
            Ok(account)
        }
    }

    #[test]
    fn test_type_from_leading_digit() {
        assert_eq!(AccountType::from_code("1100").unwrap(), AccountType::Asset);
        assert_eq!(AccountType::from_code("2100").unwrap(), AccountType::Liability);
        assert_eq!(AccountType::from_code("3000").unwrap(), AccountType::Equity);
        assert_eq!(AccountType::from_code("4000").unwrap(), AccountType::Revenue);
        assert_eq!(AccountType::from_code("5200").unwrap(), AccountType::Expense);
        assert_eq!(AccountType::from_code("6100").unwrap(), AccountType::Expense);
        assert!(matches!(
            AccountType::from_code("9000"),
            Err(LoanError::InvalidConfiguration { .. })
        ));
        assert!(AccountType::from_code("").is_err());
    }

    #[test]
    fn test_resolve_or_provision_creates_once() {
        let chart = MapChart::default();
        let (created, provisioned) =
            resolve_or_provision(&chart, "4100", "penalty_income", Utc::now()).unwrap();
        assert!(provisioned);
        assert_eq!(created.account_type, AccountType::Revenue);

        let (found, provisioned) =
            resolve_or_provision(&chart, "4100", "penalty_income", Utc::now()).unwrap();
        assert!(!provisioned);
        assert_eq!(found.id, created.id);
    }

    #[test]
    fn test_unknown_prefix_is_not_provisioned() {
        let chart = MapChart::default();
        assert!(resolve_or_provision(&chart, "7000", "suspense", Utc::now()).is_err());
        assert!(chart.accounts.is_empty());
    }
}
