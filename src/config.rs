use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::interest::PenaltyPolicy;
use crate::types::PaymentMethod;

/// role an account plays in loan postings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Cash,
    Bank,
    MobileMoney,
    LoansReceivable,
    UnearnedInterest,
    InterestIncome,
    PenaltyIncome,
    BadDebtExpense,
    WaiverExpense,
}

impl AccountRole {
    pub const ALL: [AccountRole; 9] = [
        AccountRole::Cash,
        AccountRole::Bank,
        AccountRole::MobileMoney,
        AccountRole::LoansReceivable,
        AccountRole::UnearnedInterest,
        AccountRole::InterestIncome,
        AccountRole::PenaltyIncome,
        AccountRole::BadDebtExpense,
        AccountRole::WaiverExpense,
    ];

    /// asset account money moves through for a payment method
    pub fn for_method(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => AccountRole::Cash,
            PaymentMethod::Bank => AccountRole::Bank,
            PaymentMethod::MobileMoney => AccountRole::MobileMoney,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Cash => "cash",
            AccountRole::Bank => "bank",
            AccountRole::MobileMoney => "mobile_money",
            AccountRole::LoansReceivable => "loans_receivable",
            AccountRole::UnearnedInterest => "unearned_interest",
            AccountRole::InterestIncome => "interest_income",
            AccountRole::PenaltyIncome => "penalty_income",
            AccountRole::BadDebtExpense => "bad_debt_expense",
            AccountRole::WaiverExpense => "waiver_expense",
        }
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// role -> account code
pub type AccountMap = BTreeMap<AccountRole, String>;

/// when scheduled interest reaches the books
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestRecognition {
    /// interest income is credited as it is collected
    CashBasis,
    /// scheduled interest is booked as unearned at disbursement
    Upfront,
}

/// what a partial waiver does to the unpaid schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaiverSchedulePolicy {
    /// leave lines as they are; the account balance is authoritative
    Advisory,
    /// re-spread unpaid lines against the reduced balance
    Regenerate,
}

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// version tag of the chart mapping
    pub version: String,
    pub chart: AccountMap,
    /// balance at or below which a loan counts as repaid
    pub rounding_tolerance: Money,
    pub restructure_memo_amount: Money,
    /// actor recorded on posted journal entries
    pub posting_actor: String,
    pub interest_recognition: InterestRecognition,
    pub waiver_schedule_policy: WaiverSchedulePolicy,
    pub penalty: Option<PenaltyPolicy>,
    pub default_after_days: u32,
    pub max_restructure_term: u32,
}

impl EngineConfig {
    /// cash-basis SACCO chart, no penalties
    pub fn sacco_default() -> Self {
        let chart = [
            (AccountRole::Cash, "1000"),
            (AccountRole::Bank, "1010"),
            (AccountRole::MobileMoney, "1020"),
            (AccountRole::LoansReceivable, "1100"),
            (AccountRole::UnearnedInterest, "2100"),
            (AccountRole::InterestIncome, "4000"),
            (AccountRole::PenaltyIncome, "4100"),
            (AccountRole::BadDebtExpense, "5100"),
            (AccountRole::WaiverExpense, "5200"),
        ]
        .into_iter()
        .map(|(role, code)| (role, code.to_string()))
        .collect();

        Self {
            version: "2024.1".to_string(),
            chart,
            rounding_tolerance: Money::CENT,
            restructure_memo_amount: Money::CENT,
            posting_actor: "system".to_string(),
            interest_recognition: InterestRecognition::CashBasis,
            waiver_schedule_policy: WaiverSchedulePolicy::Advisory,
            penalty: None,
            default_after_days: 90,
            max_restructure_term: 120,
        }
    }

    /// SACCO defaults plus a 5% late penalty after a week's grace
    pub fn sacco_with_penalties() -> Self {
        Self {
            penalty: Some(PenaltyPolicy::new(Rate::from_decimal(dec!(0.05)), 7)),
            ..Self::sacco_default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| LoanError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LoanError::InvalidConfiguration {
            message: e.to_string(),
        })
    }

    pub fn account_code(&self, role: AccountRole) -> Result<&str> {
        self.chart
            .get(&role)
            .map(String::as_str)
            .ok_or_else(|| LoanError::InvalidConfiguration {
                message: format!("no account mapped for role {}", role),
            })
    }

    pub fn validate(&self) -> Result<()> {
        for role in AccountRole::ALL {
            let code = self.account_code(role)?;
            if code.trim().is_empty() {
                return Err(LoanError::InvalidConfiguration {
                    message: format!("empty account code for role {}", role),
                });
            }
        }
        if self.rounding_tolerance.is_negative() {
            return Err(LoanError::invalid_amount("rounding_tolerance", self.rounding_tolerance));
        }
        if !self.restructure_memo_amount.is_positive() {
            return Err(LoanError::invalid_amount(
                "restructure_memo_amount",
                self.restructure_memo_amount,
            ));
        }
        if let Some(penalty) = &self.penalty {
            if penalty.rate.is_negative() {
                return Err(LoanError::invalid_amount("penalty.rate", penalty.rate.as_decimal()));
            }
        }
        if self.max_restructure_term < 1 {
            return Err(LoanError::InvalidTerm {
                term: self.max_restructure_term,
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::sacco_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sacco_default_is_valid() {
        let config = EngineConfig::sacco_default();
        assert!(config.validate().is_ok());
        assert_eq!(config.account_code(AccountRole::LoansReceivable).unwrap(), "1100");
        assert_eq!(config.rounding_tolerance, Money::CENT);
        assert_eq!(config.interest_recognition, InterestRecognition::CashBasis);
    }

    #[test]
    fn test_json_roundtrip_keeps_chart() {
        let config = EngineConfig::sacco_with_penalties();
        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"loans_receivable\": \"1100\""));

        let parsed = EngineConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_role_is_rejected() {
        let mut config = EngineConfig::sacco_default();
        config.chart.remove(&AccountRole::WaiverExpense);
        assert!(matches!(
            config.validate(),
            Err(LoanError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_memo_amount_must_be_positive() {
        let config = EngineConfig {
            restructure_memo_amount: Money::ZERO,
            ..EngineConfig::sacco_default()
        };
        assert!(matches!(config.validate(), Err(LoanError::InvalidAmount { .. })));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json("{\"version\": 1}"),
            Err(LoanError::InvalidConfiguration { .. })
        ));
    }
}
