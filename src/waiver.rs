use chrono::{DateTime, NaiveDate, Utc};

use crate::config::WaiverSchedulePolicy;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::ledger::LedgerEvent;
use crate::loan::LoanAccount;
use crate::schedule::ScheduleLine;
use crate::types::{ScheduleStatus, WaiverComponent};

/// what a waiver did to the account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaiverOutcome {
    pub component: WaiverComponent,
    pub amount: Money,
    pub ledger_event: LedgerEvent,
    /// schedule lines were rewritten and need persisting
    pub lines_changed: bool,
    pub closed: bool,
    pub written_off: bool,
}

/// reduces outstanding balances without touching paid history
#[derive(Debug, Clone, Copy)]
pub struct WaiverEngine {
    tolerance: Money,
    policy: WaiverSchedulePolicy,
}

impl WaiverEngine {
    pub fn new(tolerance: Money, policy: WaiverSchedulePolicy) -> Self {
        Self { tolerance, policy }
    }

    /// waive `amount` of `component`; `amount` is ignored for a full waiver
    pub fn waive(
        &self,
        loan: &mut LoanAccount,
        lines: &mut [ScheduleLine],
        component: WaiverComponent,
        amount: Money,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<WaiverOutcome> {
        loan.ensure_open(&format!("waive {}", component))?;

        if component == WaiverComponent::Full {
            let written_off = loan.write_off(now);
            return Ok(WaiverOutcome {
                component,
                amount: written_off.applied(),
                ledger_event: LedgerEvent::WriteOff {
                    principal: written_off.principal,
                    interest: written_off.interest,
                    penalty: written_off.penalty,
                },
                lines_changed: false,
                closed: false,
                written_off: true,
            });
        }

        let outstanding = match component {
            WaiverComponent::Interest => loan.outstanding_interest,
            WaiverComponent::Penalty => loan.outstanding_penalty,
            WaiverComponent::Principal => loan.outstanding_principal,
            WaiverComponent::Full => loan.total_outstanding,
        };
        if !amount.is_positive() || amount > outstanding {
            return Err(LoanError::invalid_amount(&format!("{} waiver", component), amount));
        }

        match component {
            WaiverComponent::Interest => loan.outstanding_interest -= amount,
            WaiverComponent::Penalty => loan.outstanding_penalty -= amount,
            WaiverComponent::Principal => loan.outstanding_principal -= amount,
            WaiverComponent::Full => {}
        }
        loan.total_waived += amount;
        loan.recompute_total();
        loan.updated_at = now;

        let lines_changed = match self.policy {
            WaiverSchedulePolicy::Advisory => false,
            WaiverSchedulePolicy::Regenerate => {
                match component {
                    WaiverComponent::Penalty => reduce_penalties(lines, amount),
                    _ => respread_unpaid(lines, loan),
                }
                for line in lines.iter_mut() {
                    settle_or_refresh(line, today);
                }
                true
            }
        };

        let closed = loan.close_if_settled(self.tolerance, today);

        Ok(WaiverOutcome {
            component,
            amount,
            ledger_event: LedgerEvent::Waiver { component, amount },
            lines_changed,
            closed,
            written_off: false,
        })
    }
}

/// spread the account's principal and interest over the unpaid lines, keeping what was already paid
fn respread_unpaid(lines: &mut [ScheduleLine], loan: &LoanAccount) {
    let mut unpaid: Vec<&mut ScheduleLine> = lines.iter_mut().filter(|l| !l.is_paid()).collect();
    if unpaid.is_empty() {
        return;
    }
    unpaid.sort_by_key(|l| l.installment);
    let n = unpaid.len() as u32;

    let principal = loan.outstanding_principal.split_even(n);
    let interest = loan.outstanding_interest.split_even(n);

    for ((line, p), i) in unpaid.into_iter().zip(principal).zip(interest) {
        line.principal_due = line.principal_paid + p;
        line.interest_due = line.interest_paid + i;
        line.recompute();
    }
}

/// waive penalties oldest line first
fn reduce_penalties(lines: &mut [ScheduleLine], amount: Money) {
    let mut remaining = amount;
    let mut order: Vec<&mut ScheduleLine> = lines.iter_mut().collect();
    order.sort_by_key(|l| (l.due_date, l.installment));
    for line in order {
        if !remaining.is_positive() {
            break;
        }
        let cut = remaining.min(line.outstanding_penalty());
        line.penalty_due -= cut;
        remaining -= cut;
    }
}

fn settle_or_refresh(line: &mut ScheduleLine, today: NaiveDate) {
    if line.is_paid() {
        return;
    }
    if line.amount_owed().is_zero() {
        line.status = ScheduleStatus::Paid;
        line.paid_date = Some(today);
    } else {
        line.refresh_status(today);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::interest::InterestEngine;
    use crate::schedule::ScheduleBuilder;
    use crate::types::{InterestStrategy, LoanStatus, LoanTerms, PaymentMethod};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// 12000 at 10% a month flat over 12: 1000 principal + 1200 interest per line
    fn setup() -> (LoanAccount, Vec<ScheduleLine>, NaiveDate) {
        let terms = LoanTerms::monthly(
            Money::from_major(12_000),
            Rate::from_percentage(10),
            12,
            InterestStrategy::FlatRate,
        );
        let template = InterestEngine::generate_schedule(&terms).unwrap();
        let today = date(2024, 1, 1);
        let loan = LoanAccount::new(
            Uuid::new_v4(),
            "LN-W".to_string(),
            terms,
            template.total_interest,
            today,
            PaymentMethod::Bank,
            Utc::now(),
        );
        let lines = ScheduleBuilder::new(terms.period_unit)
            .build(loan.id, &template, today, today)
            .unwrap();
        (loan, lines, today)
    }

    fn advisory() -> WaiverEngine {
        WaiverEngine::new(Money::CENT, WaiverSchedulePolicy::Advisory)
    }

    #[test]
    fn test_partial_interest_waiver_advisory() {
        let (mut loan, mut lines, today) = setup();
        let before = lines.clone();

        let outcome = advisory()
            .waive(&mut loan, &mut lines, WaiverComponent::Interest, Money::from_major(2_400), today, Utc::now())
            .unwrap();

        assert_eq!(loan.outstanding_interest, Money::from_major(12_000));
        assert_eq!(loan.total_outstanding, Money::from_major(24_000));
        assert_eq!(loan.total_waived, Money::from_major(2_400));
        assert_eq!(
            outcome.ledger_event,
            LedgerEvent::Waiver { component: WaiverComponent::Interest, amount: Money::from_major(2_400) }
        );
        assert!(!outcome.lines_changed);
        assert_eq!(lines, before);
    }

    #[test]
    fn test_waiver_bounds() {
        let (mut loan, mut lines, today) = setup();
        let engine = advisory();

        for amount in [Money::ZERO, Money::from_major(-1), Money::from_major(14_401)] {
            assert!(matches!(
                engine.waive(&mut loan, &mut lines, WaiverComponent::Interest, amount, today, Utc::now()),
                Err(LoanError::InvalidAmount { .. })
            ));
        }
        // nothing to waive
        assert!(matches!(
            engine.waive(&mut loan, &mut lines, WaiverComponent::Penalty, Money::from_major(1), today, Utc::now()),
            Err(LoanError::InvalidAmount { .. })
        ));
        assert_eq!(loan.total_outstanding, Money::from_major(26_400));
    }

    #[test]
    fn test_full_waiver_writes_off() {
        let (mut loan, mut lines, today) = setup();
        let engine = advisory();

        let outcome = engine
            .waive(&mut loan, &mut lines, WaiverComponent::Full, Money::ZERO, today, Utc::now())
            .unwrap();

        assert!(outcome.written_off);
        assert_eq!(outcome.amount, Money::from_major(26_400));
        assert_eq!(
            outcome.ledger_event,
            LedgerEvent::WriteOff {
                principal: Money::from_major(12_000),
                interest: Money::from_major(14_400),
                penalty: Money::ZERO,
            }
        );
        assert_eq!(loan.status, LoanStatus::WrittenOff);
        assert!(loan.total_outstanding.is_zero());

        assert!(matches!(
            engine.waive(&mut loan, &mut lines, WaiverComponent::Interest, Money::from_major(1), today, Utc::now()),
            Err(LoanError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_waiver_to_zero_closes_loan() {
        let (mut loan, mut lines, today) = setup();
        let engine = advisory();
        engine
            .waive(&mut loan, &mut lines, WaiverComponent::Interest, Money::from_major(14_400), today, Utc::now())
            .unwrap();
        let outcome = engine
            .waive(&mut loan, &mut lines, WaiverComponent::Principal, Money::from_minor(1_199_999), today, Utc::now())
            .unwrap();

        // 0.01 left is within tolerance
        assert!(outcome.closed);
        assert_eq!(loan.status, LoanStatus::Closed);
    }

    #[test]
    fn test_regenerate_respreads_unpaid_lines() {
        let (mut loan, mut lines, today) = setup();
        let engine = WaiverEngine::new(Money::CENT, WaiverSchedulePolicy::Regenerate);

        let outcome = engine
            .waive(&mut loan, &mut lines, WaiverComponent::Interest, Money::from_major(2_400), today, Utc::now())
            .unwrap();

        assert!(outcome.lines_changed);
        assert!(lines.iter().all(|l| l.interest_due == Money::from_major(1_000)));
        let scheduled: Money = lines.iter().map(|l| l.outstanding_total).sum();
        assert_eq!(scheduled, loan.total_outstanding);
        assert!(lines.iter().all(|l| l.invariants_hold()));
    }

    #[test]
    fn test_regenerate_reduces_penalty_oldest_first() {
        let (mut loan, mut lines, today) = setup();
        lines[0].add_penalty(Money::from_major(40));
        lines[1].add_penalty(Money::from_major(40));
        loan.outstanding_penalty = Money::from_major(80);
        loan.recompute_total();

        WaiverEngine::new(Money::CENT, WaiverSchedulePolicy::Regenerate)
            .waive(&mut loan, &mut lines, WaiverComponent::Penalty, Money::from_major(50), today, Utc::now())
            .unwrap();

        assert!(lines[0].outstanding_penalty().is_zero());
        assert_eq!(lines[1].outstanding_penalty(), Money::from_major(30));
        assert_eq!(loan.outstanding_penalty, Money::from_major(30));
    }
}
