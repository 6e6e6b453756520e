use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::interest::{InterestEngine, PenaltyEngine};
use crate::ledger::{
    ChartOfAccounts, FailedPosting, JournalEntry, LedgerEvent, LedgerPoster, PostingRequest,
    ReconciliationQueue,
};
use crate::loan::{ComponentSplit, LoanAccount};
use crate::payments::{AllocationResult, PaymentAllocator};
use crate::restructure::{RestructureChange, RestructureEngine};
use crate::schedule::{ScheduleBuilder, ScheduleLine};
use crate::serialization::LoanStatement;
use crate::store::{InMemoryStore, JournalRepository, LoanLocks, LoanRepository, ScheduleRepository};
use crate::types::{LoanId, LoanStatus, LoanTerms, PaymentMethod, WaiverComponent};
use crate::waiver::WaiverEngine;

/// new loan to disburse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLoanRequest {
    pub reference: String,
    pub terms: LoanTerms,
    /// defaults to today
    pub disbursement_date: Option<NaiveDate>,
    pub payment_method: PaymentMethod,
}

/// existing loan migrated with its repayment history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLoanRequest {
    pub reference: String,
    pub terms: LoanTerms,
    pub disbursement_date: NaiveDate,
    pub total_paid: Money,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentRequest {
    pub amount: Money,
    /// defaults to the loan's disbursement channel
    pub method: Option<PaymentMethod>,
    /// defaults to today
    pub paid_on: Option<NaiveDate>,
}

impl RepaymentRequest {
    pub fn new(amount: Money) -> Self {
        Self {
            amount,
            method: None,
            paid_on: None,
        }
    }
}

/// what happened to the journal of a business operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingStatus {
    Posted { entry_id: Uuid },
    /// queued for reconciliation; the business operation stands
    Queued { queue_id: Uuid, error: String },
    NotRequired,
}

impl PostingStatus {
    pub fn is_posted(&self) -> bool {
        matches!(self, PostingStatus::Posted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedLoan {
    pub loan: LoanAccount,
    pub schedule: Vec<ScheduleLine>,
    pub journal: PostingStatus,
}

/// result of a repayment, handed to notification layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentOutcome {
    pub loan_id: LoanId,
    pub amount: Money,
    pub allocation: AllocationResult,
    /// split as booked against the account
    pub applied: ComponentSplit,
    pub unallocated: Money,
    pub outstanding_principal: Money,
    pub outstanding_interest: Money,
    pub outstanding_penalty: Money,
    pub total_outstanding: Money,
    pub status: LoanStatus,
    pub journal: PostingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestructureOutcome {
    pub loan: LoanAccount,
    pub old_term: u32,
    pub new_term: u32,
    pub new_interest: Money,
    pub installment: Money,
    pub discarded_lines: usize,
    pub schedule: Vec<ScheduleLine>,
    pub journal: PostingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaiverResult {
    pub component: WaiverComponent,
    pub amount: Money,
    pub loan: LoanAccount,
    pub journal: PostingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub loan_id: LoanId,
    pub overdue_lines: usize,
    pub penalties_assessed: Money,
    pub previous_status: LoanStatus,
    pub status: LoanStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub posted: Vec<Uuid>,
    pub still_failing: usize,
}

/// orchestrates bookings, repayments, restructures and waivers over the repositories
pub struct LoanService {
    config: EngineConfig,
    loans: Arc<dyn LoanRepository>,
    schedules: Arc<dyn ScheduleRepository>,
    journals: Arc<dyn JournalRepository>,
    poster: LedgerPoster,
    allocator: PaymentAllocator,
    restructurer: RestructureEngine,
    waivers: WaiverEngine,
    penalties: Option<PenaltyEngine>,
    locks: LoanLocks,
    reconciliation: ReconciliationQueue,
    events: Mutex<EventStore>,
}

impl LoanService {
    /// service over a single in-memory store
    pub fn new(
        config: EngineConfig,
        store: Arc<InMemoryStore>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Self> {
        Self::with_repositories(
            config,
            store.clone(),
            store.clone(),
            store.clone(),
            store.as_ref(),
            time_provider,
        )
    }

    pub fn with_repositories(
        config: EngineConfig,
        loans: Arc<dyn LoanRepository>,
        schedules: Arc<dyn ScheduleRepository>,
        journals: Arc<dyn JournalRepository>,
        chart: &dyn ChartOfAccounts,
        time_provider: &SafeTimeProvider,
    ) -> Result<Self> {
        let mut events = EventStore::new();
        let poster = LedgerPoster::new(&config, chart, time_provider, &mut events)?;

        info!(
            version = %config.version,
            recognition = ?config.interest_recognition,
            "loan service ready"
        );

        Ok(Self {
            allocator: PaymentAllocator::new(),
            restructurer: RestructureEngine::new(config.max_restructure_term),
            waivers: WaiverEngine::new(config.rounding_tolerance, config.waiver_schedule_policy),
            penalties: config.penalty.map(PenaltyEngine::new),
            locks: LoanLocks::new(),
            reconciliation: ReconciliationQueue::new(),
            events: Mutex::new(events),
            config,
            loans,
            schedules,
            journals,
            poster,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // booking

    #[instrument(skip(self, request, time_provider), fields(reference = %request.reference))]
    pub fn book_loan(
        &self,
        request: BookLoanRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<BookedLoan> {
        let now = time_provider.now();
        let today = now.date_naive();
        let anchor = request.disbursement_date.unwrap_or(today);

        let template = InterestEngine::generate_schedule(&request.terms)?;
        let loan_id = Uuid::new_v4();
        let schedule = ScheduleBuilder::new(request.terms.period_unit).build(loan_id, &template, anchor, today)?;

        let mut loan = LoanAccount::new(
            loan_id,
            request.reference,
            request.terms,
            template.total_interest,
            anchor,
            request.payment_method,
            now,
        );
        loan.update_status(&schedule, today, self.config.default_after_days);

        self.locks.with_loan(loan_id, || {
            self.loans.create_loan(&loan)?;
            self.schedules.insert_lines(&schedule)?;

            self.emit(Event::LoanBooked {
                loan_id,
                principal: loan.principal,
                total_interest: template.total_interest,
                term: loan.term,
                disbursement_date: anchor,
                timestamp: now,
            });
            info!(
                loan_id = %loan_id,
                principal = %loan.principal,
                total_interest = %template.total_interest,
                term = loan.term,
                "loan booked"
            );

            let journal = self.post(
                PostingRequest::new(
                    loan_id,
                    journal_reference("DSB", &loan.reference),
                    anchor,
                    format!("disbursement of {}", loan.reference),
                    LedgerEvent::Disbursement {
                        principal: loan.principal,
                        scheduled_interest: template.total_interest,
                        method: loan.payment_method,
                    },
                ),
                now,
            );

            Ok(BookedLoan {
                loan: loan.clone(),
                schedule: schedule.clone(),
                journal,
            })
        })
    }

    /// migrate a backdated loan, distributing its known repayments oldest-first.
    ///
    /// Money already moved before the import, so no journal is written.
    #[instrument(skip(self, request, time_provider), fields(reference = %request.reference))]
    pub fn import_loan(
        &self,
        request: ImportLoanRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<BookedLoan> {
        let now = time_provider.now();
        let today = now.date_naive();

        let template = InterestEngine::generate_schedule(&request.terms)?;
        let loan_id = Uuid::new_v4();
        let schedule = ScheduleBuilder::new(request.terms.period_unit).build_with_history(
            loan_id,
            &template,
            request.disbursement_date,
            today,
            request.total_paid,
        )?;

        let mut loan = LoanAccount::new(
            loan_id,
            request.reference,
            request.terms,
            template.total_interest,
            request.disbursement_date,
            request.payment_method,
            now,
        );
        loan.sync_from_schedule(&schedule);
        loan.total_principal_paid = schedule.iter().map(|l| l.principal_paid).sum();
        loan.total_interest_paid = schedule.iter().map(|l| l.interest_paid).sum();
        if !loan.close_if_settled(self.config.rounding_tolerance, today) {
            loan.update_status(&schedule, today, self.config.default_after_days);
        }

        self.locks.with_loan(loan_id, || {
            self.loans.create_loan(&loan)?;
            self.schedules.insert_lines(&schedule)?;

            self.emit(Event::LoanImported {
                loan_id,
                principal: loan.principal,
                total_paid: request.total_paid,
                total_outstanding: loan.total_outstanding,
                timestamp: now,
            });
            info!(
                loan_id = %loan_id,
                total_paid = %request.total_paid,
                total_outstanding = %loan.total_outstanding,
                status = %loan.status,
                "loan imported"
            );

            Ok(BookedLoan {
                loan: loan.clone(),
                schedule: schedule.clone(),
                journal: PostingStatus::NotRequired,
            })
        })
    }

    // ---------------------------------------------------------------------
    // repayments

    #[instrument(skip(self, request, time_provider), fields(loan_id = %loan_id, amount = %request.amount))]
    pub fn apply_repayment(
        &self,
        loan_id: LoanId,
        request: RepaymentRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<RepaymentOutcome> {
        if !request.amount.is_positive() {
            return Err(LoanError::invalid_amount("payment", request.amount));
        }
        let now = time_provider.now();
        let today = now.date_naive();
        let paid_on = request.paid_on.unwrap_or(today);

        self.locks.with_loan(loan_id, || {
            let mut loan = self.load_loan(loan_id)?;
            loan.ensure_open("apply repayment")?;
            let mut lines = self.load_schedule(loan_id)?;

            // never collect more than the account owes
            let collectable = request.amount.min(loan.total_outstanding);
            let allocation = self.allocator.allocate(collectable, paid_on, today, &mut lines)?;

            let touched: Vec<ScheduleLine> = lines
                .iter()
                .filter(|l| allocation.allocations.iter().any(|a| a.line_id == l.id))
                .cloned()
                .collect();
            self.schedules.update_lines(&touched)?;

            let applied = loan.apply_allocation(&allocation, now);
            let unallocated = request.amount - applied.applied();
            let previous = loan.status;

            if loan.close_if_settled(self.config.rounding_tolerance, today) {
                self.emit_status_change(&loan, previous, "repaid in full", now);
                self.emit(Event::LoanClosed {
                    loan_id,
                    closed_date: today,
                    timestamp: now,
                });
            } else if let Some(old) = loan.update_status(&lines, today, self.config.default_after_days) {
                self.emit_status_change(&loan, old, "repayment", now);
            }
            self.loans.update_loan(&loan)?;

            self.emit(Event::RepaymentApplied {
                loan_id,
                amount: request.amount,
                applied_to_penalty: applied.penalty,
                applied_to_interest: applied.interest,
                applied_to_principal: applied.principal,
                unallocated,
                lines_touched: allocation.allocations.len(),
                timestamp: now,
            });
            info!(
                penalty = %applied.penalty,
                interest = %applied.interest,
                principal = %applied.principal,
                unallocated = %unallocated,
                total_outstanding = %loan.total_outstanding,
                status = %loan.status,
                "repayment applied"
            );
            if unallocated.is_positive() {
                warn!(unallocated = %unallocated, "payment exceeds amount owed");
            }

            let journal = self.post(
                PostingRequest::new(
                    loan_id,
                    journal_reference("RPY", &loan.reference),
                    paid_on,
                    format!("repayment on {}", loan.reference),
                    LedgerEvent::Repayment {
                        method: request.method.unwrap_or(loan.payment_method),
                        penalty: applied.penalty,
                        interest: applied.interest,
                        principal: applied.principal,
                    },
                ),
                now,
            );

            Ok(RepaymentOutcome {
                loan_id,
                amount: request.amount,
                allocation,
                applied,
                unallocated,
                outstanding_principal: loan.outstanding_principal,
                outstanding_interest: loan.outstanding_interest,
                outstanding_penalty: loan.outstanding_penalty,
                total_outstanding: loan.total_outstanding,
                status: loan.status,
                journal,
            })
        })
    }

    // ---------------------------------------------------------------------
    // restructures

    pub fn extend_loan_term(
        &self,
        loan_id: LoanId,
        new_term: u32,
        time_provider: &SafeTimeProvider,
    ) -> Result<RestructureOutcome> {
        self.restructure(loan_id, RestructureChange::ExtendTerm { new_term }, time_provider)
    }

    /// `annual_rate` replaces the loan's rate over the remaining installments
    pub fn change_interest_rate(
        &self,
        loan_id: LoanId,
        annual_rate: Rate,
        time_provider: &SafeTimeProvider,
    ) -> Result<RestructureOutcome> {
        self.restructure(loan_id, RestructureChange::ChangeRate { annual_rate }, time_provider)
    }

    pub fn reduce_installment(
        &self,
        loan_id: LoanId,
        target: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<RestructureOutcome> {
        self.restructure(loan_id, RestructureChange::ReduceInstallment { target }, time_provider)
    }

    pub fn restructure_terms(
        &self,
        loan_id: LoanId,
        new_term: u32,
        annual_rate: Rate,
        time_provider: &SafeTimeProvider,
    ) -> Result<RestructureOutcome> {
        self.restructure(
            loan_id,
            RestructureChange::Terms { new_term, annual_rate },
            time_provider,
        )
    }

    #[instrument(skip(self, time_provider), fields(loan_id = %loan_id))]
    fn restructure(
        &self,
        loan_id: LoanId,
        change: RestructureChange,
        time_provider: &SafeTimeProvider,
    ) -> Result<RestructureOutcome> {
        let now = time_provider.now();
        let today = now.date_naive();

        self.locks.with_loan(loan_id, || {
            let mut loan = self.load_loan(loan_id)?;
            let lines = self.load_schedule(loan_id)?;
            let plan = self.restructurer.plan(&loan, &lines, change, today)?;

            self.schedules.delete_unpaid_lines(loan_id)?;
            self.schedules.insert_lines(&plan.new_lines)?;
            self.restructurer.apply(&mut loan, &plan, now);
            self.loans.update_loan(&loan)?;

            self.emit(Event::LoanRestructured {
                loan_id,
                old_term: plan.old_term,
                new_term: plan.new_term,
                old_rate: plan.old_rate,
                new_rate: plan.new_rate,
                new_total_outstanding: plan.new_total_outstanding,
                timestamp: now,
            });
            info!(
                old_term = plan.old_term,
                new_term = plan.new_term,
                new_interest = %plan.new_interest,
                installment = %plan.installment,
                discarded = plan.discarded_lines,
                "loan restructured"
            );

            let journal = self.post(
                PostingRequest::new(
                    loan_id,
                    journal_reference("RST", &loan.reference),
                    today,
                    format!("restructure of {}: {} -> {} periods", loan.reference, plan.old_term, plan.new_term),
                    LedgerEvent::RestructureMemo {
                        interest_adjustment: plan.interest_adjustment,
                    },
                ),
                now,
            );

            Ok(RestructureOutcome {
                schedule: self.load_schedule(loan_id)?,
                loan,
                old_term: plan.old_term,
                new_term: plan.new_term,
                new_interest: plan.new_interest,
                installment: plan.installment,
                discarded_lines: plan.discarded_lines,
                journal,
            })
        })
    }

    // ---------------------------------------------------------------------
    // waivers

    pub fn waive_interest(
        &self,
        loan_id: LoanId,
        amount: Money,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<WaiverResult> {
        self.waive(loan_id, WaiverComponent::Interest, amount, reason, time_provider)
    }

    pub fn waive_penalty(
        &self,
        loan_id: LoanId,
        amount: Money,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<WaiverResult> {
        self.waive(loan_id, WaiverComponent::Penalty, amount, reason, time_provider)
    }

    pub fn waive_principal(
        &self,
        loan_id: LoanId,
        amount: Money,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<WaiverResult> {
        self.waive(loan_id, WaiverComponent::Principal, amount, reason, time_provider)
    }

    /// write the whole balance off
    pub fn waive_full(
        &self,
        loan_id: LoanId,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<WaiverResult> {
        self.waive(loan_id, WaiverComponent::Full, Money::ZERO, reason, time_provider)
    }

    #[instrument(skip(self, time_provider), fields(loan_id = %loan_id, component = %component))]
    fn waive(
        &self,
        loan_id: LoanId,
        component: WaiverComponent,
        amount: Money,
        reason: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<WaiverResult> {
        let now = time_provider.now();
        let today = now.date_naive();

        self.locks.with_loan(loan_id, || {
            let mut loan = self.load_loan(loan_id)?;
            let mut lines = self.load_schedule(loan_id)?;
            let previous = loan.status;

            let outcome = self.waivers.waive(&mut loan, &mut lines, component, amount, today, now)?;

            if outcome.lines_changed {
                self.schedules.update_lines(&lines)?;
            }
            self.loans.update_loan(&loan)?;

            if outcome.written_off {
                self.emit_status_change(&loan, previous, reason, now);
                self.emit(Event::LoanWrittenOff {
                    loan_id,
                    amount: outcome.amount,
                    timestamp: now,
                });
                warn!(amount = %outcome.amount, reason, "loan written off");
            } else {
                self.emit(Event::WaiverApplied {
                    loan_id,
                    component,
                    amount: outcome.amount,
                    reason: reason.to_string(),
                    timestamp: now,
                });
                info!(amount = %outcome.amount, reason, "waiver applied");
            }
            if outcome.closed {
                self.emit_status_change(&loan, previous, "waived to zero", now);
                self.emit(Event::LoanClosed {
                    loan_id,
                    closed_date: today,
                    timestamp: now,
                });
            }

            let prefix = if outcome.written_off { "WOF" } else { "WVR" };
            let journal = self.post(
                PostingRequest::new(
                    loan_id,
                    journal_reference(prefix, &loan.reference),
                    today,
                    format!("{} waiver on {}: {}", component, loan.reference, reason),
                    outcome.ledger_event.clone(),
                ),
                now,
            );

            Ok(WaiverResult {
                component,
                amount: outcome.amount,
                loan,
                journal,
            })
        })
    }

    // ---------------------------------------------------------------------
    // arrears

    /// refresh line statuses, assess late penalties and move the loan's arrears status
    #[instrument(skip(self, time_provider), fields(loan_id = %loan_id))]
    pub fn run_overdue_sweep(
        &self,
        loan_id: LoanId,
        time_provider: &SafeTimeProvider,
    ) -> Result<SweepReport> {
        let now = time_provider.now();
        let today = now.date_naive();

        self.locks.with_loan(loan_id, || {
            let mut loan = self.load_loan(loan_id)?;
            let previous_status = loan.status;
            if loan.status.is_terminal() {
                return Ok(SweepReport {
                    loan_id,
                    overdue_lines: 0,
                    penalties_assessed: Money::ZERO,
                    previous_status,
                    status: loan.status,
                });
            }

            let mut lines = self.load_schedule(loan_id)?;
            let mut penalties_assessed = Money::ZERO;

            for line in lines.iter_mut().filter(|l| !l.is_paid()) {
                line.refresh_status(today);

                let Some(engine) = &self.penalties else { continue };
                // one penalty per installment
                if !line.is_past_due(today) || line.penalty_assessed() {
                    continue;
                }
                let days = line.days_past_due(today);
                let calc = engine.calculate_penalty(line.outstanding_total, days);
                if calc.penalty_amount.is_positive() {
                    line.assess_penalty(calc.penalty_amount, today);
                    penalties_assessed += calc.penalty_amount;
                    self.emit(Event::PenaltyAssessed {
                        loan_id,
                        installment: line.installment,
                        amount: calc.penalty_amount,
                        days_overdue: days,
                        timestamp: now,
                    });
                }
            }
            self.schedules.update_lines(&lines)?;

            loan.outstanding_penalty += penalties_assessed;
            loan.recompute_total();
            loan.updated_at = now;
            if let Some(old) = loan.update_status(&lines, today, self.config.default_after_days) {
                self.emit_status_change(&loan, old, "overdue sweep", now);
            }
            self.loans.update_loan(&loan)?;

            let overdue_lines = lines.iter().filter(|l| l.is_past_due(today)).count();
            if overdue_lines > 0 {
                warn!(
                    overdue_lines,
                    penalties = %penalties_assessed,
                    status = %loan.status,
                    "loan in arrears"
                );
            }

            Ok(SweepReport {
                loan_id,
                overdue_lines,
                penalties_assessed,
                previous_status,
                status: loan.status,
            })
        })
    }

    // ---------------------------------------------------------------------
    // ledger reconciliation

    /// re-attempt every queued posting
    #[instrument(skip(self, time_provider))]
    pub fn retry_failed_postings(&self, time_provider: &SafeTimeProvider) -> RetryReport {
        let now = time_provider.now();
        let mut report = RetryReport::default();

        for item in self.reconciliation.pending() {
            match self.poster.post(&item.request, self.journals.as_ref(), now) {
                Ok(entry) => {
                    self.reconciliation.resolve(item.id);
                    self.emit_posted(&entry, now);
                    report.posted.push(entry.id);
                }
                Err(e) => {
                    warn!(reference = %item.request.reference, error = %e, attempts = item.attempts + 1, "posting retry failed");
                    self.reconciliation.record_retry_failure(item.id, e.to_string(), now);
                    report.still_failing += 1;
                }
            }
        }

        info!(posted = report.posted.len(), still_failing = report.still_failing, "reconciliation retry finished");
        report
    }

    pub fn pending_reconciliation(&self) -> Vec<FailedPosting> {
        self.reconciliation.pending()
    }

    // ---------------------------------------------------------------------
    // queries

    pub fn loan(&self, loan_id: LoanId) -> Result<LoanAccount> {
        self.load_loan(loan_id)
    }

    pub fn schedule(&self, loan_id: LoanId) -> Result<Vec<ScheduleLine>> {
        self.load_schedule(loan_id)
    }

    pub fn journal_entries(&self, loan_id: LoanId) -> Result<Vec<JournalEntry>> {
        self.journals.entries_for_loan(loan_id)
    }

    pub fn statement(&self, loan_id: LoanId, time_provider: &SafeTimeProvider) -> Result<LoanStatement> {
        let loan = self.load_loan(loan_id)?;
        let schedule = self.load_schedule(loan_id)?;
        let journals = self.journals.entries_for_loan(loan_id)?;
        Ok(LoanStatement::build(&loan, schedule, &journals, time_provider.now().date_naive()))
    }

    pub fn take_events(&self) -> Vec<Event> {
        self.event_store().take_events()
    }

    // ---------------------------------------------------------------------
    // helpers

    fn load_loan(&self, loan_id: LoanId) -> Result<LoanAccount> {
        self.loans
            .get_loan(loan_id)?
            .ok_or(LoanError::LoanNotFound { loan_id })
    }

    fn load_schedule(&self, loan_id: LoanId) -> Result<Vec<ScheduleLine>> {
        let lines = self.schedules.lines_for_loan(loan_id)?;
        if lines.is_empty() {
            return Err(LoanError::ScheduleNotFound { loan_id });
        }
        Ok(lines)
    }

    /// post a journal; failure is logged and queued, never propagated
    fn post(&self, request: PostingRequest, now: DateTime<Utc>) -> PostingStatus {
        match self.poster.post(&request, self.journals.as_ref(), now) {
            Ok(entry) => {
                self.emit_posted(&entry, now);
                PostingStatus::Posted { entry_id: entry.id }
            }
            Err(e) => {
                error!(
                    loan_id = %request.loan_id,
                    reference = %request.reference,
                    entry_type = %request.entry_type(),
                    error = %e,
                    "ledger posting failed, queued for reconciliation"
                );
                self.emit(Event::LedgerPostingFailed {
                    loan_id: request.loan_id,
                    entry_type: request.entry_type(),
                    reference: request.reference.clone(),
                    error: e.to_string(),
                    timestamp: now,
                });
                let error = e.to_string();
                let queue_id = self.reconciliation.push(request, error.clone(), now);
                PostingStatus::Queued { queue_id, error }
            }
        }
    }

    fn emit_posted(&self, entry: &JournalEntry, now: DateTime<Utc>) {
        self.emit(Event::JournalPosted {
            loan_id: entry.loan_id,
            entry_id: entry.id,
            entry_type: entry.entry_type,
            reference: entry.reference.clone(),
            amount: entry.amount(),
            timestamp: now,
        });
    }

    fn emit_status_change(&self, loan: &LoanAccount, old: LoanStatus, reason: &str, now: DateTime<Utc>) {
        if old == loan.status {
            return;
        }
        info!(loan_id = %loan.id, from = %old, to = %loan.status, reason, "loan status changed");
        self.emit(Event::StatusChanged {
            loan_id: loan.id,
            old_status: old,
            new_status: loan.status,
            reason: reason.to_string(),
            timestamp: now,
        });
    }

    fn emit(&self, event: Event) {
        self.event_store().emit(event);
    }

    fn event_store(&self) -> MutexGuard<'_, EventStore> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn journal_reference(prefix: &str, loan_reference: &str) -> String {
    format!("{}-{}-{}", prefix, loan_reference, Uuid::new_v4().simple())
}
