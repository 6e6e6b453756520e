/// restructure and waiver - arrears, penalties, a term extension and a write-off
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use loan_ledger_rs::{
    BookLoanRequest, EngineConfig, InMemoryStore, InterestStrategy, LoanService, LoanTerms, Money,
    PaymentMethod, Rate, RepaymentRequest, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()));
    let control = time.test_control().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let service = LoanService::new(EngineConfig::sacco_with_penalties(), store.clone(), &time)?;

    let loan_id = service
        .book_loan(
            BookLoanRequest {
                reference: "LN-0002".to_string(),
                terms: LoanTerms::monthly(
                    Money::from_major(50_000),
                    Rate::from_percentage(2),
                    12,
                    InterestStrategy::ReducingBalance,
                ),
                disbursement_date: None,
                payment_method: PaymentMethod::Bank,
            },
            &time,
        )?
        .loan
        .id;

    // member misses the first installment
    control.advance(Duration::days(45));
    let sweep = service.run_overdue_sweep(loan_id, &time)?;
    println!("{:?} -> {:?}, penalties {}", sweep.previous_status, sweep.status, sweep.penalties_assessed);

    // waive the penalty, catch up, then stretch the rest over two years
    service.waive_penalty(loan_id, sweep.penalties_assessed, "first default, goodwill", &time)?;
    let arrears: Money = service
        .schedule(loan_id)?
        .iter()
        .filter(|l| l.is_past_due(time.now().date_naive()))
        .map(|l| l.amount_owed())
        .sum();
    service.apply_repayment(loan_id, RepaymentRequest::new(arrears), &time)?;

    let restructured = service.extend_loan_term(loan_id, 24, &time)?;
    println!(
        "restructured {} -> {} periods, installment {}, outstanding {}",
        restructured.old_term, restructured.new_term, restructured.installment, restructured.loan.total_outstanding
    );

    // the member leaves the society
    let written = service.waive_full(loan_id, "member exit", &time)?;
    println!("written off {} ({})", written.amount, written.loan.status);

    for entry in service.journal_entries(loan_id)? {
        println!("{:<16} {:>12} {}", entry.entry_type, entry.amount(), entry.reference);
    }
    for event in service.take_events() {
        println!("{:?}", event);
    }

    Ok(())
}
