/// quick start - book a loan, take a repayment, print the statement
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use loan_ledger_rs::{
    BookLoanRequest, EngineConfig, InMemoryStore, InterestStrategy, LoanService, LoanTerms, Money,
    PaymentMethod, Rate, RepaymentRequest, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()));
    let store = Arc::new(InMemoryStore::new());
    let service = LoanService::new(EngineConfig::sacco_default(), store, &time)?;

    // 12,000 over 12 months at 1% a month, flat
    let booked = service.book_loan(
        BookLoanRequest {
            reference: "LN-0001".to_string(),
            terms: LoanTerms::monthly(
                Money::from_major(12_000),
                Rate::from_percentage(1),
                12,
                InterestStrategy::FlatRate,
            ),
            disbursement_date: None,
            payment_method: PaymentMethod::MobileMoney,
        },
        &time,
    )?;

    // first installment plus a little extra
    let outcome = service.apply_repayment(booked.loan.id, RepaymentRequest::new(Money::from_major(1_500)), &time)?;
    println!(
        "paid {}: interest {}, principal {}, outstanding {}",
        outcome.amount, outcome.applied.interest, outcome.applied.principal, outcome.total_outstanding
    );

    println!("{}", service.statement(booked.loan.id, &time)?.to_json_pretty()?);

    Ok(())
}
