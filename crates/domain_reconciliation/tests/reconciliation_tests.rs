//! Integration tests for domain_reconciliation

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use core_kernel::{AccountId, Currency, Money, TransactionId};
use domain_ledger::{Account, AccountType, EntryDraft, GeneralLedger};
use domain_reconciliation::{ReconciliationStatus, ReconciliationTracker};

fn usd(amount: rust_decimal::Decimal) -> Money {
    Money::new(amount, Currency::USD)
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

/// A full statement month: opening balance, three cleared entries, one
/// uncleared, exact tie-out, and the stamp on the account.
#[test]
fn test_statement_month() {
    let mut ledger = GeneralLedger::new(Currency::USD);
    let checking = AccountId::new();
    let sales = AccountId::new();
    let rent = AccountId::new();
    ledger
        .register_account(
            Account::new(checking, "1000", "Checking", AccountType::Bank, Currency::USD)
                .with_opening_balance(usd(dec!(10000.00))),
        )
        .unwrap();
    ledger
        .register_account(Account::new(sales, "4000", "Sales", AccountType::Income, Currency::USD))
        .unwrap();
    ledger
        .register_account(Account::new(rent, "5100", "Rent", AccountType::Expense, Currency::USD))
        .unwrap();

    // Two receipts and one rent cheque clear during the month
    let mut bank_entries = Vec::new();
    for (amount, day) in [(dec!(1200.00), 5), (dec!(800.00), 12)] {
        let ids = ledger
            .post(
                TransactionId::new_v7(),
                date(6, day),
                &[
                    EntryDraft::debit(checking, usd(amount)),
                    EntryDraft::credit(sales, usd(amount)),
                ],
            )
            .unwrap();
        bank_entries.push(ids[0]);
    }
    let ids = ledger
        .post(
            TransactionId::new_v7(),
            date(6, 20),
            &[
                EntryDraft::debit(rent, usd(dec!(2200.00))),
                EntryDraft::credit(checking, usd(dec!(2200.00))),
            ],
        )
        .unwrap();
    bank_entries.push(ids[1]);

    // A late deposit has not hit the statement yet
    ledger
        .post(
            TransactionId::new_v7(),
            date(6, 30),
            &[
                EntryDraft::debit(checking, usd(dec!(500.00))),
                EntryDraft::credit(sales, usd(dec!(500.00))),
            ],
        )
        .unwrap();

    // 10000 + 1200 + 800 - 2200 = 9800
    let mut tracker = ReconciliationTracker::new();
    let session = tracker
        .start(checking, date(6, 30), usd(dec!(9800.00)), &ledger)
        .unwrap();
    for id in &bank_entries {
        tracker.match_entry(&session, id, &ledger).unwrap();
    }
    tracker.complete(&session, &mut ledger).unwrap();

    assert_eq!(
        tracker.session(&session).unwrap().status,
        ReconciliationStatus::Completed
    );
    let account = ledger.account(&checking).unwrap();
    assert_eq!(account.last_reconciled_date, Some(date(6, 30)));
    assert_eq!(
        account.last_reconciled_balance.map(|m| m.amount()),
        Some(dec!(9800.00))
    );
}

#[test]
fn test_session_serde_round_trip() {
    let mut ledger = GeneralLedger::new(Currency::USD);
    let checking = AccountId::new();
    ledger
        .register_account(Account::new(checking, "1000", "Checking", AccountType::Bank, Currency::USD))
        .unwrap();

    let mut tracker = ReconciliationTracker::new();
    let id = tracker
        .start(checking, date(6, 30), usd(dec!(0.00)), &ledger)
        .unwrap();

    let json = serde_json::to_string(tracker.session(&id).unwrap()).unwrap();
    let back: domain_reconciliation::Reconciliation = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, id);
    assert_eq!(back.status, ReconciliationStatus::InProgress);
    assert!(back.previous_reconciliation_id.is_none());
}
