//! Custom Test Assertions
//!
//! Assertion helpers for domain types that give more meaningful error
//! messages than standard assertions.

use core_kernel::{Money, TransactionId};
use domain_ledger::{EntrySide, GeneralLedger};
use domain_settlement::{SettlementBook, TransactionStatus};

/// Asserts that two Money values are exactly equal
///
/// # Panics
///
/// Panics with both values formatted when they differ.
pub fn assert_money_eq(actual: Money, expected: Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "Money amounts differ: actual={}, expected={}",
        actual,
        expected
    );
}

/// Asserts that a transaction's posted entries balance
///
/// # Panics
///
/// Panics if the transaction has no entries or debits != credits.
pub fn assert_entries_balanced(ledger: &GeneralLedger, transaction_id: &TransactionId) {
    let entries = ledger
        .entries(transaction_id)
        .unwrap_or_else(|| panic!("no entries posted for {}", transaction_id));

    let mut debits = Money::zero(ledger.currency());
    let mut credits = Money::zero(ledger.currency());
    for entry in entries {
        match entry.side() {
            EntrySide::Debit => debits = debits + entry.amount(),
            EntrySide::Credit => credits = credits + entry.amount(),
        }
    }

    assert_eq!(
        debits.amount(),
        credits.amount(),
        "entries for {} are unbalanced: debits={}, credits={}",
        transaction_id,
        debits,
        credits
    );
}

/// Asserts a transaction's status and remaining balance together
pub fn assert_transaction_state(
    book: &SettlementBook,
    transaction_id: &TransactionId,
    status: TransactionStatus,
    balance: Money,
) {
    let txn = book
        .transaction(transaction_id)
        .unwrap_or_else(|| panic!("unknown transaction {}", transaction_id));
    assert_eq!(
        txn.status(),
        status,
        "status mismatch for {}: actual={:?}, expected={:?}",
        transaction_id,
        txn.status(),
        status
    );
    assert_money_eq(txn.balance(), balance);
}

/// Asserts that no trace of a transaction survives in the book or ledger
pub fn assert_fully_removed(book: &SettlementBook, transaction_id: &TransactionId) {
    assert!(
        book.transaction(transaction_id).is_none(),
        "transaction row {} still exists",
        transaction_id
    );
    assert!(
        book.ledger().entries(transaction_id).is_none(),
        "ledger entries for {} still exist",
        transaction_id
    );
}
