//! Settlement domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use domain_ledger::LedgerError;

/// Errors that can occur in the settlement domain
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Underlying ledger failure (unbalanced entries, bad accounts, ...)
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Transaction not found
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    /// Application link not found
    #[error("Unknown application link: {0}")]
    UnknownLink(String),

    /// Reference already used within the type's scope
    #[error("Duplicate reference: {0}")]
    DuplicateReference(String),

    /// A contact is required but missing
    #[error("Missing contact: {0}")]
    MissingContact(String),

    /// The contact's kind does not fit the document (AR needs a customer, AP a vendor)
    #[error("Invalid contact kind: {0}")]
    InvalidContactKind(String),

    /// Settlement or application amount exceeds the document's remaining balance
    #[error("Insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    /// Application amount exceeds the credit's remaining value
    #[error("Insufficient credit: {available} available, {requested} requested")]
    InsufficientCredit {
        available: Decimal,
        requested: Decimal,
    },

    /// Live application links still reference the transaction
    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    /// A settlement key was reused for a different transaction
    #[error("Settlement key already used: {0}")]
    DuplicateSettlementKey(String),

    /// Operation is not legal for the transaction's type or status
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Arithmetic failure
    #[error("Calculation error: {0}")]
    Calculation(String),
}
