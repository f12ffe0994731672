//! Ledger domain errors

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in the ledger domain
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The balance law failed; never auto-corrected
    #[error("Unbalanced entries: debits={debits}, credits={credits}")]
    UnbalancedEntries {
        debits: Decimal,
        credits: Decimal,
    },

    /// Account is not registered
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    /// Account exists but is inactive
    #[error("Inactive account: {0}")]
    InactiveAccount(String),

    /// Account id or code already registered
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    /// Account is referenced by posted entries and cannot be removed
    #[error("Account is referenced by ledger entries: {0}")]
    AccountInUse(String),

    /// A draft entry is malformed
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// A post was attempted with no entries
    #[error("A posting must contain at least one entry")]
    NoEntries,

    /// The transaction already has posted entries
    #[error("Transaction already posted: {0}")]
    AlreadyPosted(String),

    /// The transaction has no posted entries
    #[error("Transaction has no posted entries: {0}")]
    NotPosted(String),

    /// Arithmetic failure during balance maintenance
    #[error("Calculation error: {0}")]
    Calculation(String),
}
