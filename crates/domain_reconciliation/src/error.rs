//! Reconciliation domain errors

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in the reconciliation domain
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// Account is not registered in the ledger
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    /// Session not found
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// Ledger entry not found
    #[error("Unknown ledger entry: {0}")]
    UnknownEntry(String),

    /// The account already has an in-progress session
    #[error("A reconciliation is already in progress for account {0}")]
    SessionInProgress(String),

    /// The session is already completed
    #[error("Session is already completed: {0}")]
    SessionCompleted(String),

    /// The entry belongs to a different account
    #[error("Entry belongs to a different account: {0}")]
    ForeignEntry(String),

    /// The entry was matched by a previous completed session
    #[error("Entry was already reconciled: {0}")]
    EntryAlreadyReconciled(String),

    /// The entry is not in the session's matched set
    #[error("Entry is not matched in this session: {0}")]
    EntryNotMatched(String),

    /// The statement math does not tie out; never silently forced
    #[error("Reconciliation mismatch: statement={statement}, computed={computed}")]
    Mismatch {
        statement: Decimal,
        computed: Decimal,
    },

    /// Arithmetic failure
    #[error("Calculation error: {0}")]
    Calculation(String),
}
