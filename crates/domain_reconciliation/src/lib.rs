//! Reconciliation Domain - Statement Sessions
//!
//! A reconciliation session matches ledger activity on one account
//! against an external statement balance. Sessions chain per account:
//! each new session opens at the previous completed session's ending
//! balance (or the account's all-time opening balance for the first),
//! and completion requires the matched entries to tie out exactly - an
//! unequal reconciliation is rejected, never forced.
//!
//! The tracker consumes ledger state read-only; the only write it
//! performs is stamping the account's last-reconciled fields through
//! the poster on completion.

pub mod session;
pub mod tracker;
pub mod error;

pub use session::{Reconciliation, ReconciliationStatus};
pub use tracker::ReconciliationTracker;
pub use error::ReconciliationError;
