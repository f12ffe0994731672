//! Ledger Domain - Chart of Accounts and Double-Entry Posting
//!
//! This crate implements the account registry and the ledger poster: the
//! only code in the system allowed to mutate account running balances.
//!
//! # Double-Entry Accounting Principles
//!
//! Every financial transaction posts balanced debits and credits:
//! - Debits increase asset/expense accounts
//! - Credits increase liability/equity/income accounts
//! - The sum of all debits must equal the sum of all credits
//!
//! A post is all-or-nothing: validation runs over the complete entry set
//! before any balance is touched, so a failed post leaves no trace.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{GeneralLedger, EntryDraft};
//!
//! let drafts = vec![
//!     EntryDraft::debit(receivable, total),
//!     EntryDraft::credit(income, total),
//! ];
//! ledger.post(invoice_id, invoice_date, &drafts)?;
//! ```

pub mod account;
pub mod entry;
pub mod poster;
pub mod error;

pub use account::{Account, AccountType, StandardChartOfAccounts};
pub use entry::{EntryDraft, EntrySide, LedgerEntry};
pub use poster::{GeneralLedger, TrialBalance, TrialBalanceRow};
pub use error::LedgerError;
