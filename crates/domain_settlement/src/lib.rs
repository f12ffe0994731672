//! Settlement Domain - Transaction Lifecycle and Credit Application
//!
//! This crate owns every financial document in the books and the two
//! engines that move their balances:
//!
//! - the **lifecycle manager** (`SettlementBook::create`, `settle`,
//!   `void`, `delete`, `record_payment`) which posts the balancing
//!   ledger entries implied by each document type and tracks the
//!   remaining unsettled balance and status of each document, and
//! - the **credit application engine** (`apply_credit`,
//!   `reverse_application`, `delete_payment_cascade`) which links
//!   unapplied credits to the invoices and bills they settle through an
//!   explicit `ApplicationLink` record, and reverses those links
//!   exactly when a payment or credit is deleted.
//!
//! Whether a credit has been applied is always answered from tracked
//! state - the credit's balance and its links - never by matching
//! description strings.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_settlement::{SettlementBook, TransactionSpec, PostingMap};
//!
//! let invoice = book.create(TransactionSpec::invoice("INV-1001", date, customer)
//!     .with_line(line), &map)?;
//! book.settle(invoice, amount, "stripe-evt-81aa")?;
//! ```

pub mod transaction;
pub mod book;
pub mod credit;
pub mod error;

pub use transaction::{
    Contact, LineItem, Transaction, TransactionSpec, TransactionStatus, TransactionType,
};
pub use book::{PaymentApplication, PaymentOutcome, PaymentSpec, PostingMap, SettlementBook};
pub use credit::{ApplicationLink, CascadeOutcome};
pub use error::SettlementError;
