//! Core Kernel - Foundational types for the bookkeeping engine
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers
//! - Company timezone helpers
//! - Port traits for the collaborators the engine consumes but does not own

pub mod money;
pub mod identifiers;
pub mod temporal;
pub mod ports;
pub mod error;

pub use money::{Money, Currency, Rate, MoneyError};
pub use identifiers::{
    AccountId, TransactionId, LedgerEntryId, LineItemId,
    ApplicationLinkId, ContactId, TemplateId, ReconciliationId,
};
pub use temporal::CompanyTimezone;
pub use ports::{ContactKind, ContactRecord, ContactDirectory, ReferenceSource, PortError};
pub use error::CoreError;
