//! Port traits for excluded collaborators
//!
//! The engine is consumed in-process by an API layer that owns contact
//! records, document numbering, and persistence. The engine only ever
//! reads from those systems, through the traits defined here. Adapters
//! live outside this workspace.

use std::fmt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifiers::ContactId;

/// Error type for port operations
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// A validation error occurred
    #[error("Validation error: {message}")]
    Validation {
        message: String,
    },

    /// Connection to the underlying system failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient failure that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Connection { .. })
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Marker trait for all domain ports
pub trait DomainPort: Send + Sync + 'static {}

/// Whether a contact buys from or sells to the company
///
/// The kind gates which documents a contact may appear on: customers on
/// receivable documents, vendors on payable documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    /// A customer the company invoices
    Customer,
    /// A vendor the company receives bills from
    Vendor,
}

/// A contact as resolved by the directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Unique identifier
    pub id: ContactId,
    /// Customer or vendor
    pub kind: ContactKind,
    /// Display name
    pub name: String,
    /// Whether the contact is active
    pub is_active: bool,
}

/// Read-only lookup of contact records
#[async_trait]
pub trait ContactDirectory: DomainPort {
    /// Resolves a contact by id
    ///
    /// # Errors
    ///
    /// Returns `PortError::NotFound` for unknown ids.
    async fn get_contact(&self, id: ContactId) -> Result<ContactRecord, PortError>;
}

/// Generator of unique, human-readable document references
///
/// References are unique per document-type scope (e.g. the invoice
/// sequence and the payment sequence advance independently).
#[async_trait]
pub trait ReferenceSource: DomainPort {
    /// Returns the next reference in the given scope (e.g. "INV" -> "INV-1042")
    async fn next_reference(&self, scope: &str) -> Result<String, PortError>;
}
