//! Strongly-typed identifiers for domain entities
//!
//! Using newtype wrappers around UUIDs provides type safety and prevents
//! accidental mixing of different identifier types - a transaction id can
//! never be passed where an account id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates a new time-ordered identifier (v7)
            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the identifier prefix for display
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Strip prefix if present
                let uuid_str = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

// Ledger domain identifiers
define_id!(AccountId, "ACC");
define_id!(LedgerEntryId, "LED");

// Settlement domain identifiers
define_id!(TransactionId, "TXN");
define_id!(LineItemId, "LIN");
define_id!(ApplicationLinkId, "APL");
define_id!(ContactId, "CNT");

// Scheduling domain identifiers
define_id!(TemplateId, "RCT");

// Reconciliation domain identifiers
define_id!(ReconciliationId, "REC");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_display() {
        let id = TransactionId::new();
        let display = id.to_string();
        assert!(display.starts_with("TXN-"));
    }

    #[test]
    fn test_id_parsing() {
        let original = AccountId::new();
        let parsed: AccountId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_id_parsing_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed: LedgerEntryId = uuid.to_string().parse().unwrap();
        assert_eq!(parsed.as_uuid(), &uuid);
    }

    #[test]
    fn test_uuid_conversion() {
        let uuid = Uuid::new_v4();
        let link_id = ApplicationLinkId::from(uuid);
        let back: Uuid = link_id.into();
        assert_eq!(uuid, back);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = TransactionId::new_v7();
        let b = TransactionId::new_v7();
        assert_ne!(a, b);
        assert_ne!(AccountId::new(), AccountId::new());
    }
}
