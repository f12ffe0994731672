//! Ledger entries and entry drafts
//!
//! Callers describe a posting as a list of `EntryDraft` values, each
//! carrying a debit amount and a credit amount of which exactly one must
//! be nonzero. The poster validates the set and persists it as
//! `LedgerEntry` rows owned by their transaction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, LedgerEntryId, Money, TransactionId};

/// Which side of the ledger an entry sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySide {
    Debit,
    Credit,
}

/// A caller-supplied line of a posting: one account, one side, one amount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDraft {
    /// Account to post against
    pub account_id: AccountId,
    /// Debit amount (zero when the credit side is used)
    pub debit: Money,
    /// Credit amount (zero when the debit side is used)
    pub credit: Money,
    /// Optional description for this line
    pub description: Option<String>,
}

impl EntryDraft {
    /// Creates a debit draft
    pub fn debit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Money::zero(amount.currency()),
            description: None,
        }
    }

    /// Creates a credit draft
    pub fn credit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            debit: Money::zero(amount.currency()),
            credit: amount,
            description: None,
        }
    }

    /// Adds a description to the draft
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the side and amount when the draft is well-formed
    ///
    /// A well-formed draft has exactly one positive side and a zero
    /// other side. Anything else returns `None` and is rejected by the
    /// poster.
    pub fn side(&self) -> Option<(EntrySide, Money)> {
        match (
            self.debit.is_positive(),
            self.credit.is_positive(),
            self.debit.is_zero(),
            self.credit.is_zero(),
        ) {
            (true, false, _, true) => Some((EntrySide::Debit, self.debit)),
            (false, true, true, _) => Some((EntrySide::Credit, self.credit)),
            _ => None,
        }
    }
}

/// A posted ledger entry
///
/// Entries are owned by their transaction: they are created together in
/// one post and deleted together in one unpost. There is no operation
/// that removes a single entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry identifier
    pub id: LedgerEntryId,
    /// Owning transaction
    pub transaction_id: TransactionId,
    /// Account posted against
    pub account_id: AccountId,
    /// Debit amount (zero for credit entries)
    pub debit: Money,
    /// Credit amount (zero for debit entries)
    pub credit: Money,
    /// Description
    pub description: Option<String>,
    /// Posting date
    pub date: NaiveDate,
}

impl LedgerEntry {
    /// Returns the side this entry sits on
    pub fn side(&self) -> EntrySide {
        if self.debit.is_positive() {
            EntrySide::Debit
        } else {
            EntrySide::Credit
        }
    }

    /// Returns the posted amount regardless of side
    pub fn amount(&self) -> Money {
        match self.side() {
            EntrySide::Debit => self.debit,
            EntrySide::Credit => self.credit,
        }
    }

    pub(crate) fn from_draft(
        draft: &EntryDraft,
        transaction_id: TransactionId,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: LedgerEntryId::new_v7(),
            transaction_id,
            account_id: draft.account_id,
            debit: draft.debit,
            credit: draft.credit,
            description: draft.description.clone(),
            date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_debit_draft_side() {
        let draft = EntryDraft::debit(AccountId::new(), Money::new(dec!(100), Currency::USD));
        let (side, amount) = draft.side().unwrap();
        assert_eq!(side, EntrySide::Debit);
        assert_eq!(amount.amount(), dec!(100));
    }

    #[test]
    fn test_credit_draft_side() {
        let draft = EntryDraft::credit(AccountId::new(), Money::new(dec!(55.25), Currency::USD));
        let (side, amount) = draft.side().unwrap();
        assert_eq!(side, EntrySide::Credit);
        assert_eq!(amount.amount(), dec!(55.25));
    }

    #[test]
    fn test_two_sided_draft_is_malformed() {
        let draft = EntryDraft {
            account_id: AccountId::new(),
            debit: Money::new(dec!(50), Currency::USD),
            credit: Money::new(dec!(50), Currency::USD),
            description: None,
        };
        assert!(draft.side().is_none());
    }

    #[test]
    fn test_zero_draft_is_malformed() {
        let draft = EntryDraft {
            account_id: AccountId::new(),
            debit: Money::zero(Currency::USD),
            credit: Money::zero(Currency::USD),
            description: None,
        };
        assert!(draft.side().is_none());
    }

    #[test]
    fn test_negative_draft_is_malformed() {
        let draft = EntryDraft {
            account_id: AccountId::new(),
            debit: Money::new(dec!(-10), Currency::USD),
            credit: Money::zero(Currency::USD),
            description: None,
        };
        assert!(draft.side().is_none());
    }
}
