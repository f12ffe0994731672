//! Reconciliation sessions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use core_kernel::{AccountId, LedgerEntryId, Money, ReconciliationId};

/// Status of a reconciliation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    /// Entries are being matched
    InProgress,
    /// The statement tied out and the session is sealed
    Completed,
}

/// One statement-matching session for an account
///
/// `previous_reconciliation_id` back-links sessions into an append-only
/// chain per account; the opening balance of each session equals the
/// ending balance of the previous completed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Unique identifier
    pub id: ReconciliationId,
    /// Account being reconciled
    pub account_id: AccountId,
    /// Statement date
    pub statement_date: NaiveDate,
    /// Ending balance printed on the statement
    pub statement_ending_balance: Money,
    /// Opening balance carried from the chain
    pub opening_balance: Money,
    /// Session status
    pub status: ReconciliationStatus,
    /// Previous session in the account's chain
    pub previous_reconciliation_id: Option<ReconciliationId>,
    /// Ledger entries matched so far
    pub matched_entries: BTreeSet<LedgerEntryId>,
    /// When the session was started
    pub started_at: DateTime<Utc>,
    /// When the session completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl Reconciliation {
    pub(crate) fn new(
        account_id: AccountId,
        statement_date: NaiveDate,
        statement_ending_balance: Money,
        opening_balance: Money,
        previous_reconciliation_id: Option<ReconciliationId>,
    ) -> Self {
        Self {
            id: ReconciliationId::new_v7(),
            account_id,
            statement_date,
            statement_ending_balance,
            opening_balance,
            status: ReconciliationStatus::InProgress,
            previous_reconciliation_id,
            matched_entries: BTreeSet::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub(crate) fn seal(&mut self) {
        self.status = ReconciliationStatus::Completed;
        self.completed_at = Some(Utc::now());
    }
}
