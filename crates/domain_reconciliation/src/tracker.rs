//! The reconciliation tracker
//!
//! Owns the sessions and the per-account chains. All amounts are read
//! from real ledger entries through `GeneralLedger::entry_effect`; the
//! tracker never keeps its own copy of an amount.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use chrono::NaiveDate;
use core_kernel::{AccountId, LedgerEntryId, Money, ReconciliationId};
use domain_ledger::GeneralLedger;

use crate::error::ReconciliationError;
use crate::session::{Reconciliation, ReconciliationStatus};

/// Tracker for reconciliation sessions across all accounts
#[derive(Debug, Default)]
pub struct ReconciliationTracker {
    sessions: HashMap<ReconciliationId, Reconciliation>,
    /// Last completed session per account (the chain head)
    last_completed: HashMap<AccountId, ReconciliationId>,
    /// The one in-progress session per account, if any
    in_progress: HashMap<AccountId, ReconciliationId>,
    /// Entries already matched by a completed session
    reconciled_entries: HashSet<LedgerEntryId>,
}

impl ReconciliationTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a session by id
    pub fn session(&self, id: &ReconciliationId) -> Option<&Reconciliation> {
        self.sessions.get(id)
    }

    /// The last completed session for an account
    pub fn last_completed(&self, account_id: &AccountId) -> Option<&Reconciliation> {
        self.last_completed
            .get(account_id)
            .and_then(|id| self.sessions.get(id))
    }

    /// Starts a reconciliation session for an account
    ///
    /// The opening balance is the previous completed session's ending
    /// balance, or the account's all-time opening balance when no
    /// session exists yet. Only one session per account may be in
    /// progress at a time.
    pub fn start(
        &mut self,
        account_id: AccountId,
        statement_date: NaiveDate,
        statement_ending_balance: Money,
        ledger: &GeneralLedger,
    ) -> Result<ReconciliationId, ReconciliationError> {
        let account = ledger
            .account(&account_id)
            .ok_or_else(|| ReconciliationError::UnknownAccount(account_id.to_string()))?;
        if self.in_progress.contains_key(&account_id) {
            return Err(ReconciliationError::SessionInProgress(
                account_id.to_string(),
            ));
        }

        let previous = self.last_completed.get(&account_id).copied();
        let opening_balance = match previous.and_then(|id| self.sessions.get(&id)) {
            Some(prev) => prev.statement_ending_balance,
            None => account.opening_balance,
        };

        let session = Reconciliation::new(
            account_id,
            statement_date,
            statement_ending_balance,
            opening_balance,
            previous,
        );
        let id = session.id;
        self.sessions.insert(id, session);
        self.in_progress.insert(account_id, id);

        debug!(session = %id, account = %account_id, "started reconciliation");
        Ok(id)
    }

    /// Matches a ledger entry into an in-progress session
    ///
    /// The entry must belong to the session's account and must not have
    /// been matched by any completed session.
    pub fn match_entry(
        &mut self,
        session_id: &ReconciliationId,
        entry_id: &LedgerEntryId,
        ledger: &GeneralLedger,
    ) -> Result<(), ReconciliationError> {
        if self.reconciled_entries.contains(entry_id) {
            return Err(ReconciliationError::EntryAlreadyReconciled(
                entry_id.to_string(),
            ));
        }
        let session = self.in_progress_session_mut(session_id)?;

        let entry = ledger
            .find_entry(entry_id)
            .ok_or_else(|| ReconciliationError::UnknownEntry(entry_id.to_string()))?;
        if entry.account_id != session.account_id {
            return Err(ReconciliationError::ForeignEntry(entry_id.to_string()));
        }

        session.matched_entries.insert(*entry_id);
        Ok(())
    }

    /// Removes an entry from an in-progress session's matched set
    pub fn unmatch_entry(
        &mut self,
        session_id: &ReconciliationId,
        entry_id: &LedgerEntryId,
    ) -> Result<(), ReconciliationError> {
        let session = self.in_progress_session_mut(session_id)?;
        if !session.matched_entries.remove(entry_id) {
            return Err(ReconciliationError::EntryNotMatched(entry_id.to_string()));
        }
        Ok(())
    }

    /// Completes a session when the statement ties out exactly
    ///
    /// Legal only when `opening_balance + sum(matched entry effects)`
    /// equals the statement ending balance. On success the account's
    /// last-reconciled stamp is written through the ledger and the
    /// session becomes the account's chain head. A mismatch is rejected
    /// with both sides of the equation; nothing is forced.
    pub fn complete(
        &mut self,
        session_id: &ReconciliationId,
        ledger: &mut GeneralLedger,
    ) -> Result<(), ReconciliationError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| ReconciliationError::UnknownSession(session_id.to_string()))?;
        if session.status != ReconciliationStatus::InProgress {
            return Err(ReconciliationError::SessionCompleted(session_id.to_string()));
        }

        let mut cleared = session.opening_balance;
        for entry_id in &session.matched_entries {
            let effect = ledger
                .entry_effect(entry_id)
                .ok_or_else(|| ReconciliationError::UnknownEntry(entry_id.to_string()))?;
            cleared = cleared
                .checked_add(&effect)
                .map_err(|e| ReconciliationError::Calculation(e.to_string()))?;
        }

        if cleared != session.statement_ending_balance {
            return Err(ReconciliationError::Mismatch {
                statement: session.statement_ending_balance.amount(),
                computed: cleared.amount(),
            });
        }

        let account_id = session.account_id;
        let statement_date = session.statement_date;
        let ending = session.statement_ending_balance;

        ledger
            .mark_reconciled(&account_id, statement_date, ending)
            .map_err(|e| ReconciliationError::Calculation(e.to_string()))?;

        let session = self
            .sessions
            .get_mut(session_id)
            .expect("presence checked above");
        session.seal();
        self.reconciled_entries
            .extend(session.matched_entries.iter().copied());
        self.in_progress.remove(&account_id);
        self.last_completed.insert(account_id, *session_id);

        debug!(session = %session_id, account = %account_id, "completed reconciliation");
        Ok(())
    }

    fn in_progress_session_mut(
        &mut self,
        session_id: &ReconciliationId,
    ) -> Result<&mut Reconciliation, ReconciliationError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ReconciliationError::UnknownSession(session_id.to_string()))?;
        if session.status != ReconciliationStatus::InProgress {
            return Err(ReconciliationError::SessionCompleted(session_id.to_string()));
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{Currency, TransactionId};
    use domain_ledger::{Account, AccountType, EntryDraft};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn setup() -> (GeneralLedger, AccountId, AccountId) {
        let mut ledger = GeneralLedger::new(Currency::USD);
        let checking = AccountId::new();
        let sales = AccountId::new();
        ledger
            .register_account(
                Account::new(checking, "1000", "Checking", AccountType::Bank, Currency::USD)
                    .with_opening_balance(usd(dec!(5000.00))),
            )
            .unwrap();
        ledger
            .register_account(Account::new(sales, "4000", "Sales", AccountType::Income, Currency::USD))
            .unwrap();
        (ledger, checking, sales)
    }

    fn post_receipt(
        ledger: &mut GeneralLedger,
        checking: AccountId,
        sales: AccountId,
        amount: Decimal,
        day: u32,
    ) -> Vec<core_kernel::LedgerEntryId> {
        ledger
            .post(
                TransactionId::new_v7(),
                date(day),
                &[
                    EntryDraft::debit(checking, usd(amount)),
                    EntryDraft::credit(sales, usd(amount)),
                ],
            )
            .unwrap()
    }

    #[test]
    fn test_first_session_opens_at_account_opening_balance() {
        let (ledger, checking, _) = setup();
        let mut tracker = ReconciliationTracker::new();

        let id = tracker
            .start(checking, date(31), usd(dec!(5750.00)), &ledger)
            .unwrap();
        let session = tracker.session(&id).unwrap();
        assert_eq!(session.opening_balance.amount(), dec!(5000.00));
        assert!(session.previous_reconciliation_id.is_none());
    }

    #[test]
    fn test_complete_requires_exact_tie_out() {
        let (mut ledger, checking, sales) = setup();
        let mut tracker = ReconciliationTracker::new();

        let ids = post_receipt(&mut ledger, checking, sales, dec!(750.00), 10);
        let session = tracker
            .start(checking, date(31), usd(dec!(5750.00)), &ledger)
            .unwrap();

        // Without the matched entry the math is off by 750
        let result = tracker.complete(&session, &mut ledger);
        assert!(matches!(
            result,
            Err(ReconciliationError::Mismatch { .. })
        ));

        tracker.match_entry(&session, &ids[0], &ledger).unwrap();
        tracker.complete(&session, &mut ledger).unwrap();

        let account = ledger.account(&checking).unwrap();
        assert_eq!(account.last_reconciled_date, Some(date(31)));
        assert_eq!(
            account.last_reconciled_balance.map(|m| m.amount()),
            Some(dec!(5750.00))
        );
    }

    #[test]
    fn test_chain_carries_ending_balance_forward() {
        let (mut ledger, checking, sales) = setup();
        let mut tracker = ReconciliationTracker::new();

        let ids = post_receipt(&mut ledger, checking, sales, dec!(750.00), 10);
        let first = tracker
            .start(checking, date(15), usd(dec!(5750.00)), &ledger)
            .unwrap();
        tracker.match_entry(&first, &ids[0], &ledger).unwrap();
        tracker.complete(&first, &mut ledger).unwrap();

        let second = tracker
            .start(checking, date(31), usd(dec!(5750.00)), &ledger)
            .unwrap();
        let session = tracker.session(&second).unwrap();
        assert_eq!(session.opening_balance.amount(), dec!(5750.00));
        assert_eq!(session.previous_reconciliation_id, Some(first));

        // No new activity: the statement already ties out
        tracker.complete(&second, &mut ledger).unwrap();
        assert_eq!(tracker.last_completed(&checking).unwrap().id, second);
    }

    #[test]
    fn test_one_in_progress_session_per_account() {
        let (ledger, checking, _) = setup();
        let mut tracker = ReconciliationTracker::new();

        tracker
            .start(checking, date(15), usd(dec!(5000.00)), &ledger)
            .unwrap();
        assert!(matches!(
            tracker.start(checking, date(31), usd(dec!(5000.00)), &ledger),
            Err(ReconciliationError::SessionInProgress(_))
        ));
    }

    #[test]
    fn test_entry_cannot_be_reconciled_twice() {
        let (mut ledger, checking, sales) = setup();
        let mut tracker = ReconciliationTracker::new();

        let ids = post_receipt(&mut ledger, checking, sales, dec!(750.00), 10);
        let first = tracker
            .start(checking, date(15), usd(dec!(5750.00)), &ledger)
            .unwrap();
        tracker.match_entry(&first, &ids[0], &ledger).unwrap();
        tracker.complete(&first, &mut ledger).unwrap();

        let second = tracker
            .start(checking, date(31), usd(dec!(5750.00)), &ledger)
            .unwrap();
        assert!(matches!(
            tracker.match_entry(&second, &ids[0], &ledger),
            Err(ReconciliationError::EntryAlreadyReconciled(_))
        ));
    }

    #[test]
    fn test_foreign_entry_rejected() {
        let (mut ledger, checking, sales) = setup();
        let mut tracker = ReconciliationTracker::new();

        let ids = post_receipt(&mut ledger, checking, sales, dec!(100.00), 5);
        let session = tracker
            .start(checking, date(15), usd(dec!(5100.00)), &ledger)
            .unwrap();

        // ids[1] hit the sales account, not checking
        assert!(matches!(
            tracker.match_entry(&session, &ids[1], &ledger),
            Err(ReconciliationError::ForeignEntry(_))
        ));
    }

    #[test]
    fn test_unmatch_entry() {
        let (mut ledger, checking, sales) = setup();
        let mut tracker = ReconciliationTracker::new();

        let ids = post_receipt(&mut ledger, checking, sales, dec!(100.00), 5);
        let session = tracker
            .start(checking, date(15), usd(dec!(5000.00)), &ledger)
            .unwrap();

        tracker.match_entry(&session, &ids[0], &ledger).unwrap();
        tracker.unmatch_entry(&session, &ids[0]).unwrap();

        assert!(matches!(
            tracker.unmatch_entry(&session, &ids[0]),
            Err(ReconciliationError::EntryNotMatched(_))
        ));

        // With nothing matched and no drift, the statement ties out
        tracker.complete(&session, &mut ledger).unwrap();
    }
}
