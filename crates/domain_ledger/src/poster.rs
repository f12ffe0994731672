//! The ledger poster
//!
//! `GeneralLedger` is the owning aggregate for accounts and posted
//! entries. It enforces the balance law on every post and is the single
//! writer of account running balances.
//!
//! # Invariants
//!
//! - For every posted transaction, sum(debits) == sum(credits)
//! - Account balances are always consistent with posted entries
//! - A post either applies completely or not at all
//! - Entries are removed only as a whole transaction, via `unpost`

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

use core_kernel::{AccountId, Currency, LedgerEntryId, Money, TransactionId};

use crate::account::{Account, AccountType};
use crate::entry::{EntryDraft, EntrySide, LedgerEntry};
use crate::error::LedgerError;

/// The general ledger: chart of accounts plus posted entries
#[derive(Debug)]
pub struct GeneralLedger {
    /// Ledger home currency
    currency: Currency,
    /// Chart of accounts
    accounts: HashMap<AccountId, Account>,
    /// Account code index
    codes: HashMap<String, AccountId>,
    /// Posted entries, grouped by owning transaction
    entries: HashMap<TransactionId, Vec<LedgerEntry>>,
}

impl GeneralLedger {
    /// Creates an empty ledger in the given home currency
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            accounts: HashMap::new(),
            codes: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    /// Returns the ledger home currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Adds an account to the chart of accounts
    ///
    /// # Errors
    ///
    /// Returns an error if the account id or code is already registered.
    pub fn register_account(&mut self, account: Account) -> Result<(), LedgerError> {
        if self.accounts.contains_key(&account.id) {
            return Err(LedgerError::AccountAlreadyExists(account.id.to_string()));
        }
        if self.codes.contains_key(&account.code) {
            return Err(LedgerError::AccountAlreadyExists(account.code.clone()));
        }

        self.codes.insert(account.code.clone(), account.id);
        self.accounts.insert(account.id, account);
        Ok(())
    }

    /// Gets an account by id
    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Gets an account by its chart code
    pub fn account_by_code(&self, code: &str) -> Option<&Account> {
        self.codes.get(code).and_then(|id| self.accounts.get(id))
    }

    /// Gets the current running balance of an account
    pub fn balance(&self, id: &AccountId) -> Option<Money> {
        self.accounts.get(id).map(|a| a.balance())
    }

    /// Iterates over all accounts
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Deactivates an account so it rejects further postings
    pub fn deactivate_account(&mut self, id: &AccountId) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownAccount(id.to_string()))?;
        account.deactivate();
        Ok(())
    }

    /// Removes an account from the chart
    ///
    /// # Errors
    ///
    /// Returns `AccountInUse` if any posted entry references the account;
    /// a referenced account can only be deactivated.
    pub fn remove_account(&mut self, id: &AccountId) -> Result<(), LedgerError> {
        if !self.accounts.contains_key(id) {
            return Err(LedgerError::UnknownAccount(id.to_string()));
        }

        let referenced = self
            .entries
            .values()
            .flatten()
            .any(|e| &e.account_id == id);
        if referenced {
            return Err(LedgerError::AccountInUse(id.to_string()));
        }

        let account = self.accounts.remove(id).expect("checked above");
        self.codes.remove(&account.code);
        Ok(())
    }

    /// Posts a balanced set of entries for a transaction
    ///
    /// Validation runs over the complete set before any mutation: every
    /// account must exist and be active, every draft must have exactly
    /// one positive side in the home currency, and total debits must
    /// equal total credits exactly.
    ///
    /// # Arguments
    ///
    /// * `transaction_id` - Owning transaction; must not already be posted
    /// * `date` - Posting date
    /// * `drafts` - The caller-supplied entry lines
    ///
    /// # Returns
    ///
    /// The ids of the created entries, in draft order.
    ///
    /// # Errors
    ///
    /// - `UnbalancedEntries` if the balance law fails
    /// - `UnknownAccount` / `InactiveAccount` for bad account references
    /// - `InvalidEntry` for malformed drafts
    pub fn post(
        &mut self,
        transaction_id: TransactionId,
        date: NaiveDate,
        drafts: &[EntryDraft],
    ) -> Result<Vec<LedgerEntryId>, LedgerError> {
        if drafts.is_empty() {
            return Err(LedgerError::NoEntries);
        }
        if self.entries.contains_key(&transaction_id) {
            return Err(LedgerError::AlreadyPosted(transaction_id.to_string()));
        }

        let mut total_debits = Money::zero(self.currency);
        let mut total_credits = Money::zero(self.currency);

        for draft in drafts {
            let account = self
                .accounts
                .get(&draft.account_id)
                .ok_or_else(|| LedgerError::UnknownAccount(draft.account_id.to_string()))?;
            if !account.is_active {
                return Err(LedgerError::InactiveAccount(account.code.clone()));
            }

            let (side, amount) = draft.side().ok_or_else(|| {
                LedgerError::InvalidEntry(format!(
                    "entry for account {} must have exactly one positive side",
                    draft.account_id
                ))
            })?;
            if amount.currency() != self.currency {
                return Err(LedgerError::InvalidEntry(format!(
                    "entry currency {} does not match ledger currency {}",
                    amount.currency(),
                    self.currency
                )));
            }

            match side {
                EntrySide::Debit => {
                    total_debits = total_debits
                        .checked_add(&amount)
                        .map_err(|e| LedgerError::Calculation(e.to_string()))?;
                }
                EntrySide::Credit => {
                    total_credits = total_credits
                        .checked_add(&amount)
                        .map_err(|e| LedgerError::Calculation(e.to_string()))?;
                }
            }
        }

        if total_debits != total_credits {
            return Err(LedgerError::UnbalancedEntries {
                debits: total_debits.amount(),
                credits: total_credits.amount(),
            });
        }

        // Validation complete; apply as a unit.
        let mut ids = Vec::with_capacity(drafts.len());
        let mut posted = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let entry = LedgerEntry::from_draft(draft, transaction_id, date);
            let delta = Self::balance_delta(
                self.accounts[&draft.account_id].account_type,
                &entry,
            );
            let account = self.accounts.get_mut(&draft.account_id).expect("validated");
            account
                .apply_delta(delta)
                .map_err(|e| LedgerError::Calculation(e.to_string()))?;

            ids.push(entry.id);
            posted.push(entry);
        }

        debug!(transaction = %transaction_id, lines = posted.len(), "posted ledger entries");
        self.entries.insert(transaction_id, posted);

        Ok(ids)
    }

    /// Deletes all entries for a transaction and reverses their balance effects
    ///
    /// Must be called before the transaction row itself is removed, never
    /// after.
    ///
    /// # Errors
    ///
    /// Returns `NotPosted` if the transaction has no entries.
    pub fn unpost(&mut self, transaction_id: &TransactionId) -> Result<(), LedgerError> {
        let entries = self
            .entries
            .remove(transaction_id)
            .ok_or_else(|| LedgerError::NotPosted(transaction_id.to_string()))?;

        for entry in &entries {
            let account_type = self.accounts[&entry.account_id].account_type;
            let delta = Self::balance_delta(account_type, entry);
            let account = self
                .accounts
                .get_mut(&entry.account_id)
                .expect("posted entries reference registered accounts");
            account
                .apply_delta(-delta)
                .map_err(|e| LedgerError::Calculation(e.to_string()))?;
        }

        debug!(transaction = %transaction_id, lines = entries.len(), "unposted ledger entries");
        Ok(())
    }

    /// Returns the posted entries for a transaction
    pub fn entries(&self, transaction_id: &TransactionId) -> Option<&[LedgerEntry]> {
        self.entries.get(transaction_id).map(|v| v.as_slice())
    }

    /// Returns true if the transaction has posted entries
    pub fn is_posted(&self, transaction_id: &TransactionId) -> bool {
        self.entries.contains_key(transaction_id)
    }

    /// Finds a single entry by id
    pub fn find_entry(&self, id: &LedgerEntryId) -> Option<&LedgerEntry> {
        self.entries.values().flatten().find(|e| &e.id == id)
    }

    /// Returns the signed effect an entry has on its account's running balance
    ///
    /// Used by reconciliation to tie matched entries back to a statement.
    pub fn entry_effect(&self, id: &LedgerEntryId) -> Option<Money> {
        let entry = self.find_entry(id)?;
        let account_type = self.accounts.get(&entry.account_id)?.account_type;
        Some(Self::balance_delta(account_type, entry))
    }

    /// Stamps an account's last-reconciled fields
    pub fn mark_reconciled(
        &mut self,
        account_id: &AccountId,
        date: NaiveDate,
        balance: Money,
    ) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| LedgerError::UnknownAccount(account_id.to_string()))?;
        account.stamp_reconciled(date, balance);
        Ok(())
    }

    /// Calculates the signed running-balance change for an entry
    ///
    /// Debit-normal accounts (assets, expenses) grow on debit; all other
    /// accounts grow on credit.
    fn balance_delta(account_type: AccountType, entry: &LedgerEntry) -> Money {
        let amount = entry.amount();
        match (account_type.is_debit_normal(), entry.side()) {
            (true, EntrySide::Debit) => amount,
            (true, EntrySide::Credit) => -amount,
            (false, EntrySide::Debit) => -amount,
            (false, EntrySide::Credit) => amount,
        }
    }

    /// Generates a trial balance over the current running balances
    pub fn trial_balance(&self) -> TrialBalance {
        let mut rows = Vec::new();
        let mut total_debits = Money::zero(self.currency);
        let mut total_credits = Money::zero(self.currency);

        for account in self.accounts.values() {
            let balance = account.balance();
            if balance.is_zero() {
                continue;
            }

            // A positive balance sits in the account's normal column; a
            // negative balance flips to the opposite column.
            let natural_debit = account.account_type.is_debit_normal();
            let (debit, credit) = match (natural_debit, balance.is_positive()) {
                (true, true) | (false, false) => (balance.abs(), Money::zero(self.currency)),
                _ => (Money::zero(self.currency), balance.abs()),
            };

            total_debits = total_debits + debit;
            total_credits = total_credits + credit;

            rows.push(TrialBalanceRow {
                account_id: account.id,
                code: account.code.clone(),
                name: account.name.clone(),
                debit,
                credit,
            });
        }

        rows.sort_by(|a, b| a.code.cmp(&b.code));

        TrialBalance {
            is_balanced: total_debits == total_credits,
            total_debits,
            total_credits,
            rows,
        }
    }
}

/// Trial balance report
#[derive(Debug)]
pub struct TrialBalance {
    /// Individual account rows, ordered by code
    pub rows: Vec<TrialBalanceRow>,
    /// Total debits
    pub total_debits: Money,
    /// Total credits
    pub total_credits: Money,
    /// Whether the trial balance is balanced
    pub is_balanced: bool,
}

/// A single row in the trial balance
#[derive(Debug)]
pub struct TrialBalanceRow {
    /// Account id
    pub account_id: AccountId,
    /// Account code
    pub code: String,
    /// Account name
    pub name: String,
    /// Debit balance
    pub debit: Money,
    /// Credit balance
    pub credit: Money,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    proptest! {
        /// Posting then unposting any balanced pair leaves every balance untouched
        #[test]
        fn post_unpost_is_identity(minor in 1i64..1_000_000_000i64) {
            let mut ledger = GeneralLedger::new(Currency::USD);
            let a = AccountId::new();
            let b = AccountId::new();
            ledger.register_account(Account::new(a, "1000", "Checking", AccountType::Bank, Currency::USD)).unwrap();
            ledger.register_account(Account::new(b, "4000", "Sales", AccountType::Income, Currency::USD)).unwrap();

            let amount = Money::from_minor(minor, Currency::USD);
            let txn = TransactionId::new_v7();
            let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

            ledger.post(txn, date, &[
                EntryDraft::debit(a, amount),
                EntryDraft::credit(b, amount),
            ]).unwrap();
            ledger.unpost(&txn).unwrap();

            prop_assert_eq!(ledger.balance(&a).unwrap().amount(), Decimal::ZERO);
            prop_assert_eq!(ledger.balance(&b).unwrap().amount(), Decimal::ZERO);
        }

        /// The trial balance stays balanced under arbitrary balanced postings
        #[test]
        fn trial_balance_always_balances(amounts in proptest::collection::vec(1i64..100_000_000i64, 1..12)) {
            let mut ledger = GeneralLedger::new(Currency::USD);
            let a = AccountId::new();
            let b = AccountId::new();
            let c = AccountId::new();
            ledger.register_account(Account::new(a, "1000", "Checking", AccountType::Bank, Currency::USD)).unwrap();
            ledger.register_account(Account::new(b, "4000", "Sales", AccountType::Income, Currency::USD)).unwrap();
            ledger.register_account(Account::new(c, "5100", "Rent", AccountType::Expense, Currency::USD)).unwrap();

            let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
            for (i, minor) in amounts.iter().enumerate() {
                let amount = Money::from_minor(*minor, Currency::USD);
                let drafts = if i % 2 == 0 {
                    vec![EntryDraft::debit(a, amount), EntryDraft::credit(b, amount)]
                } else {
                    vec![EntryDraft::debit(c, amount), EntryDraft::credit(a, amount)]
                };
                ledger.post(TransactionId::new_v7(), date, &drafts).unwrap();
            }

            prop_assert!(ledger.trial_balance().is_balanced);
        }
    }
}
