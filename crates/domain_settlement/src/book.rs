//! The settlement book: transaction lifecycle management
//!
//! `SettlementBook` owns the general ledger and every financial
//! document. All balance movement funnels through `settle` /
//! `reverse_settlement` internals keyed by idempotency keys, and every
//! public operation validates completely before mutating anything, so a
//! failed call leaves no observable change.
//!
//! Store-backed deployments serialize concurrent callers with row locks
//! taken in a fixed order: credit before target, ascending id as the
//! tiebreak.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::debug;

use core_kernel::{AccountId, ContactKind, Currency, Money, TransactionId};
use domain_ledger::{EntryDraft, GeneralLedger};

use crate::credit::ApplicationLink;
use crate::error::SettlementError;
use crate::transaction::{
    Contact, Transaction, TransactionSpec, TransactionStatus, TransactionType,
};

/// The control and clearing accounts each document type posts against
#[derive(Debug, Clone, Copy)]
pub struct PostingMap {
    /// Accounts receivable control account
    pub accounts_receivable: AccountId,
    /// Accounts payable control account
    pub accounts_payable: AccountId,
    /// Default bank account for deposits and payments
    pub bank: AccountId,
    /// Sales tax liability account
    pub sales_tax_payable: AccountId,
}

/// An idempotently recorded settlement event
#[derive(Debug, Clone)]
pub(crate) struct SettlementRecord {
    pub transaction_id: TransactionId,
    pub amount: Money,
    /// Payment or credit that caused the settlement, if any
    pub source: Option<TransactionId>,
    #[allow(dead_code)]
    pub recorded_at: DateTime<Utc>,
}

/// One target of a payment
#[derive(Debug, Clone)]
pub struct PaymentApplication {
    /// Invoice or bill being paid
    pub target: TransactionId,
    /// Amount applied to it
    pub amount: Money,
}

/// Input for recording a payment
#[derive(Debug, Clone)]
pub struct PaymentSpec {
    /// Payment reference, unique within the payment scope
    pub reference: String,
    /// Payment date
    pub date: NaiveDate,
    /// Paying customer or paid vendor
    pub contact: Contact,
    /// Total received (or paid out, for vendor payments)
    pub amount: Money,
    /// Exchange rate into the ledger home currency
    pub exchange_rate: rust_decimal::Decimal,
    /// Bank account; defaults to the posting map's bank
    pub deposit_account: Option<AccountId>,
    /// Documents this payment settles
    pub applications: Vec<PaymentApplication>,
    /// Free-form memo
    pub memo: Option<String>,
}

/// Result of recording a payment
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    /// The created payment transaction
    pub payment_id: TransactionId,
    /// The unapplied credit spawned by an overpayment, if any
    pub credit_id: Option<TransactionId>,
    /// Documents settled by the payment
    pub settled: Vec<TransactionId>,
}

/// The owning aggregate for documents, settlements, and links
#[derive(Debug)]
pub struct SettlementBook {
    ledger: GeneralLedger,
    transactions: HashMap<TransactionId, Transaction>,
    pub(crate) settlements: HashMap<String, SettlementRecord>,
    pub(crate) links: HashMap<core_kernel::ApplicationLinkId, ApplicationLink>,
}

impl SettlementBook {
    /// Creates an empty book with a ledger in the given home currency
    pub fn new(currency: Currency) -> Self {
        Self {
            ledger: GeneralLedger::new(currency),
            transactions: HashMap::new(),
            settlements: HashMap::new(),
            links: HashMap::new(),
        }
    }

    /// Read access to the general ledger
    pub fn ledger(&self) -> &GeneralLedger {
        &self.ledger
    }

    /// Mutable access to the general ledger (account registration etc.)
    pub fn ledger_mut(&mut self) -> &mut GeneralLedger {
        &mut self.ledger
    }

    /// Gets a transaction by id
    pub fn transaction(&self, id: &TransactionId) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    /// Iterates over all transactions
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }

    /// Creates a transaction, posting the entries its type implies
    ///
    /// The amount is computed from the line items (journal entries and
    /// transfers supply theirs), the initial balance equals the amount,
    /// and the status lands on `Open` for invoices and bills,
    /// `UnappliedCredit` for standalone credits, `Completed` for
    /// documents that settle at creation, or `Draft` when requested.
    ///
    /// # Errors
    ///
    /// Rejects duplicate references, missing or wrong-kind contacts,
    /// empty documents, and anything the ledger poster rejects.
    pub fn create(
        &mut self,
        spec: TransactionSpec,
        map: &PostingMap,
    ) -> Result<TransactionId, SettlementError> {
        if spec.txn_type == TransactionType::Payment {
            return Err(SettlementError::InvalidOperation(
                "payments are recorded through record_payment".to_string(),
            ));
        }
        self.check_reference_free(spec.txn_type, &spec.reference)?;
        Self::check_contact_rules(&spec)?;

        let credit_bearing = Self::is_credit_bearing_spec(&spec);
        let amount = self.document_amount(&spec)?;
        if !amount.is_positive() {
            return Err(SettlementError::InvalidOperation(format!(
                "document total must be positive, got {}",
                amount.amount()
            )));
        }
        if spec.draft
            && matches!(
                spec.txn_type,
                TransactionType::JournalEntry | TransactionType::Transfer
            )
        {
            return Err(SettlementError::InvalidOperation(
                "journal entries and transfers cannot be drafted".to_string(),
            ));
        }

        let id = TransactionId::new_v7();
        let mut txn = Transaction::new(
            id,
            spec.txn_type,
            spec.reference.clone(),
            spec.date,
            spec.contact,
            spec.currency,
            spec.exchange_rate,
            spec.due_date,
            spec.memo.clone(),
            spec.lines.clone(),
            amount,
            TransactionStatus::Draft,
            credit_bearing,
        );

        if !spec.draft {
            let drafts = self.entry_drafts_for(&spec, amount, map)?;
            self.ledger.post(id, spec.date, &drafts)?;
            txn.mark_posted();
        }

        debug!(transaction = %id, txn_type = ?spec.txn_type, status = ?txn.status(), "created transaction");
        self.transactions.insert(id, txn);
        Ok(id)
    }

    /// Posts a drafted document and moves it to its open status
    pub fn finalize(
        &mut self,
        id: &TransactionId,
        map: &PostingMap,
    ) -> Result<(), SettlementError> {
        let txn = self
            .transactions
            .get(id)
            .ok_or_else(|| SettlementError::UnknownTransaction(id.to_string()))?;
        if txn.status() != TransactionStatus::Draft {
            return Err(SettlementError::InvalidOperation(format!(
                "only drafts can be finalized, status is {:?}",
                txn.status()
            )));
        }

        let spec = TransactionSpec {
            txn_type: txn.txn_type,
            reference: txn.reference.clone(),
            date: txn.date,
            contact: txn.contact,
            currency: txn.currency,
            exchange_rate: txn.exchange_rate,
            due_date: txn.due_date,
            memo: txn.memo.clone(),
            lines: txn.lines.clone(),
            amount: None,
            journal_drafts: Vec::new(),
            transfer_accounts: None,
            draft: false,
        };
        let amount = txn.amount();
        let date = txn.date;

        let drafts = self.entry_drafts_for(&spec, amount, map)?;
        self.ledger.post(*id, date, &drafts)?;
        self.transactions
            .get_mut(id)
            .expect("presence checked above")
            .mark_posted();
        Ok(())
    }

    /// Settles part or all of a document's balance
    ///
    /// Idempotent under retry: a repeated call with the same settlement
    /// key is a no-op returning the already-settled document.
    ///
    /// # Arguments
    ///
    /// * `id` - Invoice or bill to settle
    /// * `amount` - Amount to apply, in the document's currency
    /// * `settlement_key` - Caller-supplied idempotency key
    ///
    /// # Errors
    ///
    /// - `InsufficientBalance` if the amount exceeds the remaining balance
    /// - `DuplicateSettlementKey` if the key was used for another document
    pub fn settle(
        &mut self,
        id: &TransactionId,
        amount: Money,
        settlement_key: &str,
    ) -> Result<&Transaction, SettlementError> {
        self.settle_internal(id, amount, settlement_key, None)?;
        Ok(&self.transactions[id])
    }

    pub(crate) fn settle_internal(
        &mut self,
        id: &TransactionId,
        amount: Money,
        settlement_key: &str,
        source: Option<TransactionId>,
    ) -> Result<(), SettlementError> {
        if let Some(existing) = self.settlements.get(settlement_key) {
            if &existing.transaction_id == id {
                // Retried settlement; already applied.
                return Ok(());
            }
            return Err(SettlementError::DuplicateSettlementKey(
                settlement_key.to_string(),
            ));
        }

        let txn = self
            .transactions
            .get_mut(id)
            .ok_or_else(|| SettlementError::UnknownTransaction(id.to_string()))?;
        if txn.is_credit_bearing() {
            return Err(SettlementError::InvalidOperation(
                "credits are consumed through apply_credit".to_string(),
            ));
        }
        if !txn.status().is_outstanding() {
            return Err(SettlementError::InvalidOperation(format!(
                "cannot settle a document in status {:?}",
                txn.status()
            )));
        }
        if !amount.is_positive() {
            return Err(SettlementError::InvalidOperation(
                "settlement amount must be positive".to_string(),
            ));
        }
        if amount.currency() != txn.currency {
            return Err(SettlementError::Calculation(format!(
                "settlement currency {} does not match document currency {}",
                amount.currency(),
                txn.currency
            )));
        }

        txn.apply_settlement(amount)?;
        self.settlements.insert(
            settlement_key.to_string(),
            SettlementRecord {
                transaction_id: *id,
                amount,
                source,
                recorded_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Reverses the settlement stored under a key, restoring the target's balance
    pub(crate) fn unsettle_key(&mut self, key: &str) -> Result<TransactionId, SettlementError> {
        let record = self
            .settlements
            .remove(key)
            .ok_or_else(|| SettlementError::InvalidOperation(format!("no settlement under key {}", key)))?;
        let txn = self
            .transactions
            .get_mut(&record.transaction_id)
            .ok_or_else(|| SettlementError::UnknownTransaction(record.transaction_id.to_string()))?;
        txn.reverse_settlement(record.amount)?;
        Ok(record.transaction_id)
    }

    /// Voids a document
    ///
    /// Legal only for drafts and for open documents with no recorded
    /// settlement. The ledger entries are unposted; the balance stays at
    /// its last value for audit and the document drops out of all
    /// outstanding totals.
    pub fn void(&mut self, id: &TransactionId) -> Result<(), SettlementError> {
        let txn = self
            .transactions
            .get(id)
            .ok_or_else(|| SettlementError::UnknownTransaction(id.to_string()))?;

        match txn.status() {
            TransactionStatus::Draft => {}
            TransactionStatus::Open | TransactionStatus::Partial => {
                if self.settlements.values().any(|r| &r.transaction_id == id) {
                    return Err(SettlementError::InvalidOperation(
                        "settled documents cannot be voided; reverse the settlements first"
                            .to_string(),
                    ));
                }
            }
            other => {
                return Err(SettlementError::InvalidOperation(format!(
                    "cannot void a document in status {:?}",
                    other
                )));
            }
        }
        if self.links_touching(id) {
            return Err(SettlementError::DanglingReference(format!(
                "application links still reference {}",
                id
            )));
        }

        if self.ledger.is_posted(id) {
            self.ledger.unpost(id)?;
        }
        self.transactions
            .get_mut(id)
            .expect("presence checked above")
            .mark_voided();
        debug!(transaction = %id, "voided transaction");
        Ok(())
    }

    /// Deletes a document, unposting its entries first
    ///
    /// # Errors
    ///
    /// Returns `DanglingReference` while application links touch the
    /// document, or when a payment still has spawned credits or
    /// settlements - those must go through `delete_payment_cascade`.
    pub fn delete(&mut self, id: &TransactionId) -> Result<(), SettlementError> {
        let txn = self
            .transactions
            .get(id)
            .ok_or_else(|| SettlementError::UnknownTransaction(id.to_string()))?;

        if self.links_touching(id) {
            return Err(SettlementError::DanglingReference(format!(
                "application links still reference {}",
                id
            )));
        }
        if txn.txn_type == TransactionType::Payment {
            let has_children = self.spawned_credits(id).next().is_some()
                || self
                    .settlements
                    .values()
                    .any(|r| r.source.as_ref() == Some(id));
            if has_children {
                return Err(SettlementError::DanglingReference(format!(
                    "payment {} has dependent credits or settlements; use delete_payment_cascade",
                    id
                )));
            }
        }

        // Settlement records targeting a removed row would dangle.
        self.settlements.retain(|_, r| &r.transaction_id != id);

        if self.ledger.is_posted(id) {
            self.ledger.unpost(id)?;
        }
        self.transactions.remove(id);
        debug!(transaction = %id, "deleted transaction");
        Ok(())
    }

    /// Records a payment against one or more open documents
    ///
    /// Posts the payment entries, settles each targeted document, and
    /// spawns an unapplied credit for any overpayment remainder - all as
    /// one unit: every validation runs before the first mutation.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let outcome = book.record_payment(PaymentSpec {
    ///     reference: "PAY-2041".into(),
    ///     date,
    ///     contact: Contact::customer(customer),
    ///     amount: Money::new(dec!(1540.00), Currency::USD),
    ///     exchange_rate: Decimal::ONE,
    ///     deposit_account: None,
    ///     applications: vec![PaymentApplication { target: invoice, amount: invoice_total }],
    ///     memo: None,
    /// }, &map)?;
    /// assert!(outcome.credit_id.is_some()); // 385.00 overpaid
    /// ```
    pub fn record_payment(
        &mut self,
        spec: PaymentSpec,
        map: &PostingMap,
    ) -> Result<PaymentOutcome, SettlementError> {
        self.check_reference_free(TransactionType::Payment, &spec.reference)?;
        if !spec.amount.is_positive() {
            return Err(SettlementError::InvalidOperation(
                "payment amount must be positive".to_string(),
            ));
        }

        let mut applied_total = Money::zero(spec.amount.currency());
        // Applications may repeat a target; the per-target check runs
        // against the cumulative amount so the mutation below can never
        // fail halfway through.
        let mut per_target: HashMap<TransactionId, Money> = HashMap::new();
        for app in &spec.applications {
            let target = self
                .transactions
                .get(&app.target)
                .ok_or_else(|| SettlementError::UnknownTransaction(app.target.to_string()))?;
            Self::check_payment_target(&spec.contact, target)?;
            if !app.amount.is_positive() {
                return Err(SettlementError::InvalidOperation(
                    "application amount must be positive".to_string(),
                ));
            }
            if app.amount.currency() != target.currency {
                return Err(SettlementError::Calculation(format!(
                    "application currency {} does not match document currency {}",
                    app.amount.currency(),
                    target.currency
                )));
            }
            let cumulative = match per_target.get(&app.target) {
                Some(prior) => prior
                    .checked_add(&app.amount)
                    .map_err(|e| SettlementError::Calculation(e.to_string()))?,
                None => app.amount,
            };
            if cumulative.amount() > target.balance().amount() {
                return Err(SettlementError::InsufficientBalance {
                    available: target.balance().amount(),
                    requested: cumulative.amount(),
                });
            }
            per_target.insert(app.target, cumulative);
            applied_total = applied_total
                .checked_add(&app.amount)
                .map_err(|e| SettlementError::Calculation(e.to_string()))?;
        }
        if applied_total.amount() > spec.amount.amount() {
            return Err(SettlementError::InsufficientCredit {
                available: spec.amount.amount(),
                requested: applied_total.amount(),
            });
        }

        let remainder = spec.amount - applied_total;
        let credit_reference = format!("{}-CR", spec.reference);
        if remainder.is_positive() {
            self.check_reference_free(TransactionType::CreditMemo, &credit_reference)?;
        }

        // Validation complete; mutate.
        let payment_id = TransactionId::new_v7();
        let deposit_account = spec.deposit_account.unwrap_or(map.bank);
        let amount_home = self.to_home(spec.amount, spec.exchange_rate)?;
        let drafts = match spec.contact.kind {
            ContactKind::Customer => vec![
                EntryDraft::debit(deposit_account, amount_home),
                EntryDraft::credit(map.accounts_receivable, amount_home),
            ],
            ContactKind::Vendor => vec![
                EntryDraft::debit(map.accounts_payable, amount_home),
                EntryDraft::credit(deposit_account, amount_home),
            ],
        };
        self.ledger.post(payment_id, spec.date, &drafts)?;

        let mut payment = Transaction::new(
            payment_id,
            TransactionType::Payment,
            spec.reference.clone(),
            spec.date,
            Some(spec.contact),
            spec.amount.currency(),
            spec.exchange_rate,
            None,
            spec.memo.clone(),
            vec![],
            spec.amount,
            TransactionStatus::Draft,
            false,
        );
        payment.mark_posted();
        self.transactions.insert(payment_id, payment);

        let mut settled = Vec::with_capacity(spec.applications.len());
        for (i, app) in spec.applications.iter().enumerate() {
            let key = format!("{}:{}:{}", payment_id, app.target, i);
            self.settle_internal(&app.target, app.amount, &key, Some(payment_id))?;
            settled.push(app.target);
        }

        let credit_id = if remainder.is_positive() {
            let id = TransactionId::new_v7();
            let mut credit = Transaction::new(
                id,
                TransactionType::CreditMemo,
                credit_reference,
                spec.date,
                Some(spec.contact),
                remainder.currency(),
                spec.exchange_rate,
                None,
                None,
                vec![],
                remainder,
                TransactionStatus::UnappliedCredit,
                true,
            );
            // The payment already posted the full amount against the
            // control account, so the overpayment credit carries no
            // ledger entries of its own.
            credit.set_source_payment(payment_id);
            self.transactions.insert(id, credit);
            Some(id)
        } else {
            None
        };

        debug!(
            payment = %payment_id,
            settled = settled.len(),
            overpayment = %remainder.amount(),
            "recorded payment"
        );
        Ok(PaymentOutcome {
            payment_id,
            credit_id,
            settled,
        })
    }

    /// Total outstanding receivable balance, voided documents excluded
    pub fn outstanding_receivables(&self) -> Result<Money, SettlementError> {
        self.outstanding_total(TransactionType::is_receivable)
    }

    /// Total outstanding payable balance, voided documents excluded
    pub fn outstanding_payables(&self) -> Result<Money, SettlementError> {
        self.outstanding_total(TransactionType::is_payable)
    }

    fn outstanding_total(
        &self,
        filter: impl Fn(&TransactionType) -> bool,
    ) -> Result<Money, SettlementError> {
        let mut total = Money::zero(self.ledger.currency());
        for txn in self.transactions.values() {
            if filter(&txn.txn_type) && txn.status().is_outstanding() {
                let home = self.to_home(txn.balance(), txn.exchange_rate)?;
                total = total
                    .checked_add(&home)
                    .map_err(|e| SettlementError::Calculation(e.to_string()))?;
            }
        }
        Ok(total)
    }

    /// Credits spawned by the given payment
    pub(crate) fn spawned_credits(
        &self,
        payment_id: &TransactionId,
    ) -> impl Iterator<Item = TransactionId> + '_ {
        let payment_id = *payment_id;
        self.transactions
            .values()
            .filter(move |t| t.source_payment == Some(payment_id))
            .map(|t| t.id)
    }

    pub(crate) fn links_touching(&self, id: &TransactionId) -> bool {
        self.links
            .values()
            .any(|l| &l.credit_id == id || &l.target_id == id)
    }

    pub(crate) fn remove_transaction_row(&mut self, id: &TransactionId) {
        self.transactions.remove(id);
    }

    pub(crate) fn transaction_mut(
        &mut self,
        id: &TransactionId,
    ) -> Result<&mut Transaction, SettlementError> {
        self.transactions
            .get_mut(id)
            .ok_or_else(|| SettlementError::UnknownTransaction(id.to_string()))
    }

    /// Converts a document-currency amount into the ledger home currency
    pub(crate) fn to_home(
        &self,
        amount: Money,
        exchange_rate: rust_decimal::Decimal,
    ) -> Result<Money, SettlementError> {
        if amount.currency() == self.ledger.currency() {
            return Ok(amount);
        }
        amount
            .convert(exchange_rate, self.ledger.currency())
            .map_err(|e| SettlementError::Calculation(e.to_string()))
    }

    fn check_reference_free(
        &self,
        txn_type: TransactionType,
        reference: &str,
    ) -> Result<(), SettlementError> {
        let clash = self
            .transactions
            .values()
            .any(|t| t.txn_type == txn_type && t.reference == reference);
        if clash {
            return Err(SettlementError::DuplicateReference(format!(
                "{}/{}",
                txn_type.reference_scope(),
                reference
            )));
        }
        Ok(())
    }

    fn check_contact_rules(spec: &TransactionSpec) -> Result<(), SettlementError> {
        let kind = spec.contact.map(|c| c.kind);
        match spec.txn_type {
            TransactionType::Invoice => match kind {
                Some(ContactKind::Customer) => Ok(()),
                Some(ContactKind::Vendor) => Err(SettlementError::InvalidContactKind(
                    "an invoice requires a customer".to_string(),
                )),
                None => Err(SettlementError::MissingContact(
                    "an invoice requires a customer".to_string(),
                )),
            },
            TransactionType::Bill => match kind {
                Some(ContactKind::Vendor) => Ok(()),
                Some(ContactKind::Customer) => Err(SettlementError::InvalidContactKind(
                    "a bill requires a vendor".to_string(),
                )),
                None => Err(SettlementError::MissingContact(
                    "a bill requires a vendor".to_string(),
                )),
            },
            TransactionType::CreditMemo => {
                if kind.is_none() {
                    Err(SettlementError::MissingContact(
                        "a credit memo requires a contact".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
            TransactionType::SalesReceipt => match kind {
                Some(ContactKind::Vendor) => Err(SettlementError::InvalidContactKind(
                    "a sales receipt contact must be a customer".to_string(),
                )),
                _ => Ok(()),
            },
            TransactionType::Deposit => match kind {
                Some(ContactKind::Vendor) => Err(SettlementError::InvalidContactKind(
                    "a deposit contact must be a customer".to_string(),
                )),
                _ => Ok(()),
            },
            TransactionType::Cheque => match kind {
                Some(ContactKind::Customer) => Err(SettlementError::InvalidContactKind(
                    "a cheque contact must be a vendor".to_string(),
                )),
                _ => Ok(()),
            },
            TransactionType::JournalEntry | TransactionType::Transfer => Ok(()),
            TransactionType::Payment => Ok(()),
        }
    }

    fn check_payment_target(
        contact: &Contact,
        target: &Transaction,
    ) -> Result<(), SettlementError> {
        let target_contact = target.contact.ok_or_else(|| {
            SettlementError::MissingContact(format!("document {} has no contact", target.id))
        })?;
        if target_contact.id != contact.id {
            return Err(SettlementError::InvalidContactKind(format!(
                "document {} belongs to a different contact",
                target.id
            )));
        }
        let compatible = match contact.kind {
            ContactKind::Customer => target.txn_type.is_receivable(),
            ContactKind::Vendor => target.txn_type.is_payable(),
        };
        if !compatible {
            return Err(SettlementError::InvalidContactKind(format!(
                "a {:?} payment cannot settle a {:?}",
                contact.kind, target.txn_type
            )));
        }
        if !target.status().is_outstanding() {
            return Err(SettlementError::InvalidOperation(format!(
                "document {} is not open for settlement (status {:?})",
                target.id,
                target.status()
            )));
        }
        Ok(())
    }

    fn is_credit_bearing_spec(spec: &TransactionSpec) -> bool {
        match spec.txn_type {
            TransactionType::CreditMemo => true,
            TransactionType::Deposit => {
                matches!(spec.contact.map(|c| c.kind), Some(ContactKind::Customer))
            }
            _ => false,
        }
    }

    fn document_amount(&self, spec: &TransactionSpec) -> Result<Money, SettlementError> {
        match spec.txn_type {
            TransactionType::Invoice
            | TransactionType::Bill
            | TransactionType::SalesReceipt
            | TransactionType::CreditMemo
            | TransactionType::Cheque => {
                if spec.lines.is_empty() {
                    return Err(SettlementError::InvalidOperation(
                        "document requires at least one line item".to_string(),
                    ));
                }
                Ok(spec.line_total())
            }
            TransactionType::Deposit => {
                if Self::is_credit_bearing_spec(spec) {
                    spec.amount.ok_or_else(|| {
                        SettlementError::InvalidOperation(
                            "a customer prepayment deposit requires an amount".to_string(),
                        )
                    })
                } else if spec.lines.is_empty() {
                    Err(SettlementError::InvalidOperation(
                        "a deposit requires line items".to_string(),
                    ))
                } else {
                    Ok(spec.line_total())
                }
            }
            TransactionType::Transfer => spec.amount.ok_or_else(|| {
                SettlementError::InvalidOperation("a transfer requires an amount".to_string())
            }),
            TransactionType::JournalEntry => {
                if spec.journal_drafts.is_empty() {
                    return Err(SettlementError::InvalidOperation(
                        "a journal entry requires caller-supplied entries".to_string(),
                    ));
                }
                if let Some(amount) = spec.amount {
                    return Ok(amount);
                }
                let mut total = Money::zero(self.ledger.currency());
                for draft in &spec.journal_drafts {
                    if draft.debit.is_positive() {
                        total = total
                            .checked_add(&draft.debit)
                            .map_err(|e| SettlementError::Calculation(e.to_string()))?;
                    }
                }
                Ok(total)
            }
            TransactionType::Payment => unreachable!("payments are rejected before amount computation"),
        }
    }

    /// Builds the balancing entries a document type implies
    ///
    /// Components are converted into the home currency individually and
    /// the control-account side is their exact sum, so rounding can
    /// never unbalance the set.
    fn entry_drafts_for(
        &self,
        spec: &TransactionSpec,
        amount: Money,
        map: &PostingMap,
    ) -> Result<Vec<EntryDraft>, SettlementError> {
        let home = self.ledger.currency();
        let rate = spec.exchange_rate;

        let lined = |control: AccountId,
                     lines_debit: bool|
         -> Result<Vec<EntryDraft>, SettlementError> {
            // lines_debit: true when line accounts take the debit side
            // (bills, cheques) and the control account the credit side.
            let mut drafts = Vec::with_capacity(spec.lines.len() + 2);
            let mut control_total = Money::zero(home);
            let mut tax_total = Money::zero(home);

            for line in &spec.lines {
                if lines_debit {
                    // Input tax is folded into the expense side.
                    let total = self.to_home(line.total(), rate)?;
                    drafts.push(EntryDraft::debit(line.account_id, total));
                    control_total = control_total
                        .checked_add(&total)
                        .map_err(|e| SettlementError::Calculation(e.to_string()))?;
                } else {
                    let net = self.to_home(line.net(), rate)?;
                    drafts.push(EntryDraft::credit(line.account_id, net));
                    control_total = control_total
                        .checked_add(&net)
                        .map_err(|e| SettlementError::Calculation(e.to_string()))?;
                    let tax = self.to_home(line.tax(), rate)?;
                    if tax.is_positive() {
                        tax_total = tax_total
                            .checked_add(&tax)
                            .map_err(|e| SettlementError::Calculation(e.to_string()))?;
                    }
                }
            }
            if tax_total.is_positive() {
                drafts.push(EntryDraft::credit(map.sales_tax_payable, tax_total));
                control_total = control_total
                    .checked_add(&tax_total)
                    .map_err(|e| SettlementError::Calculation(e.to_string()))?;
            }
            if lines_debit {
                drafts.push(EntryDraft::credit(control, control_total));
            } else {
                drafts.insert(0, EntryDraft::debit(control, control_total));
            }
            Ok(drafts)
        };

        match spec.txn_type {
            TransactionType::Invoice => lined(map.accounts_receivable, false),
            TransactionType::SalesReceipt => lined(map.bank, false),
            TransactionType::Bill => lined(map.accounts_payable, true),
            TransactionType::Cheque => lined(map.bank, true),
            TransactionType::CreditMemo => {
                let contact = spec.contact.expect("validated in check_contact_rules");
                match contact.kind {
                    // A customer credit reverses invoice postings:
                    // debit income and tax, credit receivable.
                    ContactKind::Customer => {
                        let mut drafts = Vec::with_capacity(spec.lines.len() + 2);
                        let mut control_total = Money::zero(home);
                        let mut tax_total = Money::zero(home);
                        for line in &spec.lines {
                            let net = self.to_home(line.net(), rate)?;
                            drafts.push(EntryDraft::debit(line.account_id, net));
                            control_total = control_total
                                .checked_add(&net)
                                .map_err(|e| SettlementError::Calculation(e.to_string()))?;
                            let tax = self.to_home(line.tax(), rate)?;
                            if tax.is_positive() {
                                tax_total = tax_total
                                    .checked_add(&tax)
                                    .map_err(|e| SettlementError::Calculation(e.to_string()))?;
                            }
                        }
                        if tax_total.is_positive() {
                            drafts.push(EntryDraft::debit(map.sales_tax_payable, tax_total));
                            control_total = control_total
                                .checked_add(&tax_total)
                                .map_err(|e| SettlementError::Calculation(e.to_string()))?;
                        }
                        drafts.push(EntryDraft::credit(map.accounts_receivable, control_total));
                        Ok(drafts)
                    }
                    // A vendor credit reverses bill postings.
                    ContactKind::Vendor => {
                        let mut drafts = Vec::with_capacity(spec.lines.len() + 1);
                        let mut control_total = Money::zero(home);
                        for line in &spec.lines {
                            let total = self.to_home(line.total(), rate)?;
                            drafts.push(EntryDraft::credit(line.account_id, total));
                            control_total = control_total
                                .checked_add(&total)
                                .map_err(|e| SettlementError::Calculation(e.to_string()))?;
                        }
                        drafts.insert(0, EntryDraft::debit(map.accounts_payable, control_total));
                        Ok(drafts)
                    }
                }
            }
            TransactionType::Deposit => {
                if Self::is_credit_bearing_spec(spec) {
                    let amount_home = self.to_home(amount, rate)?;
                    Ok(vec![
                        EntryDraft::debit(map.bank, amount_home),
                        EntryDraft::credit(map.accounts_receivable, amount_home),
                    ])
                } else {
                    let mut drafts = Vec::with_capacity(spec.lines.len() + 1);
                    let mut control_total = Money::zero(home);
                    for line in &spec.lines {
                        let total = self.to_home(line.total(), rate)?;
                        drafts.push(EntryDraft::credit(line.account_id, total));
                        control_total = control_total
                            .checked_add(&total)
                            .map_err(|e| SettlementError::Calculation(e.to_string()))?;
                    }
                    drafts.insert(0, EntryDraft::debit(map.bank, control_total));
                    Ok(drafts)
                }
            }
            TransactionType::Transfer => {
                let (from, to) = spec.transfer_accounts.ok_or_else(|| {
                    SettlementError::InvalidOperation("a transfer requires accounts".to_string())
                })?;
                let amount_home = self.to_home(amount, rate)?;
                Ok(vec![
                    EntryDraft::debit(to, amount_home),
                    EntryDraft::credit(from, amount_home),
                ])
            }
            TransactionType::JournalEntry => Ok(spec.journal_drafts.clone()),
            TransactionType::Payment => unreachable!("payments build their drafts inline"),
        }
    }
}
