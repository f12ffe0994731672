//! Transactions, line items, and status transitions
//!
//! The `amount` of a transaction is immutable once created; the
//! `balance` is the remaining unsettled portion and only moves through
//! the crate-internal settlement methods, so `0 <= balance <= amount`
//! holds at every observable point.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, ContactId, ContactKind, Currency, LineItemId, Money, Rate, TransactionId};
use domain_ledger::EntryDraft;

use crate::error::SettlementError;

/// Types of financial documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Customer invoice (accounts receivable)
    Invoice,
    /// Vendor bill (accounts payable)
    Bill,
    /// Customer or vendor payment
    Payment,
    /// Bank deposit; with a customer attached it is a prepayment credit
    Deposit,
    /// Credit memo reducing what a contact owes or is owed
    CreditMemo,
    /// Manual journal entry
    JournalEntry,
    /// Transfer between balance accounts
    Transfer,
    /// Cheque written against a bank account
    Cheque,
    /// Cash sale settled at the point of sale
    SalesReceipt,
}

impl TransactionType {
    /// Returns true for documents carried in accounts receivable
    pub fn is_receivable(&self) -> bool {
        matches!(self, TransactionType::Invoice)
    }

    /// Returns true for documents carried in accounts payable
    pub fn is_payable(&self) -> bool {
        matches!(self, TransactionType::Bill)
    }

    /// The reference-numbering scope for this type
    pub fn reference_scope(&self) -> &'static str {
        match self {
            TransactionType::Invoice => "INV",
            TransactionType::Bill => "BILL",
            TransactionType::Payment => "PAY",
            TransactionType::Deposit => "DEP",
            TransactionType::CreditMemo => "CR",
            TransactionType::JournalEntry => "JNL",
            TransactionType::Transfer => "TRF",
            TransactionType::Cheque => "CHQ",
            TransactionType::SalesReceipt => "SR",
        }
    }
}

/// Lifecycle status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Captured but not yet posted to the ledger
    Draft,
    /// Posted, nothing settled yet
    Open,
    /// Partially settled
    Partial,
    /// Fully settled (or settled at creation, e.g. a sales receipt)
    Completed,
    /// Voided; kept for audit, excluded from outstanding totals
    Voided,
    /// A credit with remaining value not yet linked to any document
    UnappliedCredit,
    /// A credit whose full value has been applied
    AppliedCredit,
}

impl TransactionStatus {
    /// Returns true while the document still carries an unsettled balance
    pub fn is_outstanding(&self) -> bool {
        matches!(self, TransactionStatus::Open | TransactionStatus::Partial)
    }

    /// Returns true for the credit-side statuses
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionStatus::UnappliedCredit | TransactionStatus::AppliedCredit
        )
    }
}

/// The contact a document belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact identifier
    pub id: ContactId,
    /// Customer or vendor
    pub kind: ContactKind,
}

impl Contact {
    pub fn customer(id: ContactId) -> Self {
        Self {
            id,
            kind: ContactKind::Customer,
        }
    }

    pub fn vendor(id: ContactId) -> Self {
        Self {
            id,
            kind: ContactKind::Vendor,
        }
    }
}

/// A line item on a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Line identifier
    pub id: LineItemId,
    /// Description
    pub description: String,
    /// Quantity
    pub quantity: Decimal,
    /// Unit price
    pub unit_price: Money,
    /// Sales tax rate, if taxable
    pub tax_rate: Option<Rate>,
    /// Income account (invoices) or expense account (bills)
    pub account_id: AccountId,
}

impl LineItem {
    /// Creates a new line with quantity one
    pub fn new(description: impl Into<String>, unit_price: Money, account_id: AccountId) -> Self {
        Self {
            id: LineItemId::new_v7(),
            description: description.into(),
            quantity: Decimal::ONE,
            unit_price,
            tax_rate: None,
            account_id,
        }
    }

    /// Sets the quantity
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    /// Marks the line taxable at the given rate
    pub fn with_tax_rate(mut self, rate: Rate) -> Self {
        self.tax_rate = Some(rate);
        self
    }

    /// Net amount before tax, rounded to the currency
    pub fn net(&self) -> Money {
        self.unit_price.multiply(self.quantity).round_to_currency()
    }

    /// Tax amount for this line
    pub fn tax(&self) -> Money {
        match &self.tax_rate {
            Some(rate) => rate.apply(&self.net()),
            None => Money::zero(self.unit_price.currency()),
        }
    }

    /// Line total including tax
    pub fn total(&self) -> Money {
        self.net() + self.tax()
    }
}

/// A financial document in the books
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: TransactionId,
    /// Document type
    pub txn_type: TransactionType,
    /// Human-readable reference, unique within the type's scope
    pub reference: String,
    /// Document date
    pub date: NaiveDate,
    /// Contact, required for AR/AP-touching documents
    pub contact: Option<Contact>,
    /// Document currency
    pub currency: Currency,
    /// Exchange rate into the ledger home currency
    pub exchange_rate: Decimal,
    /// Due date, if any
    pub due_date: Option<NaiveDate>,
    /// Free-form memo
    pub memo: Option<String>,
    /// Line items
    pub lines: Vec<LineItem>,
    /// Back-link to the payment that spawned this credit, if any
    pub source_payment: Option<TransactionId>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Original total; immutable after posting
    amount: Money,
    /// Remaining unsettled amount
    balance: Money,
    /// Lifecycle status
    status: TransactionStatus,
    /// Whether the balance represents credit available to apply
    credit_bearing: bool,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: TransactionId,
        txn_type: TransactionType,
        reference: String,
        date: NaiveDate,
        contact: Option<Contact>,
        currency: Currency,
        exchange_rate: Decimal,
        due_date: Option<NaiveDate>,
        memo: Option<String>,
        lines: Vec<LineItem>,
        amount: Money,
        status: TransactionStatus,
        credit_bearing: bool,
    ) -> Self {
        let balance = match status {
            TransactionStatus::Completed => Money::zero(currency),
            _ => amount,
        };
        Self {
            id,
            txn_type,
            reference,
            date,
            contact,
            currency,
            exchange_rate,
            due_date,
            memo,
            lines,
            source_payment: None,
            created_at: Utc::now(),
            amount,
            balance,
            status,
            credit_bearing,
        }
    }

    /// Original document total
    pub fn amount(&self) -> Money {
        self.amount
    }

    /// Remaining unsettled amount (or, for credits, remaining value)
    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Current lifecycle status
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Returns true if the balance represents applicable credit
    pub fn is_credit_bearing(&self) -> bool {
        self.credit_bearing
    }

    /// Reduces the balance by a settlement amount. Lifecycle-manager only.
    pub(crate) fn apply_settlement(&mut self, amount: Money) -> Result<(), SettlementError> {
        let next = self
            .balance
            .checked_sub(&amount)
            .map_err(|e| SettlementError::Calculation(e.to_string()))?;
        if next.is_negative() {
            return Err(SettlementError::InsufficientBalance {
                available: self.balance.amount(),
                requested: amount.amount(),
            });
        }
        self.balance = next;
        self.recompute_status();
        Ok(())
    }

    /// Restores the balance by a reversed settlement amount.
    pub(crate) fn reverse_settlement(&mut self, amount: Money) -> Result<(), SettlementError> {
        let next = self
            .balance
            .checked_add(&amount)
            .map_err(|e| SettlementError::Calculation(e.to_string()))?;
        if next.amount() > self.amount.amount() {
            return Err(SettlementError::Calculation(format!(
                "reversal would push balance {} above amount {}",
                next.amount(),
                self.amount.amount()
            )));
        }
        self.balance = next;
        self.recompute_status();
        Ok(())
    }

    pub(crate) fn mark_voided(&mut self) {
        // Balance is intentionally left at its last value for audit.
        self.status = TransactionStatus::Voided;
    }

    /// Moves a document out of draft once its entries are posted
    pub(crate) fn mark_posted(&mut self) {
        if self.credit_bearing {
            self.status = TransactionStatus::UnappliedCredit;
        } else if matches!(self.txn_type, TransactionType::Invoice | TransactionType::Bill) {
            self.status = TransactionStatus::Open;
        } else {
            // Point-of-sale documents settle at creation
            self.status = TransactionStatus::Completed;
            self.balance = Money::zero(self.currency);
        }
    }

    pub(crate) fn set_source_payment(&mut self, payment: TransactionId) {
        self.source_payment = Some(payment);
    }

    /// Recomputes the status from the balance
    ///
    /// Credit statuses reflect availability, not history: a partially
    /// consumed credit stays `UnappliedCredit` with a reduced balance.
    fn recompute_status(&mut self) {
        if self.credit_bearing {
            self.status = if self.balance.is_zero() {
                TransactionStatus::AppliedCredit
            } else {
                TransactionStatus::UnappliedCredit
            };
        } else if self.balance.is_zero() {
            self.status = TransactionStatus::Completed;
        } else if self.balance.amount() < self.amount.amount() {
            self.status = TransactionStatus::Partial;
        } else {
            self.status = TransactionStatus::Open;
        }
    }
}

/// Input for creating a transaction
#[derive(Debug, Clone)]
pub struct TransactionSpec {
    pub txn_type: TransactionType,
    pub reference: String,
    pub date: NaiveDate,
    pub contact: Option<Contact>,
    pub currency: Currency,
    pub exchange_rate: Decimal,
    pub due_date: Option<NaiveDate>,
    pub memo: Option<String>,
    pub lines: Vec<LineItem>,
    /// Supplied total for journal entries and transfers
    pub amount: Option<Money>,
    /// Caller-supplied entries; journal entries only
    pub journal_drafts: Vec<EntryDraft>,
    /// (from, to) accounts; transfers only
    pub transfer_accounts: Option<(AccountId, AccountId)>,
    /// Capture without posting; `finalize` posts later
    pub draft: bool,
}

impl TransactionSpec {
    fn base(txn_type: TransactionType, reference: impl Into<String>, date: NaiveDate, currency: Currency) -> Self {
        Self {
            txn_type,
            reference: reference.into(),
            date,
            contact: None,
            currency,
            exchange_rate: dec!(1),
            due_date: None,
            memo: None,
            lines: Vec::new(),
            amount: None,
            journal_drafts: Vec::new(),
            transfer_accounts: None,
            draft: false,
        }
    }

    /// Starts an invoice spec
    pub fn invoice(reference: impl Into<String>, date: NaiveDate, customer: ContactId, currency: Currency) -> Self {
        let mut spec = Self::base(TransactionType::Invoice, reference, date, currency);
        spec.contact = Some(Contact::customer(customer));
        spec
    }

    /// Starts a bill spec
    pub fn bill(reference: impl Into<String>, date: NaiveDate, vendor: ContactId, currency: Currency) -> Self {
        let mut spec = Self::base(TransactionType::Bill, reference, date, currency);
        spec.contact = Some(Contact::vendor(vendor));
        spec
    }

    /// Starts a sales receipt spec
    pub fn sales_receipt(reference: impl Into<String>, date: NaiveDate, currency: Currency) -> Self {
        Self::base(TransactionType::SalesReceipt, reference, date, currency)
    }

    /// Starts a credit memo spec for the given contact
    pub fn credit_memo(
        reference: impl Into<String>,
        date: NaiveDate,
        contact: Contact,
        currency: Currency,
    ) -> Self {
        let mut spec = Self::base(TransactionType::CreditMemo, reference, date, currency);
        spec.contact = Some(contact);
        spec
    }

    /// Starts a deposit spec; attach a customer to make it a prepayment credit
    pub fn deposit(reference: impl Into<String>, date: NaiveDate, currency: Currency) -> Self {
        Self::base(TransactionType::Deposit, reference, date, currency)
    }

    /// Starts a cheque spec
    pub fn cheque(reference: impl Into<String>, date: NaiveDate, currency: Currency) -> Self {
        Self::base(TransactionType::Cheque, reference, date, currency)
    }

    /// Starts a journal entry spec with caller-supplied entries
    pub fn journal_entry(
        reference: impl Into<String>,
        date: NaiveDate,
        currency: Currency,
        drafts: Vec<EntryDraft>,
    ) -> Self {
        let mut spec = Self::base(TransactionType::JournalEntry, reference, date, currency);
        spec.journal_drafts = drafts;
        spec
    }

    /// Starts a transfer spec between two balance accounts
    pub fn transfer(
        reference: impl Into<String>,
        date: NaiveDate,
        currency: Currency,
        from: AccountId,
        to: AccountId,
        amount: Money,
    ) -> Self {
        let mut spec = Self::base(TransactionType::Transfer, reference, date, currency);
        spec.transfer_accounts = Some((from, to));
        spec.amount = Some(amount);
        spec
    }

    /// Adds a line item
    pub fn with_line(mut self, line: LineItem) -> Self {
        self.lines.push(line);
        self
    }

    /// Sets the contact
    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contact = Some(contact);
        self
    }

    /// Sets the due date
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Sets the memo
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Sets the exchange rate into the ledger home currency
    pub fn with_exchange_rate(mut self, rate: Decimal) -> Self {
        self.exchange_rate = rate;
        self
    }

    /// Captures the document as a draft; nothing posts until `finalize`
    pub fn as_draft(mut self) -> Self {
        self.draft = true;
        self
    }

    /// Total of all line items including tax
    pub fn line_total(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::zero(self.currency), |acc, l| acc + l.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn test_line_item_totals() {
        let line = LineItem::new("Consulting", usd(dec!(150.00)), AccountId::new())
            .with_quantity(dec!(8))
            .with_tax_rate(Rate::from_percentage(dec!(10)));

        assert_eq!(line.net().amount(), dec!(1200.00));
        assert_eq!(line.tax().amount(), dec!(120.00));
        assert_eq!(line.total().amount(), dec!(1320.00));
    }

    #[test]
    fn test_untaxed_line_has_zero_tax() {
        let line = LineItem::new("Widget", usd(dec!(25.00)), AccountId::new()).with_quantity(dec!(3));
        assert!(line.tax().is_zero());
        assert_eq!(line.total().amount(), dec!(75.00));
    }

    #[test]
    fn test_spec_line_total() {
        let account = AccountId::new();
        let spec = TransactionSpec::invoice("INV-1", sample_date(), ContactId::new(), Currency::USD)
            .with_line(LineItem::new("A", usd(dec!(100)), account))
            .with_line(LineItem::new("B", usd(dec!(55.50)), account));

        assert_eq!(spec.line_total().amount(), dec!(155.50));
    }

    #[test]
    fn test_settlement_moves_status() {
        let mut txn = Transaction::new(
            TransactionId::new_v7(),
            TransactionType::Invoice,
            "INV-1".to_string(),
            sample_date(),
            Some(Contact::customer(ContactId::new())),
            Currency::USD,
            dec!(1),
            None,
            None,
            vec![],
            usd(dec!(1000)),
            TransactionStatus::Open,
            false,
        );

        txn.apply_settlement(usd(dec!(400))).unwrap();
        assert_eq!(txn.status(), TransactionStatus::Partial);
        assert_eq!(txn.balance().amount(), dec!(600));

        txn.apply_settlement(usd(dec!(600))).unwrap();
        assert_eq!(txn.status(), TransactionStatus::Completed);
        assert!(txn.balance().is_zero());
    }

    #[test]
    fn test_over_settlement_rejected() {
        let mut txn = Transaction::new(
            TransactionId::new_v7(),
            TransactionType::Invoice,
            "INV-1".to_string(),
            sample_date(),
            Some(Contact::customer(ContactId::new())),
            Currency::USD,
            dec!(1),
            None,
            None,
            vec![],
            usd(dec!(100)),
            TransactionStatus::Open,
            false,
        );

        let result = txn.apply_settlement(usd(dec!(150)));
        assert!(matches!(result, Err(SettlementError::InsufficientBalance { .. })));
        // Balance untouched on failure
        assert_eq!(txn.balance().amount(), dec!(100));
        assert_eq!(txn.status(), TransactionStatus::Open);
    }

    #[test]
    fn test_reversal_restores_status() {
        let mut txn = Transaction::new(
            TransactionId::new_v7(),
            TransactionType::Invoice,
            "INV-1".to_string(),
            sample_date(),
            Some(Contact::customer(ContactId::new())),
            Currency::USD,
            dec!(1),
            None,
            None,
            vec![],
            usd(dec!(1000)),
            TransactionStatus::Open,
            false,
        );

        txn.apply_settlement(usd(dec!(1000))).unwrap();
        assert_eq!(txn.status(), TransactionStatus::Completed);

        txn.reverse_settlement(usd(dec!(1000))).unwrap();
        assert_eq!(txn.status(), TransactionStatus::Open);
        assert_eq!(txn.balance().amount(), dec!(1000));
    }

    #[test]
    fn test_reversal_cannot_exceed_amount() {
        let mut txn = Transaction::new(
            TransactionId::new_v7(),
            TransactionType::Invoice,
            "INV-1".to_string(),
            sample_date(),
            Some(Contact::customer(ContactId::new())),
            Currency::USD,
            dec!(1),
            None,
            None,
            vec![],
            usd(dec!(100)),
            TransactionStatus::Open,
            false,
        );

        assert!(txn.reverse_settlement(usd(dec!(1))).is_err());
    }

    #[test]
    fn test_credit_status_reflects_availability() {
        let mut credit = Transaction::new(
            TransactionId::new_v7(),
            TransactionType::CreditMemo,
            "CR-1".to_string(),
            sample_date(),
            Some(Contact::customer(ContactId::new())),
            Currency::USD,
            dec!(1),
            None,
            None,
            vec![],
            usd(dec!(385)),
            TransactionStatus::UnappliedCredit,
            true,
        );

        credit.apply_settlement(usd(dec!(100))).unwrap();
        // Partially consumed credits stay unapplied with a reduced balance
        assert_eq!(credit.status(), TransactionStatus::UnappliedCredit);
        assert_eq!(credit.balance().amount(), dec!(285));

        credit.apply_settlement(usd(dec!(285))).unwrap();
        assert_eq!(credit.status(), TransactionStatus::AppliedCredit);
    }
}
