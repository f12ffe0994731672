//! The credit application engine
//!
//! An unapplied credit (overpayment or credit memo) is linked to the
//! invoices or bills it settles through explicit `ApplicationLink`
//! records. The link is the single source of truth for "is this credit
//! applied" - reconstruction never falls back to matching description
//! strings.
//!
//! Deleting a payment that spawned a credit runs as one unit in a
//! strict order: reverse the credit's links, delete the credit, reverse
//! the payment's own settlements, unpost the payment, and only then
//! remove the payment row. Removing the row first is what used to
//! orphan credits and strand invoice balances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use core_kernel::{ApplicationLinkId, ContactKind, Money, TransactionId};

use crate::book::SettlementBook;
use crate::error::SettlementError;
use crate::transaction::TransactionType;

/// A link tying an amount of a credit to the document it settles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationLink {
    /// Unique identifier
    pub id: ApplicationLinkId,
    /// The credit being consumed
    pub credit_id: TransactionId,
    /// The invoice or bill being settled
    pub target_id: TransactionId,
    /// Amount applied
    pub amount: Money,
    /// When the application was made
    pub applied_at: DateTime<Utc>,
}

/// Result of a payment cascade deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Credits deleted along with the payment
    pub credits_deleted: usize,
    /// Distinct documents whose balance was restored
    pub invoices_restored: usize,
}

impl SettlementBook {
    /// Applies part of a credit's remaining value to an open document
    ///
    /// Preconditions: the credit has at least `amount` unapplied, the
    /// target has at least `amount` outstanding, both belong to the same
    /// contact, and the kinds line up - a customer credit settles that
    /// customer's invoices, a vendor credit that vendor's bills.
    ///
    /// The credit's balance drops by `amount`, the target is settled by
    /// `amount` under a link-derived idempotency key, and the link is
    /// recorded for reversal and reporting.
    ///
    /// # Errors
    ///
    /// - `InsufficientCredit` / `InsufficientBalance` on amount overruns
    /// - `InvalidContactKind` on cross-contact or cross-kind application
    pub fn apply_credit(
        &mut self,
        credit_id: &TransactionId,
        target_id: &TransactionId,
        amount: Money,
    ) -> Result<ApplicationLinkId, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::InvalidOperation(
                "application amount must be positive".to_string(),
            ));
        }

        let credit = self
            .transaction(credit_id)
            .ok_or_else(|| SettlementError::UnknownTransaction(credit_id.to_string()))?;
        if !credit.is_credit_bearing() {
            return Err(SettlementError::InvalidOperation(format!(
                "{} is not a credit-bearing transaction",
                credit_id
            )));
        }
        if credit.balance().amount() < amount.amount() {
            return Err(SettlementError::InsufficientCredit {
                available: credit.balance().amount(),
                requested: amount.amount(),
            });
        }
        let credit_contact = credit.contact.ok_or_else(|| {
            SettlementError::MissingContact(format!("credit {} has no contact", credit_id))
        })?;
        let credit_currency = credit.currency;

        let target = self
            .transaction(target_id)
            .ok_or_else(|| SettlementError::UnknownTransaction(target_id.to_string()))?;
        if !target.status().is_outstanding() {
            return Err(SettlementError::InvalidOperation(format!(
                "target {} is not open for settlement (status {:?})",
                target_id,
                target.status()
            )));
        }
        if target.balance().amount() < amount.amount() {
            return Err(SettlementError::InsufficientBalance {
                available: target.balance().amount(),
                requested: amount.amount(),
            });
        }
        let target_contact = target.contact.ok_or_else(|| {
            SettlementError::MissingContact(format!("target {} has no contact", target_id))
        })?;
        if target_contact.id != credit_contact.id {
            return Err(SettlementError::InvalidContactKind(
                "credit and target belong to different contacts".to_string(),
            ));
        }
        let compatible = match credit_contact.kind {
            ContactKind::Customer => target.txn_type.is_receivable(),
            ContactKind::Vendor => target.txn_type.is_payable(),
        };
        if !compatible {
            return Err(SettlementError::InvalidContactKind(format!(
                "a {:?} credit cannot settle a {:?}",
                credit_contact.kind, target.txn_type
            )));
        }
        if amount.currency() != credit_currency || amount.currency() != target.currency {
            return Err(SettlementError::Calculation(
                "credit, target, and amount must share a currency".to_string(),
            ));
        }

        // Validation complete. Mutation order mirrors the lock order:
        // credit before target.
        let link_id = ApplicationLinkId::new_v7();
        self.transaction_mut(credit_id)?.apply_settlement(amount)?;
        self.settle_internal(
            target_id,
            amount,
            &link_settlement_key(&link_id),
            Some(*credit_id),
        )?;
        self.links.insert(
            link_id,
            ApplicationLink {
                id: link_id,
                credit_id: *credit_id,
                target_id: *target_id,
                amount,
                applied_at: Utc::now(),
            },
        );

        debug!(credit = %credit_id, target = %target_id, amount = %amount.amount(), "applied credit");
        Ok(link_id)
    }

    /// Undoes an application link
    ///
    /// Restores the target's balance by exactly the linked amount,
    /// restores the credit's balance by the same, recomputes both
    /// statuses, and removes the link.
    pub fn reverse_application(
        &mut self,
        link_id: &ApplicationLinkId,
    ) -> Result<(), SettlementError> {
        let link = self
            .links
            .get(link_id)
            .cloned()
            .ok_or_else(|| SettlementError::UnknownLink(link_id.to_string()))?;

        self.unsettle_key(&link_settlement_key(link_id))?;
        self.transaction_mut(&link.credit_id)?
            .reverse_settlement(link.amount)?;
        self.links.remove(link_id);

        debug!(credit = %link.credit_id, target = %link.target_id, "reversed credit application");
        Ok(())
    }

    /// Returns the links currently sourced from a credit
    pub fn links_for_credit(&self, credit_id: &TransactionId) -> Vec<&ApplicationLink> {
        let mut links: Vec<_> = self
            .links
            .values()
            .filter(|l| &l.credit_id == credit_id)
            .collect();
        links.sort_by_key(|l| l.id);
        links
    }

    /// Evidence-based check for whether a credit has been applied
    ///
    /// A credit counts as applied when its tracked balance is below its
    /// original amount, or when any application link exists for it.
    pub fn credit_is_applied(&self, credit_id: &TransactionId) -> Result<bool, SettlementError> {
        let credit = self
            .transaction(credit_id)
            .ok_or_else(|| SettlementError::UnknownTransaction(credit_id.to_string()))?;
        if !credit.is_credit_bearing() {
            return Err(SettlementError::InvalidOperation(format!(
                "{} is not a credit-bearing transaction",
                credit_id
            )));
        }
        Ok(credit.balance().amount() < credit.amount().amount()
            || self.links.values().any(|l| &l.credit_id == credit_id))
    }

    /// Deletes a payment and everything that depends on it, in order
    ///
    /// One unit, strict ordering:
    /// 1. reverse every application link sourced from credits the
    ///    payment spawned (restoring the linked documents),
    /// 2. delete those credits and any ledger entries they carry,
    /// 3. reverse the payment's own settlements (restoring each
    ///    document's balance and status),
    /// 4. unpost the payment's ledger entries,
    /// 5. remove the payment row.
    ///
    /// # Returns
    ///
    /// Counts of credits deleted and distinct documents restored.
    pub fn delete_payment_cascade(
        &mut self,
        payment_id: &TransactionId,
    ) -> Result<CascadeOutcome, SettlementError> {
        let payment = self
            .transaction(payment_id)
            .ok_or_else(|| SettlementError::UnknownTransaction(payment_id.to_string()))?;
        if payment.txn_type != TransactionType::Payment {
            return Err(SettlementError::InvalidOperation(format!(
                "{} is not a payment",
                payment_id
            )));
        }

        let credits: Vec<TransactionId> = self.spawned_credits(payment_id).collect();
        let mut restored: BTreeSet<TransactionId> = BTreeSet::new();

        // 1. Sever every link sourced from the spawned credits.
        for credit_id in &credits {
            let credit_links: Vec<(ApplicationLinkId, TransactionId)> = self
                .links_for_credit(credit_id)
                .iter()
                .map(|l| (l.id, l.target_id))
                .collect();
            for (link_id, target_id) in credit_links {
                self.reverse_application(&link_id)?;
                restored.insert(target_id);
            }
        }

        // 2. Delete the credits and their entries.
        for credit_id in &credits {
            if self.ledger().is_posted(credit_id) {
                self.ledger_mut().unpost(credit_id)?;
            }
            self.remove_transaction_row(credit_id);
        }

        // 3. Reverse the payment's own settlements.
        let settlement_keys: Vec<String> = self
            .settlements
            .iter()
            .filter(|(_, r)| r.source.as_ref() == Some(payment_id))
            .map(|(k, _)| k.clone())
            .collect();
        for key in settlement_keys {
            let target = self.unsettle_key(&key)?;
            restored.insert(target);
        }

        // 4. Unpost the payment's entries.
        if self.ledger().is_posted(payment_id) {
            self.ledger_mut().unpost(payment_id)?;
        }

        // 5. Remove the payment row.
        self.remove_transaction_row(payment_id);

        let outcome = CascadeOutcome {
            credits_deleted: credits.len(),
            invoices_restored: restored.len(),
        };
        info!(
            payment = %payment_id,
            credits_deleted = outcome.credits_deleted,
            invoices_restored = outcome.invoices_restored,
            "deleted payment cascade"
        );
        Ok(outcome)
    }
}

/// The idempotency key a link's settlement is recorded under
fn link_settlement_key(link_id: &ApplicationLinkId) -> String {
    format!("link:{}", link_id)
}
