//! Account types for the chart of accounts
//!
//! The running balance on an account is deliberately private: only the
//! poster in this crate may move it, so every balance change corresponds
//! to a posted ledger entry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, Currency, Money};

/// Types of accounts in the chart of accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Bank and cash accounts (debit normal balance)
    Bank,
    /// Money owed by customers (debit normal balance)
    AccountsReceivable,
    /// Other current assets such as undeposited funds
    OtherCurrentAsset,
    /// Fixed assets
    FixedAsset,
    /// Money owed to vendors (credit normal balance)
    AccountsPayable,
    /// Credit card liabilities
    CreditCard,
    /// Other current liabilities such as sales tax payable
    OtherCurrentLiability,
    /// Owner equity
    Equity,
    /// Operating income
    Income,
    /// Non-operating income
    OtherIncome,
    /// Operating expenses
    Expense,
    /// Non-operating expenses
    OtherExpense,
}

impl AccountType {
    /// Returns true if this account type has a debit normal balance
    pub fn is_debit_normal(&self) -> bool {
        matches!(
            self,
            AccountType::Bank
                | AccountType::AccountsReceivable
                | AccountType::OtherCurrentAsset
                | AccountType::FixedAsset
                | AccountType::Expense
                | AccountType::OtherExpense
        )
    }
}

/// An account in the chart of accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Account code (e.g., "1000"), unique within the chart
    pub code: String,
    /// Account name
    pub name: String,
    /// Account type
    pub account_type: AccountType,
    /// Description
    pub description: Option<String>,
    /// Whether account is active
    pub is_active: bool,
    /// Balance carried into the books before any posted entry
    pub opening_balance: Money,
    /// Date of the last completed reconciliation
    pub last_reconciled_date: Option<NaiveDate>,
    /// Statement balance of the last completed reconciliation
    pub last_reconciled_balance: Option<Money>,
    /// Running balance, moved only by the poster
    balance: Money,
}

impl Account {
    /// Creates a new account with a zero balance
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier
    /// * `code` - Account code
    /// * `name` - Account name
    /// * `account_type` - Type of account
    /// * `currency` - Ledger home currency
    pub fn new(
        id: AccountId,
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        currency: Currency,
    ) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            account_type,
            description: None,
            is_active: true,
            opening_balance: Money::zero(currency),
            last_reconciled_date: None,
            last_reconciled_balance: None,
            balance: Money::zero(currency),
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the all-time opening balance
    ///
    /// The running balance starts at the opening balance.
    pub fn with_opening_balance(mut self, opening: Money) -> Self {
        self.opening_balance = opening;
        self.balance = opening;
        self
    }

    /// Deactivates the account; inactive accounts reject new postings
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Returns the current running balance
    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Applies a signed balance delta. Poster-only.
    pub(crate) fn apply_delta(&mut self, delta: Money) -> Result<(), core_kernel::MoneyError> {
        self.balance = self.balance.checked_add(&delta)?;
        Ok(())
    }

    /// Stamps the reconciliation fields. Tracker calls this through the ledger.
    pub(crate) fn stamp_reconciled(&mut self, date: NaiveDate, balance: Money) {
        self.last_reconciled_date = Some(date);
        self.last_reconciled_balance = Some(balance);
    }
}

/// Standard chart of accounts for a small business
pub struct StandardChartOfAccounts;

impl StandardChartOfAccounts {
    /// Creates the standard small-business accounts
    pub fn create_standard_accounts(currency: Currency) -> Vec<Account> {
        vec![
            // Assets
            Account::new(AccountId::new(), "1000", "Checking", AccountType::Bank, currency),
            Account::new(AccountId::new(), "1050", "Savings", AccountType::Bank, currency),
            Account::new(
                AccountId::new(),
                "1100",
                "Accounts Receivable",
                AccountType::AccountsReceivable,
                currency,
            ),
            Account::new(
                AccountId::new(),
                "1200",
                "Undeposited Funds",
                AccountType::OtherCurrentAsset,
                currency,
            ),
            // Liabilities
            Account::new(
                AccountId::new(),
                "2000",
                "Accounts Payable",
                AccountType::AccountsPayable,
                currency,
            ),
            Account::new(
                AccountId::new(),
                "2100",
                "Sales Tax Payable",
                AccountType::OtherCurrentLiability,
                currency,
            ),
            Account::new(AccountId::new(), "2200", "Company Card", AccountType::CreditCard, currency),
            // Equity
            Account::new(AccountId::new(), "3000", "Owner's Equity", AccountType::Equity, currency),
            Account::new(
                AccountId::new(),
                "3100",
                "Retained Earnings",
                AccountType::Equity,
                currency,
            ),
            // Income
            Account::new(AccountId::new(), "4000", "Sales", AccountType::Income, currency),
            Account::new(AccountId::new(), "4100", "Service Revenue", AccountType::Income, currency),
            Account::new(
                AccountId::new(),
                "4900",
                "Interest Income",
                AccountType::OtherIncome,
                currency,
            ),
            // Expenses
            Account::new(
                AccountId::new(),
                "5000",
                "Cost of Goods Sold",
                AccountType::Expense,
                currency,
            ),
            Account::new(AccountId::new(), "5100", "Rent", AccountType::Expense, currency),
            Account::new(AccountId::new(), "5200", "Utilities", AccountType::Expense, currency),
            Account::new(
                AccountId::new(),
                "5900",
                "Bank Charges",
                AccountType::OtherExpense,
                currency,
            ),
        ]
    }
}
