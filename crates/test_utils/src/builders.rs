//! Test Data Builders
//!
//! Builders assemble a working set of books (ledger, chart, posting
//! map) and templates with sensible defaults, so scenario tests only
//! spell out what they care about.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{AccountId, ContactId, Currency, Money, TransactionId};
use domain_ledger::{Account, AccountType};
use domain_scheduling::{Frequency, RecurringTemplate, TemplateLine};
use domain_settlement::{LineItem, PostingMap, SettlementBook, TransactionSpec};

use crate::fixtures::DateFixtures;

/// A fully wired settlement book over a small-business chart
pub struct TestBooks {
    pub book: SettlementBook,
    pub map: PostingMap,
    pub sales_account: AccountId,
    pub expense_account: AccountId,
    pub customer: ContactId,
    pub vendor: ContactId,
}

impl TestBooks {
    /// Creates USD books with the control accounts registered
    pub fn new() -> Self {
        let mut book = SettlementBook::new(Currency::USD);
        let map = PostingMap {
            accounts_receivable: AccountId::new(),
            accounts_payable: AccountId::new(),
            bank: AccountId::new(),
            sales_tax_payable: AccountId::new(),
        };
        let sales_account = AccountId::new();
        let expense_account = AccountId::new();

        let ledger = book.ledger_mut();
        ledger
            .register_account(Account::new(
                map.accounts_receivable,
                "1100",
                "Accounts Receivable",
                AccountType::AccountsReceivable,
                Currency::USD,
            ))
            .expect("fresh ledger accepts the chart");
        ledger
            .register_account(Account::new(
                map.accounts_payable,
                "2000",
                "Accounts Payable",
                AccountType::AccountsPayable,
                Currency::USD,
            ))
            .expect("fresh ledger accepts the chart");
        ledger
            .register_account(Account::new(
                map.bank,
                "1000",
                "Checking",
                AccountType::Bank,
                Currency::USD,
            ))
            .expect("fresh ledger accepts the chart");
        ledger
            .register_account(Account::new(
                map.sales_tax_payable,
                "2100",
                "Sales Tax Payable",
                AccountType::OtherCurrentLiability,
                Currency::USD,
            ))
            .expect("fresh ledger accepts the chart");
        ledger
            .register_account(Account::new(
                sales_account,
                "4000",
                "Sales",
                AccountType::Income,
                Currency::USD,
            ))
            .expect("fresh ledger accepts the chart");
        ledger
            .register_account(Account::new(
                expense_account,
                "5100",
                "Rent",
                AccountType::Expense,
                Currency::USD,
            ))
            .expect("fresh ledger accepts the chart");

        Self {
            book,
            map,
            sales_account,
            expense_account,
            customer: ContactId::new(),
            vendor: ContactId::new(),
        }
    }

    /// Creates an open invoice for the default customer
    pub fn open_invoice(&mut self, reference: &str, total: Money) -> TransactionId {
        let spec = TransactionSpec::invoice(
            reference,
            DateFixtures::document_date(),
            self.customer,
            total.currency(),
        )
        .with_line(LineItem::new("Services", total, self.sales_account));
        self.book
            .create(spec, &self.map)
            .expect("invoice spec is valid")
    }

    /// Creates an open bill for the default vendor
    pub fn open_bill(&mut self, reference: &str, total: Money) -> TransactionId {
        let spec = TransactionSpec::bill(
            reference,
            DateFixtures::document_date(),
            self.vendor,
            total.currency(),
        )
        .with_line(LineItem::new("Rent", total, self.expense_account));
        self.book
            .create(spec, &self.map)
            .expect("bill spec is valid")
    }
}

impl Default for TestBooks {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for recurring templates with test defaults
pub struct TestTemplateBuilder {
    name: String,
    customer: ContactId,
    frequency: Frequency,
    start_date: NaiveDate,
    line_amount: Money,
    account_id: AccountId,
}

impl TestTemplateBuilder {
    /// Creates a monthly template builder with default values
    pub fn new(account_id: AccountId) -> Self {
        Self {
            name: "Monthly retainer".to_string(),
            customer: ContactId::new(),
            frequency: Frequency::Monthly,
            start_date: DateFixtures::period_start(),
            line_amount: Money::new(dec!(2500.00), Currency::USD),
            account_id,
        }
    }

    /// Sets the customer
    pub fn with_customer(mut self, customer: ContactId) -> Self {
        self.customer = customer;
        self
    }

    /// Sets the frequency
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Sets the start date
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = start_date;
        self
    }

    /// Sets the recurring line amount
    pub fn with_line_amount(mut self, amount: Money) -> Self {
        self.line_amount = amount;
        self
    }

    /// Builds the template
    pub fn build(self) -> RecurringTemplate {
        RecurringTemplate::new(
            self.name,
            self.customer,
            self.line_amount.currency(),
            self.frequency,
            self.start_date,
        )
        .with_line(TemplateLine {
            description: "Retainer".to_string(),
            quantity: Decimal::ONE,
            unit_price: self.line_amount,
            tax_rate: None,
            account_id: self.account_id,
        })
    }
}
