//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for common entities. Fixtures are consistent
//! and predictable so unit tests can assert exact values.

use chrono::NaiveDate;
use fake::faker::company::en::CompanyName;
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal_macros::dec;

use core_kernel::{ContactId, ContactKind, ContactRecord, Currency, Money};

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A routine invoice total
    pub fn usd_invoice_total() -> Money {
        Money::new(dec!(1155.00), Currency::USD)
    }

    /// An overpaying remittance against the routine invoice
    pub fn usd_overpayment() -> Money {
        Money::new(dec!(1540.00), Currency::USD)
    }

    /// The credit the overpayment leaves behind
    pub fn usd_overpayment_credit() -> Money {
        Money::new(dec!(385.00), Currency::USD)
    }

    /// A second, smaller invoice total
    pub fn usd_second_invoice() -> Money {
        Money::new(dec!(770.00), Currency::USD)
    }

    /// A zero amount
    pub fn usd_zero() -> Money {
        Money::zero(Currency::USD)
    }

    /// A EUR amount for currency mismatch tests
    pub fn eur_100() -> Money {
        Money::new(dec!(100.00), Currency::EUR)
    }
}

/// Fixture for date test data
pub struct DateFixtures;

impl DateFixtures {
    /// Standard period start (Jan 1, 2024)
    pub fn period_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// A mid-period document date
    pub fn document_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    /// A due date thirty days after the document date
    pub fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    /// A statement date at the period end
    pub fn statement_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }
}

/// Fixture for contact test data
pub struct ContactFixtures;

impl ContactFixtures {
    /// A customer record with a generated name
    pub fn customer() -> ContactRecord {
        ContactRecord {
            id: ContactId::new(),
            kind: ContactKind::Customer,
            name: Name().fake(),
            is_active: true,
        }
    }

    /// A vendor record with a generated company name
    pub fn vendor() -> ContactRecord {
        ContactRecord {
            id: ContactId::new(),
            kind: ContactKind::Vendor,
            name: CompanyName().fake(),
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_amounts_line_up() {
        // The overpayment scenario's arithmetic must be internally consistent
        let total = MoneyFixtures::usd_invoice_total();
        let paid = MoneyFixtures::usd_overpayment();
        let credit = MoneyFixtures::usd_overpayment_credit();
        assert_eq!(paid - total, credit);
    }

    #[test]
    fn test_contact_fixtures() {
        let customer = ContactFixtures::customer();
        assert_eq!(customer.kind, ContactKind::Customer);
        assert!(!customer.name.is_empty());

        let vendor = ContactFixtures::vendor();
        assert_eq!(vendor.kind, ContactKind::Vendor);
    }
}
