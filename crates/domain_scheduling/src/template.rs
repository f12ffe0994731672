//! Recurring invoice templates

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, ContactId, Currency, Money, Rate, TemplateId};

/// Unit for custom frequencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyUnit {
    Days,
    Weeks,
    Months,
}

/// How often a template fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
    /// Every `value` units
    Custom { value: u32, unit: FrequencyUnit },
}

impl Frequency {
    /// Creates a custom frequency; a zero value is clamped to one
    pub fn custom(value: u32, unit: FrequencyUnit) -> Self {
        Frequency::Custom {
            value: value.max(1),
            unit,
        }
    }
}

/// Which day of the month a monthly template fires on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfMonth {
    /// A fixed day, clamped to the month's last day when short
    Day(u8),
    /// The last weekday of the month (weekends stepped over, not holidays)
    LastBusinessDay,
}

/// Lifecycle status of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    /// Eligible to fire
    Active,
    /// Suspended by the user
    Paused,
    /// Past its end date or occurrence cap
    Completed,
}

/// A line to stamp onto each generated invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateLine {
    /// Description
    pub description: String,
    /// Quantity
    pub quantity: Decimal,
    /// Unit price
    pub unit_price: Money,
    /// Sales tax rate, if taxable
    pub tax_rate: Option<Rate>,
    /// Income account for the generated line
    pub account_id: AccountId,
}

/// A recurring invoice template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTemplate {
    /// Unique identifier
    pub id: TemplateId,
    /// Template name
    pub name: String,
    /// Customer invoiced on each occurrence
    pub customer: ContactId,
    /// Invoice currency
    pub currency: Currency,
    /// Fire frequency
    pub frequency: Frequency,
    /// Day-of-month rule for month-based frequencies
    pub day_of_month: Option<DayOfMonth>,
    /// First occurrence date
    pub start_date: NaiveDate,
    /// Last allowed occurrence date
    pub end_date: Option<NaiveDate>,
    /// Occurrence cap
    pub max_occurrences: Option<u32>,
    /// Occurrences fired so far
    pub current_occurrences: u32,
    /// Next occurrence date
    pub next_run_at: NaiveDate,
    /// Lifecycle status
    pub status: TemplateStatus,
    /// Lines for generated invoices
    pub lines: Vec<TemplateLine>,
    /// Optimistic claim marker for the single-writer scheduler
    claimed_at: Option<DateTime<Utc>>,
}

impl RecurringTemplate {
    /// Creates an active template whose first run is the start date
    pub fn new(
        name: impl Into<String>,
        customer: ContactId,
        currency: Currency,
        frequency: Frequency,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id: TemplateId::new_v7(),
            name: name.into(),
            customer,
            currency,
            frequency,
            day_of_month: None,
            start_date,
            end_date: None,
            max_occurrences: None,
            current_occurrences: 0,
            next_run_at: start_date,
            status: TemplateStatus::Active,
            lines: Vec::new(),
            claimed_at: None,
        }
    }

    /// Sets the day-of-month rule
    pub fn with_day_of_month(mut self, rule: DayOfMonth) -> Self {
        self.day_of_month = Some(rule);
        self
    }

    /// Sets the end date
    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Sets the occurrence cap
    pub fn with_max_occurrences(mut self, max: u32) -> Self {
        self.max_occurrences = Some(max);
        self
    }

    /// Adds an invoice line
    pub fn with_line(mut self, line: TemplateLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Suspends the template
    pub fn pause(&mut self) {
        if self.status == TemplateStatus::Active {
            self.status = TemplateStatus::Paused;
        }
    }

    /// Resumes a paused template
    pub fn resume(&mut self) {
        if self.status == TemplateStatus::Paused {
            self.status = TemplateStatus::Active;
        }
    }

    /// Attempts to claim the template for one scheduler run
    ///
    /// The conditional update succeeds for exactly one caller: a second
    /// attempt sees the marker and backs off. `advance` and
    /// `release_claim` clear it.
    pub fn try_claim(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TemplateStatus::Active || self.claimed_at.is_some() {
            return false;
        }
        self.claimed_at = Some(now);
        true
    }

    /// Clears the claim without advancing, after a failed generation
    pub fn release_claim(&mut self) {
        self.claimed_at = None;
    }

    /// Returns true while a scheduler run holds the claim
    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn template() -> RecurringTemplate {
        RecurringTemplate::new(
            "Monthly retainer",
            ContactId::new(),
            Currency::USD,
            Frequency::Monthly,
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[test]
    fn test_new_template_fires_on_start_date() {
        let t = template();
        assert_eq!(t.next_run_at, t.start_date);
        assert_eq!(t.status, TemplateStatus::Active);
        assert_eq!(t.current_occurrences, 0);
    }

    #[test]
    fn test_pause_resume() {
        let mut t = template();
        t.pause();
        assert_eq!(t.status, TemplateStatus::Paused);
        t.resume();
        assert_eq!(t.status, TemplateStatus::Active);
    }

    #[test]
    fn test_claim_granted_once() {
        let mut t = template();
        let now = Utc::now();

        assert!(t.try_claim(now));
        assert!(!t.try_claim(now));
        assert!(t.is_claimed());

        t.release_claim();
        assert!(t.try_claim(now));
    }

    #[test]
    fn test_paused_template_cannot_be_claimed() {
        let mut t = template();
        t.pause();
        assert!(!t.try_claim(Utc::now()));
    }

    #[test]
    fn test_custom_frequency_clamps_zero() {
        let f = Frequency::custom(0, FrequencyUnit::Days);
        assert_eq!(f, Frequency::Custom { value: 1, unit: FrequencyUnit::Days });
    }
}
