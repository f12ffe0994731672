//! Schedule calculation and invoice generation
//!
//! `next_run_date` is a pure function of the template; `generate` builds
//! a draft invoice without mutating anything; `advance` moves the
//! schedule forward. The caller commits the generated invoice first and
//! advances second, so a failed creation never skips an occurrence.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{AccountId, CompanyTimezone, ContactId, Currency, Money, Rate};

use crate::error::ScheduleError;
use crate::template::{
    DayOfMonth, Frequency, FrequencyUnit, RecurringTemplate, TemplateStatus,
};

/// A line of a generated draft invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub tax_rate: Option<Rate>,
    pub account_id: AccountId,
}

/// A generated invoice, not yet committed to the books
///
/// The caller maps this onto a transaction spec and creates it through
/// the settlement layer, then advances the template separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftInvoice {
    /// Reference for the new invoice
    pub reference: String,
    /// Customer being invoiced
    pub customer: ContactId,
    /// Invoice currency
    pub currency: Currency,
    /// Invoice date (the occurrence date)
    pub date: NaiveDate,
    /// Memo carrying the template name
    pub memo: String,
    /// Invoice lines
    pub lines: Vec<DraftLine>,
}

/// Computes the occurrence after the current `next_run_at`
///
/// Returns `None` when the schedule is exhausted - the end date falls
/// before the computed date, or the occurrence cap is reached once the
/// current run is counted. `None` means "do not run again".
///
/// Month-based frequencies clamp the target day to short months
/// (day 31 in February lands on Feb 28, or 29 in a leap year); the
/// last-business-day rule takes the calendar last day and steps
/// backward over weekends only.
pub fn next_run_date(template: &RecurringTemplate) -> Option<NaiveDate> {
    if let Some(max) = template.max_occurrences {
        if template.current_occurrences + 1 >= max {
            return None;
        }
    }

    let current = template.next_run_at;
    let candidate = match template.frequency {
        Frequency::Daily => current + chrono::Days::new(1),
        Frequency::Weekly => current + chrono::Days::new(7),
        Frequency::Biweekly => current + chrono::Days::new(14),
        Frequency::Monthly => add_months(current, 1, template.day_of_month),
        Frequency::Quarterly => add_months(current, 3, template.day_of_month),
        Frequency::Yearly => add_months(current, 12, template.day_of_month),
        Frequency::Custom { value, unit } => match unit {
            FrequencyUnit::Days => current + chrono::Days::new(u64::from(value.max(1))),
            FrequencyUnit::Weeks => current + chrono::Days::new(u64::from(value.max(1)) * 7),
            FrequencyUnit::Months => add_months(current, value.max(1), template.day_of_month),
        },
    };

    match template.end_date {
        Some(end) if candidate > end => None,
        _ => Some(candidate),
    }
}

/// Returns true when a scheduler pass should fire the template now
pub fn should_run(template: &RecurringTemplate, now: DateTime<Utc>, tz: &CompanyTimezone) -> bool {
    if template.status != TemplateStatus::Active {
        return false;
    }
    if template.next_run_at > tz.local_date(now) {
        return false;
    }
    if let Some(max) = template.max_occurrences {
        if template.current_occurrences >= max {
            return false;
        }
    }
    if let Some(end) = template.end_date {
        if template.next_run_at > end {
            return false;
        }
    }
    true
}

/// Builds the draft invoice for the template's current occurrence
///
/// Does not mutate the template; committing the draft and advancing the
/// schedule are the caller's separate steps.
///
/// # Errors
///
/// Returns an error when the template is not active or has no lines.
pub fn generate(
    template: &RecurringTemplate,
    reference: impl Into<String>,
) -> Result<DraftInvoice, ScheduleError> {
    if template.status != TemplateStatus::Active {
        return Err(ScheduleError::TemplateNotActive(template.id.to_string()));
    }
    if template.lines.is_empty() {
        return Err(ScheduleError::EmptyTemplate(template.id.to_string()));
    }

    Ok(DraftInvoice {
        reference: reference.into(),
        customer: template.customer,
        currency: template.currency,
        date: template.next_run_at,
        memo: template.name.clone(),
        lines: template
            .lines
            .iter()
            .map(|l| DraftLine {
                description: l.description.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
                tax_rate: l.tax_rate,
                account_id: l.account_id,
            })
            .collect(),
    })
}

/// Counts the fired occurrence and moves the schedule forward
///
/// Clears the scheduler claim, increments `current_occurrences`, and
/// either sets the next run date or completes the template when the
/// schedule is exhausted.
pub fn advance(template: &mut RecurringTemplate) {
    template.release_claim();
    // next_run_date already counts the in-flight occurrence, so it must
    // see the pre-increment counter.
    let next = next_run_date(template);
    template.current_occurrences += 1;

    match next {
        Some(next) => {
            template.next_run_at = next;
        }
        None => {
            template.status = TemplateStatus::Completed;
            debug!(template = %template.id, occurrences = template.current_occurrences, "template completed");
        }
    }
}

/// Adds calendar months, applying the template's day rule
fn add_months(date: NaiveDate, months: u32, day_rule: Option<DayOfMonth>) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;

    match day_rule {
        Some(DayOfMonth::LastBusinessDay) => last_business_day(year, month),
        Some(DayOfMonth::Day(day)) => clamped_date(year, month, u32::from(day)),
        None => clamped_date(year, month, date.day()),
    }
}

/// Builds a date with the day clamped to the month's length
fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is always valid")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of month is always valid")
        .pred_opt()
        .expect("month start has a predecessor")
        .day()
}

/// The last weekday of a month; weekends only, holidays are not stepped
fn last_business_day(year: i32, month: u32) -> NaiveDate {
    let mut date = clamped_date(year, month, days_in_month(year, month));
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date.pred_opt().expect("stepping within the month");
    }
    date
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateLine;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly_template(start: NaiveDate) -> RecurringTemplate {
        RecurringTemplate::new(
            "Monthly retainer",
            ContactId::new(),
            Currency::USD,
            Frequency::Monthly,
            start,
        )
    }

    #[test]
    fn test_daily_weekly_biweekly_offsets() {
        let mut t = monthly_template(date(2024, 3, 10));

        t.frequency = Frequency::Daily;
        assert_eq!(next_run_date(&t), Some(date(2024, 3, 11)));

        t.frequency = Frequency::Weekly;
        assert_eq!(next_run_date(&t), Some(date(2024, 3, 17)));

        t.frequency = Frequency::Biweekly;
        assert_eq!(next_run_date(&t), Some(date(2024, 3, 24)));
    }

    #[test]
    fn test_monthly_day_clamps_in_february() {
        let t = monthly_template(date(2024, 1, 31)).with_day_of_month(DayOfMonth::Day(31));
        // 2024 is a leap year
        assert_eq!(next_run_date(&t), Some(date(2024, 2, 29)));

        let t = monthly_template(date(2025, 1, 31)).with_day_of_month(DayOfMonth::Day(31));
        assert_eq!(next_run_date(&t), Some(date(2025, 2, 28)));
    }

    #[test]
    fn test_monthly_without_rule_keeps_day() {
        let t = monthly_template(date(2024, 3, 15));
        assert_eq!(next_run_date(&t), Some(date(2024, 4, 15)));
    }

    #[test]
    fn test_last_business_day_steps_over_weekend() {
        // March 2024 ends on Sunday the 31st; the last weekday is Friday the 29th
        let t = monthly_template(date(2024, 2, 29)).with_day_of_month(DayOfMonth::LastBusinessDay);
        assert_eq!(next_run_date(&t), Some(date(2024, 3, 29)));

        // November 2024 ends on Saturday the 30th
        let t = monthly_template(date(2024, 10, 31)).with_day_of_month(DayOfMonth::LastBusinessDay);
        assert_eq!(next_run_date(&t), Some(date(2024, 11, 29)));
    }

    #[test]
    fn test_quarterly_and_yearly() {
        let t = monthly_template(date(2024, 1, 31));
        let mut q = t.clone();
        q.frequency = Frequency::Quarterly;
        assert_eq!(next_run_date(&q), Some(date(2024, 4, 30)));

        let mut y = t.clone();
        y.frequency = Frequency::Yearly;
        assert_eq!(next_run_date(&y), Some(date(2025, 1, 31)));

        // Feb 29 of a leap year lands on Feb 28 the next year
        let mut leap = monthly_template(date(2024, 2, 29));
        leap.frequency = Frequency::Yearly;
        assert_eq!(next_run_date(&leap), Some(date(2025, 2, 28)));
    }

    #[test]
    fn test_custom_frequency() {
        let mut t = monthly_template(date(2024, 3, 1));
        t.frequency = Frequency::custom(10, FrequencyUnit::Days);
        assert_eq!(next_run_date(&t), Some(date(2024, 3, 11)));

        t.frequency = Frequency::custom(3, FrequencyUnit::Weeks);
        assert_eq!(next_run_date(&t), Some(date(2024, 3, 22)));

        t.frequency = Frequency::custom(2, FrequencyUnit::Months);
        assert_eq!(next_run_date(&t), Some(date(2024, 5, 1)));
    }

    #[test]
    fn test_end_date_terminates_schedule() {
        let t = monthly_template(date(2024, 3, 15)).with_end_date(date(2024, 4, 1));
        assert_eq!(next_run_date(&t), None);
    }

    #[test]
    fn test_occurrence_cap_terminates_schedule() {
        let mut t = monthly_template(date(2024, 3, 15)).with_max_occurrences(3);
        t.current_occurrences = 2;
        // The current run is the third and last
        assert_eq!(next_run_date(&t), None);

        t.current_occurrences = 1;
        assert!(next_run_date(&t).is_some());
    }

    #[test]
    fn test_should_run_respects_timezone() {
        let t = monthly_template(date(2024, 3, 15));
        let tz = CompanyTimezone::new(chrono_tz::America::New_York);

        // 01:00 UTC on the 15th is still the 14th in New York
        let early = chrono::Utc.with_ymd_and_hms(2024, 3, 15, 1, 0, 0).unwrap();
        assert!(!should_run(&t, early, &tz));

        let later = chrono::Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert!(should_run(&t, later, &tz));
    }

    #[test]
    fn test_should_run_excludes_paused_and_capped() {
        let now = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let tz = CompanyTimezone::default();

        let mut t = monthly_template(date(2024, 3, 15));
        t.pause();
        assert!(!should_run(&t, now, &tz));

        let mut t = monthly_template(date(2024, 3, 15)).with_max_occurrences(2);
        t.current_occurrences = 2;
        assert!(!should_run(&t, now, &tz));
    }

    #[test]
    fn test_generate_does_not_mutate_template() {
        let t = monthly_template(date(2024, 3, 15)).with_line(TemplateLine {
            description: "Retainer".to_string(),
            quantity: dec!(1),
            unit_price: Money::new(dec!(2500.00), Currency::USD),
            tax_rate: None,
            account_id: AccountId::new(),
        });
        let before = t.clone();

        let draft = generate(&t, "INV-2001").unwrap();
        assert_eq!(draft.date, date(2024, 3, 15));
        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.memo, "Monthly retainer");

        assert_eq!(t.current_occurrences, before.current_occurrences);
        assert_eq!(t.next_run_at, before.next_run_at);
    }

    #[test]
    fn test_generate_requires_lines() {
        let t = monthly_template(date(2024, 3, 15));
        assert!(matches!(
            generate(&t, "INV-2001"),
            Err(ScheduleError::EmptyTemplate(_))
        ));
    }

    #[test]
    fn test_advance_moves_schedule_and_completes() {
        let mut t = monthly_template(date(2024, 3, 15)).with_max_occurrences(2);
        t.try_claim(Utc::now());

        advance(&mut t);
        assert_eq!(t.current_occurrences, 1);
        assert_eq!(t.next_run_at, date(2024, 4, 15));
        assert!(!t.is_claimed());
        assert_eq!(t.status, TemplateStatus::Active);

        advance(&mut t);
        assert_eq!(t.current_occurrences, 2);
        assert_eq!(t.status, TemplateStatus::Completed);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// next_run_date is deterministic and strictly after the current run
        #[test]
        fn next_run_is_monotonic(
            year in 2020i32..2030i32,
            month in 1u32..=12u32,
            day in 1u32..=28u32,
            freq_pick in 0usize..6usize,
        ) {
            let start = NaiveDate::from_ymd_opt(year, month, day).unwrap();
            let mut t = RecurringTemplate::new(
                "t",
                ContactId::new(),
                Currency::USD,
                Frequency::Monthly,
                start,
            );
            t.frequency = [
                Frequency::Daily,
                Frequency::Weekly,
                Frequency::Biweekly,
                Frequency::Monthly,
                Frequency::Quarterly,
                Frequency::Yearly,
            ][freq_pick];

            let first = next_run_date(&t).unwrap();
            let again = next_run_date(&t).unwrap();
            prop_assert_eq!(first, again);
            prop_assert!(first > t.next_run_at);

            // Advancing keeps dates strictly increasing
            t.next_run_at = first;
            let second = next_run_date(&t).unwrap();
            prop_assert!(second > first);
        }
    }
}
