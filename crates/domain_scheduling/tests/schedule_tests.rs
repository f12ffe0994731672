//! Integration tests for domain_scheduling

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use core_kernel::{AccountId, ContactId, Currency, Money};
use domain_scheduling::{
    advance, next_run_date, DayOfMonth, Frequency, RecurringTemplate, TemplateLine, TemplateStatus,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_a_year_of_monthly_occurrences_on_the_31st() {
    // Day 31 walks the month ends: clamped in short months, restored in
    // long ones.
    let mut template = RecurringTemplate::new(
        "Month-end billing",
        ContactId::new(),
        Currency::USD,
        Frequency::Monthly,
        date(2024, 1, 31),
    )
    .with_day_of_month(DayOfMonth::Day(31));

    let expected = [
        date(2024, 2, 29), // leap February
        date(2024, 3, 31),
        date(2024, 4, 30),
        date(2024, 5, 31),
        date(2024, 6, 30),
        date(2024, 7, 31),
        date(2024, 8, 31),
        date(2024, 9, 30),
        date(2024, 10, 31),
        date(2024, 11, 30),
        date(2024, 12, 31),
        date(2025, 1, 31),
    ];

    for want in expected {
        assert_eq!(next_run_date(&template), Some(want));
        advance(&mut template);
        assert_eq!(template.next_run_at, want);
    }
    assert_eq!(template.current_occurrences, 12);
    assert_eq!(template.status, TemplateStatus::Active);
}

#[test]
fn test_end_date_completes_template_via_advance() {
    let mut template = RecurringTemplate::new(
        "Short engagement",
        ContactId::new(),
        Currency::USD,
        Frequency::Weekly,
        date(2024, 3, 1),
    )
    .with_end_date(date(2024, 3, 10));

    // First advance lands on Mar 8; the next candidate (Mar 15) passes
    // the end date and completes the template.
    advance(&mut template);
    assert_eq!(template.next_run_at, date(2024, 3, 8));
    advance(&mut template);
    assert_eq!(template.status, TemplateStatus::Completed);
}

#[test]
fn test_template_serde_round_trip() {
    let template = RecurringTemplate::new(
        "Monthly retainer",
        ContactId::new(),
        Currency::USD,
        Frequency::Monthly,
        date(2024, 1, 15),
    )
    .with_day_of_month(DayOfMonth::LastBusinessDay)
    .with_max_occurrences(12)
    .with_line(TemplateLine {
        description: "Retainer".to_string(),
        quantity: dec!(1),
        unit_price: Money::new(dec!(2500.00), Currency::USD),
        tax_rate: None,
        account_id: AccountId::new(),
    });

    let json = serde_json::to_string(&template).unwrap();
    let back: RecurringTemplate = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, template.id);
    assert_eq!(back.day_of_month, Some(DayOfMonth::LastBusinessDay));
    assert_eq!(back.lines.len(), 1);
    assert_eq!(next_run_date(&back), next_run_date(&template));
}
