//! Property-Based Test Generators
//!
//! Proptest strategies for generating random test data that maintains
//! domain invariants.

use proptest::prelude::*;

use core_kernel::{Currency, Money};
use domain_scheduling::{Frequency, FrequencyUnit};

/// Strategy for generating valid Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::CAD),
        Just(Currency::AUD),
        Just(Currency::NZD),
        Just(Currency::JPY),
        Just(Currency::CHF),
        Just(Currency::SEK),
        Just(Currency::MXN),
    ]
}

/// Strategy for positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for positive Money values in USD
pub fn positive_usd_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|minor| Money::from_minor(minor, Currency::USD))
}

/// Strategy for positive Money values in any currency
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(minor, currency)| Money::from_minor(minor, currency))
}

/// Strategy for template frequencies
pub fn frequency_strategy() -> impl Strategy<Value = Frequency> {
    prop_oneof![
        Just(Frequency::Daily),
        Just(Frequency::Weekly),
        Just(Frequency::Biweekly),
        Just(Frequency::Monthly),
        Just(Frequency::Quarterly),
        Just(Frequency::Yearly),
        (1u32..36u32).prop_map(|v| Frequency::custom(v, FrequencyUnit::Days)),
        (1u32..12u32).prop_map(|v| Frequency::custom(v, FrequencyUnit::Weeks)),
        (1u32..24u32).prop_map(|v| Frequency::custom(v, FrequencyUnit::Months)),
    ]
}
