//! Integration tests for money arithmetic across the public API

use core_kernel::{Currency, Money, MoneyError, Rate};
use rust_decimal_macros::dec;

mod arithmetic {
    use super::*;

    #[test]
    fn test_sum_of_line_amounts() {
        let lines = [
            Money::new(dec!(385.00), Currency::USD),
            Money::new(dec!(385.00), Currency::USD),
            Money::new(dec!(385.00), Currency::USD),
        ];

        let total = lines
            .iter()
            .fold(Money::zero(Currency::USD), |acc, m| acc + *m);
        assert_eq!(total.amount(), dec!(1155.00));
    }

    #[test]
    fn test_checked_ops_surface_mismatch() {
        let usd = Money::new(dec!(10), Currency::USD);
        let jpy = Money::new(dec!(10), Currency::JPY);

        assert!(matches!(
            usd.checked_sub(&jpy),
            Err(MoneyError::CurrencyMismatch(_, _))
        ));
    }

    #[test]
    fn test_jpy_has_no_minor_units() {
        let m = Money::from_minor(5000, Currency::JPY);
        assert_eq!(m.amount(), dec!(5000));
        assert_eq!(m.round_to_currency().amount(), dec!(5000));
    }
}

mod rates {
    use super::*;

    #[test]
    fn test_tax_rounds_to_currency() {
        // 7.5% of 33.33 is 2.49975, which must land on a cent boundary
        let rate = Rate::from_percentage(dec!(7.5));
        let tax = rate.apply(&Money::new(dec!(33.33), Currency::USD));
        assert_eq!(tax.amount(), dec!(2.50));
    }

    #[test]
    fn test_percentage_round_trip() {
        let rate = Rate::from_percentage(dec!(8.25));
        assert_eq!(rate.as_percentage(), dec!(8.25));
        assert_eq!(rate.as_decimal(), dec!(0.0825));
    }
}
