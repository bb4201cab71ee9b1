//! Display formatting for money and dates. Pure functions: currency and
//! format are explicit parameters, never ambient runtime locale.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Formats an amount with its currency, e.g. `$70.50` or `12.00 NGN`.
/// Currencies without a common symbol render as a suffix code.
pub fn format_money(amount: Decimal, currency: &str) -> String {
    let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    match currency {
        "USD" => format!("${amount:.2}"),
        "EUR" => format!("€{amount:.2}"),
        "GBP" => format!("£{amount:.2}"),
        "NGN" => format!("₦{amount:.2}"),
        code => format!("{amount:.2} {code}"),
    }
}

/// Human-readable order date, e.g. `Mar 15, 2024`.
pub fn format_order_date(ts: DateTime<Utc>) -> String {
    ts.format("%b %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn known_currencies_use_symbols() {
        assert_eq!(format_money(Decimal::new(7050, 2), "USD"), "$70.50");
        assert_eq!(format_money(Decimal::new(7050, 2), "NGN"), "₦70.50");
        assert_eq!(format_money(Decimal::new(7050, 2), "CHF"), "70.50 CHF");
    }

    #[test]
    fn amounts_round_to_cents() {
        assert_eq!(format_money(Decimal::new(1025, 3), "USD"), "$1.03");
    }

    #[test]
    fn dates_format_without_ambient_locale() {
        let t = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(format_order_date(t), "Mar 15, 2024");
    }
}
