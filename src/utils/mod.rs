//! Utility functions for formatting and date arithmetic
//!
//! This module provides centralized formatting utilities for consistent
//! display of currency and percentage values throughout the application.

pub mod dates;

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Include "$" prefix
    Usd,
    /// No currency symbol (for table cells, calculations display)
    None,
}

/// Core formatting function with full control over output.
///
/// Formats a Decimal value with `,` thousands separators and `.` as the
/// decimal separator, rounded half-away-from-zero to cents.
///
/// # Examples
/// ```
/// use lotbook::utils::{format_currency_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, CurrencySymbol::Usd),
///     "$1,234.56"
/// );
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234), 12, CurrencySymbol::None),
///     "    1,234.00"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let is_negative = value < Decimal::ZERO;
    let abs_value = value
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    let formatted = format!("{:.2}", abs_value);
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    let prefix = match symbol {
        CurrencySymbol::Usd => "$",
        CurrencySymbol::None => "",
    };

    let result = format!("{}{}{}.{}", prefix, sign, with_separators, decimal_part);

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format with dollar symbol: "$1,234.56"
///
/// # Examples
/// ```
/// use lotbook::utils::format_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(1234.56)), "$1,234.56");
/// assert_eq!(format_currency(dec!(-500)), "$-500.00");
/// ```
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::Usd)
}

/// Share quantities print exactly, without trailing zeros: 0.125 stays "0.125"
pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Format a fractional return as a percentage: 0.1234 -> "12.34%"
pub fn format_pct(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_currency_basic() {
        assert_eq!(format_currency(dec!(1234.56)), "$1,234.56");
        assert_eq!(format_currency(dec!(0.99)), "$0.99");
        assert_eq!(format_currency(dec!(1000000)), "$1,000,000.00");
        assert_eq!(format_currency(dec!(10190)), "$10,190.00");
    }

    #[test]
    fn test_format_currency_small_values() {
        assert_eq!(format_currency(dec!(0)), "$0.00");
        assert_eq!(format_currency(dec!(0.01)), "$0.01");
        assert_eq!(format_currency(dec!(123)), "$123.00");
        assert_eq!(format_currency(dec!(999.99)), "$999.99");
    }

    #[test]
    fn test_format_currency_negative() {
        assert_eq!(format_currency(dec!(-1234.56)), "$-1,234.56");
        assert_eq!(format_currency(dec!(-0.01)), "$-0.01");
    }

    #[test]
    fn test_format_rounds_to_cents() {
        assert_eq!(format_currency(dec!(1.234)), "$1.23");
        assert_eq!(format_currency(dec!(1.235)), "$1.24");
    }

    #[test]
    fn test_format_quantity_keeps_fractional_shares() {
        assert_eq!(format_quantity(dec!(0.125)), "0.125");
        assert_eq!(format_quantity(dec!(10.000)), "10");
        assert_eq!(format_quantity(dec!(3.1234567890123)), "3.1234567890123");
    }

    #[test]
    fn test_format_with_width() {
        let result = format_currency_with_width(dec!(100), 12, CurrencySymbol::Usd);
        assert_eq!(result, "     $100.00");
        let result = format_currency_with_width(dec!(1000000), 5, CurrencySymbol::Usd);
        assert_eq!(result, "$1,000,000.00");
    }

    #[test]
    fn test_format_pct() {
        assert_eq!(format_pct(0.1234), "12.34%");
        assert_eq!(format_pct(-0.05), "-5.00%");
    }
}
