//! Money math and currency formatting.
//!
//! All arithmetic runs on `rust_decimal::Decimal`; rounding happens once, at
//! formatting time, so intermediate sums never accumulate rounding error.

use crate::models::LineItem;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Currencies the service knows how to label and convert.
pub const SUPPORTED_CURRENCIES: &[&str] = &[
    "INR", "USD", "EUR", "GBP", "AED", "AUD", "CAD", "SGD", "JPY",
];

/// Computed money figures for one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

/// Pure totals computation.
///
/// `total = max(0, subtotal + tax_total - discount + extra_charges)`; an
/// oversized discount clamps to zero rather than producing a negative invoice.
pub fn compute_totals(items: &[LineItem], discount: Decimal, extra_charges: Decimal) -> Totals {
    let hundred = Decimal::from(100);

    let subtotal: Decimal = items.iter().map(|item| item.quantity * item.rate).sum();
    let tax_total: Decimal = items
        .iter()
        .map(|item| item.tax_percent / hundred * item.quantity * item.rate)
        .sum();

    let total = (subtotal + tax_total - discount + extra_charges).max(Decimal::ZERO);

    Totals {
        subtotal,
        tax_total,
        total,
    }
}

/// Convert a base-currency amount for display. Stored amounts are never
/// mutated; callers pass the result straight to a formatter.
pub fn convert(amount: Decimal, rate: Decimal) -> Decimal {
    amount * rate
}

fn symbol_for(code: &str) -> Option<&'static str> {
    match code {
        "INR" => Some("\u{20b9}"),
        "USD" => Some("$"),
        "EUR" => Some("\u{20ac}"),
        "GBP" => Some("\u{a3}"),
        "JPY" => Some("\u{a5}"),
        "AUD" => Some("A$"),
        "CAD" => Some("C$"),
        "SGD" => Some("S$"),
        _ => None,
    }
}

/// Render an amount with exactly two fraction digits, no grouping.
fn two_dp(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Format an amount in the given currency.
///
/// Recognized codes get their symbol and thousands grouping; anything else
/// falls back to `"<CODE> <amount>"` with two fraction digits. Never fails.
pub fn format_money(amount: Decimal, currency: &str) -> String {
    let code = currency.trim().to_uppercase();
    let plain = two_dp(amount);

    let Some(symbol) = symbol_for(&code) else {
        return format!("{} {}", if code.is_empty() { "INR" } else { &code }, plain);
    };

    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    format!("{}{}{}.{}", sign, symbol, group_thousands(int_part), frac_part)
}

/// ASCII-safe variant used inside generated PDFs, where the built-in Type1
/// fonts cannot render non-Latin currency symbols.
pub fn format_money_ascii(amount: Decimal, currency: &str) -> String {
    let code = currency.trim().to_uppercase();
    let plain = two_dp(amount);
    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "00"));
    format!(
        "{} {}{}.{}",
        if code.is_empty() { "INR" } else { &code },
        sign,
        group_thousands(int_part),
        frac_part
    )
}

/// Recover the numeric amount from a formatted string. Used for round-trip
/// checks; tolerant of symbols and grouping.
pub fn parse_money(formatted: &str) -> Option<Decimal> {
    let cleaned: String = formatted
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}
