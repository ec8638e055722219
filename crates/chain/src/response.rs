//! Field extraction from decoded contract query responses.
//!
//! CosmWasm contracts encode `Uint128`/`Decimal256` as JSON strings; older
//! endpoints sometimes return bare numbers. Both are accepted.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::ChainError;

/// Read `field` of `response` as a [`Decimal`].
pub fn decimal_field(response: &Value, field: &str, action: &str) -> Result<Decimal, ChainError> {
    let value = response
        .get(field)
        .ok_or_else(|| ChainError::malformed(action, format!("response missing '{}'", field)))?;
    parse_decimal(value).ok_or_else(|| {
        ChainError::malformed(action, format!("'{}' is not a decimal: {}", field, value))
    })
}

/// Significant digits a `Decimal` holds without loss.
const MAX_DIGITS: usize = 28;

/// Parse a JSON string or number as a [`Decimal`].
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal_str(s),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                parse_decimal_str(&n.to_string())
            }
        }
        _ => None,
    }
}

/// Parse a decimal string in plain or exponent form.
///
/// `Decimal256` values carry 18 fractional digits, which overflows `Decimal`
/// for large integer parts. Excess fractional digits are truncated.
pub fn parse_decimal_str(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if let Ok(d) = Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s)) {
        return Some(d);
    }
    let (int, frac) = s.split_once('.')?;
    let digits = int.strip_prefix('-').unwrap_or(int);
    if digits.is_empty() || !is_ascii_digits(digits) || !is_ascii_digits(frac) {
        return None;
    }
    let keep = MAX_DIGITS.saturating_sub(digits.len()).min(frac.len());
    if keep == 0 {
        Decimal::from_str(int).ok()
    } else {
        Decimal::from_str(&format!("{}.{}", int, &frac[..keep])).ok()
    }
}

fn is_ascii_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
