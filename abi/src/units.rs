//! Ether unit conversion between user-typed decimal strings and wei.
//!
//! Input is validated and canonicalized here, then scaled by
//! `ethers::utils`. No floats are involved, so conversion is monotonic.

use ethers::utils;

use crate::U256;

/// Decimal places between ether and wei.
pub const ETHER_DECIMALS: usize = 18;

/// Widest whole part whose wei value still fits in a `U256`.
const MAX_WHOLE_DIGITS: usize = 59;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    #[error("price is empty")]
    Empty,
    #[error("price \"{0}\" is not a valid number")]
    NotNumeric(String),
    #[error("price cannot be negative")]
    Negative,
    #[error("price \"{0}\" has more than {ETHER_DECIMALS} decimal places")]
    TooPrecise(String),
    #[error("price \"{0}\" is too large")]
    Overflow(String),
}

/// Normalize user price input: drop all whitespace and accept `,` as the
/// decimal separator (`"12,50"` becomes `"12.50"`).
#[must_use]
pub fn normalize_decimal(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

/// Normalize and parse an ether amount into wei.
///
/// # Errors
///
/// Rejects empty, negative, non-numeric (including `inf`, `NaN`, and exponent
/// notation), over-precise, and overflowing input.
pub fn parse_ether(raw: &str) -> Result<U256, UnitError> {
    let value = normalize_decimal(raw);
    let canonical = canonical_decimal(&value)?;
    utils::parse_ether(&canonical).map_err(|_| UnitError::Overflow(value))
}

/// Render wei as ether, keeping at least one fractional digit
/// (`1000000000000000000` → `"1.0"`).
#[must_use]
pub fn format_ether(wei: U256) -> String {
    let full = utils::format_ether(wei);
    if !full.contains('.') {
        return format!("{full}.0");
    }
    let trimmed = full.trim_end_matches('0');
    match trimmed.strip_suffix('.') {
        Some(whole) => format!("{whole}.0"),
        None => trimmed.to_owned(),
    }
}

/// Validate `value` and rewrite it as `whole[.significant]` so the scaler
/// never has to truncate or pad.
fn canonical_decimal(value: &str) -> Result<String, UnitError> {
    if value.is_empty() {
        return Err(UnitError::Empty);
    }
    if let Some(rest) = value.strip_prefix('-') {
        return if is_decimal(rest) {
            Err(UnitError::Negative)
        } else {
            Err(UnitError::NotNumeric(value.to_owned()))
        };
    }
    if !is_decimal(value) {
        return Err(UnitError::NotNumeric(value.to_owned()));
    }

    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    let significant = fraction.trim_end_matches('0');
    if significant.len() > ETHER_DECIMALS {
        return Err(UnitError::TooPrecise(value.to_owned()));
    }
    if whole.trim_start_matches('0').len() > MAX_WHOLE_DIGITS {
        return Err(UnitError::Overflow(value.to_owned()));
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    if significant.is_empty() {
        Ok(whole.to_owned())
    } else {
        Ok(format!("{whole}.{significant}"))
    }
}

/// `digits [ '.' digits ]` with at least one digit overall.
fn is_decimal(value: &str) -> bool {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && all_digits(fraction) && !(whole.is_empty() && fraction.is_empty())
}

#[cfg(test)]
#[path = "units_test.rs"]
mod tests;
