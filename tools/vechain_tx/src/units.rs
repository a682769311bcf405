//! Conversion between human-readable decimal strings and base units.
//!
//! Scaling is delegated to alloy's `parse_units` and `format_units`, which work on
//! 256-bit integers. Amounts never pass through floating point. alloy silently drops
//! excess fraction digits, so [`DecimalAmount`] rejects them before scaling.

use alloy::primitives::{
    U256,
    utils::{format_units, parse_units},
};
use std::{cmp::Ordering, fmt};
use vechain_core::CapabilityError;

/// A non-negative decimal amount as typed by a user, e.g. `"100.5"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalAmount {
    /// Integer digits without leading zeros, empty for zero
    integer: String,
    /// Fraction digits without trailing zeros
    fraction: String,
}

impl DecimalAmount {
    pub fn parse(amount: &str) -> Result<Self, CapabilityError> {
        let raw = amount.trim();
        if raw.is_empty() {
            return Err(CapabilityError::invalid_amount(amount, "amount is empty"));
        }
        if raw.starts_with('-') {
            return Err(CapabilityError::invalid_amount(
                amount,
                "amount must not be negative",
            ));
        }

        let (integer, fraction) = raw.split_once('.').unwrap_or((raw, ""));
        if (integer.is_empty() && fraction.is_empty())
            || !integer.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(CapabilityError::invalid_amount(
                amount,
                "amount is not a decimal number",
            ));
        }

        Ok(Self {
            integer: integer.trim_start_matches('0').to_string(),
            fraction: fraction.trim_end_matches('0').to_string(),
        })
    }

    pub fn is_zero(&self) -> bool {
        self.integer.is_empty() && self.fraction.is_empty()
    }

    /// Number of significant fraction digits.
    pub fn scale(&self) -> usize {
        self.fraction.len()
    }

    /// Scales the amount by `10^decimals`.
    ///
    /// Fails when the amount has more fraction digits than `decimals` or does not fit
    /// in 256 bits; nothing is rounded or truncated.
    pub fn to_base_units(&self, decimals: u8) -> Result<U256, CapabilityError> {
        let amount = self.to_string();
        if self.fraction.len() > decimals as usize {
            return Err(CapabilityError::invalid_amount(
                amount,
                format!("amount has more than {decimals} decimal places"),
            ));
        }

        let value = parse_units(&amount, decimals)
            .map_err(|err| CapabilityError::invalid_amount(&amount, err.to_string()))?;
        Ok(value.into())
    }
}

impl fmt::Display for DecimalAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let integer = if self.integer.is_empty() {
            "0"
        } else {
            &self.integer
        };
        if self.fraction.is_empty() {
            f.write_str(integer)
        } else {
            write!(f, "{integer}.{}", self.fraction)
        }
    }
}

impl Ord for DecimalAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.integer
            .len()
            .cmp(&other.integer.len())
            .then_with(|| self.integer.cmp(&other.integer))
            .then_with(|| self.fraction.cmp(&other.fraction))
    }
}

impl PartialOrd for DecimalAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Converts a decimal string into base units, e.g. `("100.5", 18)` to `100500000000000000000`.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256, CapabilityError> {
    DecimalAmount::parse(amount)?.to_base_units(decimals)
}

/// Renders base units as the shortest decimal string, e.g. `(1500000, 6)` to `"1.5"`.
///
/// Fails only for `decimals` beyond what a 256-bit integer can scale (77).
pub fn from_base_units(value: U256, decimals: u8) -> Result<String, CapabilityError> {
    let formatted = format_units(value, decimals)
        .map_err(|err| CapabilityError::invalid_amount(value.to_string(), err.to_string()))?;
    if !formatted.contains('.') {
        return Ok(formatted);
    }
    Ok(formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string())
}

/// Hex quantity as clauses expect it, `"0x0"` for zero.
pub fn to_hex_quantity(value: U256) -> String {
    format!("0x{value:x}")
}
