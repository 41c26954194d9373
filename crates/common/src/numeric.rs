//! Fixed-point parsing and serde helpers for subgraph-encoded numbers.
//!
//! The subgraph returns `BigInt` / `BigDecimal` fields as JSON strings and
//! plain `Int` fields as numbers. Amounts can exceed 64 bits (wei), so they are
//! parsed into `U256` and only turned into `f64` at the display edge.

use std::str::FromStr;

use alloy::primitives::{U256, U512};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::Unavailable;

/// Parse a non-negative decimal string into a fixed-point integer with
/// `decimals` fractional digits. Extra fractional digits are truncated.
///
/// `"1.5"` with 18 decimals parses to `1_500_000_000_000_000_000`.
pub fn parse_fixed(raw: &str, decimals: u32) -> Result<U256, Unavailable> {
    let malformed = || Unavailable::MalformedNumeric(raw.to_string());
    let s = raw.trim();

    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(malformed());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let decimals = decimals as usize;
    let frac = &frac[..frac.len().min(decimals)];

    let mut digits = String::with_capacity(whole.len() + decimals + 1);
    digits.push_str(if whole.is_empty() { "0" } else { whole });
    digits.push_str(frac);
    digits.extend(std::iter::repeat_n('0', decimals - frac.len()));

    U256::from_str(&digits).map_err(|_| malformed())
}

/// Parse a non-negative base-10 integer string into a `U256`.
pub fn parse_integer(raw: &str) -> Result<U256, Unavailable> {
    let s = raw.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Unavailable::MalformedNumeric(raw.to_string()));
    }
    U256::from_str(s).map_err(|_| Unavailable::MalformedNumeric(raw.to_string()))
}

/// Widen a `U256` into a `U512` so products of two amounts cannot overflow.
pub fn widen(value: U256) -> U512 {
    U512::from_limbs_slice(value.as_limbs())
}

/// `10^exp` as a `U512`.
pub fn pow10(exp: u32) -> U512 {
    U512::from(10u64).pow(U512::from(exp))
}

/// Render a fixed-point integer with `decimals` fractional digits as a
/// decimal string, e.g. `1500` with 3 decimals becomes `"1.500"`.
pub fn fixed_to_decimal_string(value: U512, decimals: u32) -> String {
    let scale = pow10(decimals);
    let whole = (value / scale).to_string();
    if decimals == 0 {
        return whole;
    }
    let frac = (value % scale).to_string();
    let padding = (decimals as usize).saturating_sub(frac.len());
    format!("{}.{}{}", whole, "0".repeat(padding), frac)
}

/// Convert a fixed-point integer with `decimals` fractional digits to `f64`.
///
/// The integer and fractional parts are formatted separately before the float
/// parse, so precision loss is limited to what `f64` itself cannot represent.
pub fn fixed_to_f64(value: U512, decimals: u32) -> f64 {
    // A formatted decimal always parses; NaN keeps the failure visible if not.
    fixed_to_decimal_string(value, decimals)
        .parse()
        .unwrap_or(f64::NAN)
}

/// Serialize a `DateTime<Utc>` as unix seconds.
pub fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(ts.timestamp())
}

/// Serialize an optional `DateTime<Utc>` as unix seconds or `null`.
pub fn serialize_opt_timestamp<S: Serializer>(
    ts: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match ts {
        Some(ts) => serializer.serialize_some(&ts.timestamp()),
        None => serializer.serialize_none(),
    }
}

/// A JSON scalar that may carry a number either natively or as a string.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum NumberOrString {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberOrString {
    pub(crate) fn into_text(self) -> String {
        match self {
            NumberOrString::Int(i) => i.to_string(),
            // Enough digits to keep every significant figure of an f64.
            NumberOrString::Float(f) => format!("{:.18}", f),
            NumberOrString::Text(s) => s,
        }
    }
}

fn timestamp_from_seconds(raw: NumberOrString) -> Result<DateTime<Utc>, String> {
    let text = raw.into_text();
    let secs: i64 = text
        .trim()
        .parse()
        .map_err(|_| format!("invalid unix timestamp '{}'", text))?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("unix timestamp out of range: {}", secs))
}

/// Deserialize unix seconds (number or string) into a `DateTime<Utc>`.
pub fn deserialize_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = NumberOrString::deserialize(deserializer)?;
    timestamp_from_seconds(raw).map_err(serde::de::Error::custom)
}

/// Deserialize optional unix seconds. `null` and `""` both mean "absent".
pub fn deserialize_opt_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(raw) => timestamp_from_seconds(raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
