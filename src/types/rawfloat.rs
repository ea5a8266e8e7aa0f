use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of fractional digits kept when a value is rendered.
pub const MAX_PRECISION: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid decimal numeral: {input:?}")]
pub struct ParseError {
    input: String,
}

impl ParseError {
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Price or amount as exchanged with the API.
///
/// The value is held as an exact decimal. Rendering (`Display`, JSON, form
/// parameters) always produces the canonical form: `"0"` for zero, plain
/// fixed-point notation, at most [`MAX_PRECISION`] fractional digits rounded
/// half away from zero, and no trailing zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rawfloat(Decimal);

impl Rawfloat {
    pub const ZERO: Rawfloat = Rawfloat(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // The shortest round-trip representation keeps 0.1 as 0.1 instead of
        // the binary expansion.
        Decimal::from_str(&value.to_string())
            .ok()
            .or_else(|| Decimal::from_f64(value))
            .map(Self)
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if !is_numeral(text) {
            return Err(ParseError {
                input: text.to_string(),
            });
        }
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .map(Self)
            .map_err(|_| ParseError {
                input: text.to_string(),
            })
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or_default()
    }

    /// Value rounded to [`MAX_PRECISION`] fractional digits.
    pub fn round(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(MAX_PRECISION, RoundingStrategy::MidpointAwayFromZero)
                .normalize(),
        )
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        self.0.checked_mul(rhs.0).map(Self)
    }
}

/// `[+-]digits[.digits][(e|E)[+-]digits]`, with digits on at least one side
/// of the point.
fn is_numeral(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        digits += i - frac_start;
    }
    if digits == 0 {
        return false;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}

impl fmt::Display for Rawfloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.round();
        if rounded.is_zero() {
            return f.write_str("0");
        }
        write!(f, "{}", rounded.0)
    }
}

impl FromStr for Rawfloat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Decimal> for Rawfloat {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Rawfloat {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl From<Rawfloat> for Decimal {
    fn from(value: Rawfloat) -> Self {
        value.0
    }
}

// Operators saturate at the decimal range; use the `checked_*` methods to
// detect overflow.
impl Add for Rawfloat {
    type Output = Rawfloat;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Rawfloat {
    type Output = Rawfloat;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Mul for Rawfloat {
    type Output = Rawfloat;

    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_mul(rhs.0))
    }
}

impl Neg for Rawfloat {
    type Output = Rawfloat;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Serialize for Rawfloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rawfloat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawfloatVisitor)
    }
}

struct RawfloatVisitor;

impl<'de> Visitor<'de> for RawfloatVisitor {
    type Value = Rawfloat;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal number or a string holding one")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if v.is_empty() {
            return Ok(Rawfloat::ZERO);
        }
        Rawfloat::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Rawfloat::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Rawfloat(Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Rawfloat::from_f64(v).ok_or_else(|| E::custom(format!("number {} out of range", v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Rawfloat::ZERO)
    }
}

/// Canonical string for a binary float.
pub fn format_f64(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    match Rawfloat::from_f64(value) {
        Some(raw) => raw.to_string(),
        None if value.is_finite() => trim_fraction(format!("{:.*}", MAX_PRECISION as usize, value)),
        None => value.to_string(),
    }
}

/// Parses a decimal numeral into a binary float.
pub fn parse_f64(text: &str) -> Result<f64, ParseError> {
    match Rawfloat::parse(text) {
        Ok(raw) => Ok(raw.to_f64()),
        Err(err) => text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or(err),
    }
}

fn trim_fraction(mut s: String) -> String {
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}
