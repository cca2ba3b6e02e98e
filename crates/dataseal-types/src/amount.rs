use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use crate::error::{DataSealError, Result};

/// Denominator for basis-point ratios (100% = 10_000 bps)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Fixed-point value amount with 9 decimal places
/// Internally stored as i128 to prevent overflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(i128);

const SCALE: i128 = 1_000_000_000; // 10^9

impl Amount {
    /// Zero amount
    pub const ZERO: Amount = Amount(0);

    /// Create from raw i128 (scaled value)
    pub const fn from_raw(raw: i128) -> Self {
        Amount(raw)
    }

    /// Get the raw scaled value
    pub const fn raw(&self) -> i128 {
        self.0
    }

    /// Create from integer units
    pub const fn from_units(units: i64) -> Self {
        Amount((units as i128) * SCALE)
    }

    /// Whole units, truncated toward zero
    pub const fn whole_units(&self) -> i128 {
        self.0 / SCALE
    }

    /// Parse a decimal string such as "12.5" without going through floats
    pub fn from_string(s: &str) -> Result<Self> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(DataSealError::InvalidAmount(format!("cannot parse: {}", s)));
        }
        if frac_part.len() > 9 {
            return Err(DataSealError::InvalidAmount(format!(
                "more than 9 decimal places: {}",
                s
            )));
        }
        let parse = |part: &str| -> Result<i128> {
            if part.is_empty() {
                return Ok(0);
            }
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(DataSealError::InvalidAmount(format!("cannot parse: {}", s)));
            }
            part.parse::<i128>()
                .map_err(|_| DataSealError::InvalidAmount(format!("cannot parse: {}", s)))
        };
        let whole = parse(int_part)?;
        let frac = parse(frac_part)? * 10_i128.pow(9 - frac_part.len() as u32);
        let raw = whole
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(|| DataSealError::InvalidAmount(format!("overflow: {}", s)))?;
        Ok(Amount(if negative { -raw } else { raw }))
    }

    /// Check if amount is positive
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Check if amount is negative
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Check if amount is zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(&self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or_else(|| DataSealError::InvalidAmount("overflow in addition".to_string()))
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: Self) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or_else(|| DataSealError::InvalidAmount("overflow in subtraction".to_string()))
    }

    /// Portion of this amount expressed in basis points, rounded toward zero.
    /// The complement (`self - portion`) therefore never exceeds `self`.
    pub fn checked_mul_bps(&self, bps: u32) -> Result<Self> {
        if bps > BPS_DENOMINATOR {
            return Err(DataSealError::InvalidAmount(format!(
                "ratio above 100%: {} bps",
                bps
            )));
        }
        self.0
            .checked_mul(bps as i128)
            .map(|scaled| Amount(scaled / BPS_DENOMINATOR as i128))
            .ok_or_else(|| DataSealError::InvalidAmount("overflow in multiplication".to_string()))
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Amount(self.0 + other.0)
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Amount(self.0 - other.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:09}", sign, abs / SCALE as u128, abs % SCALE as u128)
    }
}
