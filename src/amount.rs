//! Exact, sign-aware quantities in the smallest on-chain unit (wei).
//!
//! Amounts travel as decimal-digit strings on the wire and in sqlite so values
//! beyond `u64` survive intact. Floating point is never involved.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

use num_bigint::{BigInt, Sign};
use num_traits::{Signed as _, Zero as _};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wei per satoshi (10^10).
const WEI_PER_SATOSHI: u64 = 10_000_000_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigInt);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseAmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount {0:?}: expected decimal digits")]
    Invalid(String),
}

impl Amount {
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    pub fn from_satoshi(sat: u64) -> Self {
        Self(BigInt::from(sat) * BigInt::from(WEI_PER_SATOSHI))
    }

    /// Satoshis covering this amount, rounding any fractional satoshi up.
    pub fn to_satoshi_ceil(&self) -> Amount {
        self.div_ceil(&BigInt::from(WEI_PER_SATOSHI))
    }

    /// `ceil(self * numerator / denominator)` for non-negative inputs.
    pub fn mul_div_ceil(&self, numerator: u64, denominator: u64) -> Amount {
        let scaled = Amount(&self.0 * BigInt::from(numerator));
        scaled.div_ceil(&BigInt::from(denominator))
    }

    fn div_ceil(&self, divisor: &BigInt) -> Amount {
        let (q, r) = (&self.0 / divisor, &self.0 % divisor);
        if r.is_positive() {
            Amount(q + 1u32)
        } else {
            Amount(q)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    /// Big-endian 32-byte word, as used by the quote hash encoding.
    pub fn to_be_word(&self) -> Option<[u8; 32]> {
        let (sign, bytes) = self.0.to_bytes_be();
        if sign == Sign::Minus || bytes.len() > 32 {
            return None;
        }
        let mut word = [0u8; 32];
        word[32 - bytes.len()..].copy_from_slice(&bytes);
        Some(word)
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(BigInt::from(v))
    }
}

impl From<i64> for Amount {
    fn from(v: i64) -> Self {
        Self(BigInt::from(v))
    }
}

impl From<BigInt> for Amount {
    fn from(v: BigInt) -> Self {
        Self(v)
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        let digits = s.strip_prefix('-').unwrap_or(s);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseAmountError::Invalid(s.to_string()));
        }
        BigInt::from_str(s)
            .map(Self)
            .map_err(|_| ParseAmountError::Invalid(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Amount> for &'a Amount {
    type Output = Amount;
    fn add(self, rhs: &'a Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl<'a> Sub<&'a Amount> for &'a Amount {
    type Output = Amount;
    fn sub(self, rhs: &'a Amount) -> Amount {
        Amount(&self.0 - &rhs.0)
    }
}

impl Mul for Amount {
    type Output = Amount;
    fn mul(self, rhs: Amount) -> Amount {
        Amount(self.0 * rhs.0)
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        self.0 += &rhs.0;
    }
}

impl SubAssign<&Amount> for Amount {
    fn sub_assign(&mut self, rhs: &Amount) {
        self.0 -= &rhs.0;
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.fold(Amount::zero(), |mut acc, a| {
            acc += a;
            acc
        })
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
