use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Basis points in one unit (a rate of `10_000` is 100 %).
pub const RATE_SCALE: i64 = 10_000;

/// Money amount in **euro cents**.
///
/// Every price, deposit, pricing and cashflow amount goes through this type.
/// Pricings use the sign convention of the finance ledger: a negative amount
/// is money that pass Culture owes to the offerer.
///
/// ```rust
/// use engine::MoneyCents;
///
/// let price = MoneyCents::from_euros(12) + MoneyCents::new(34);
/// assert_eq!(price.to_string(), "12.34€");
/// assert_eq!(price.apply_rate_bps(9_500).cents(), 1172);
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn from_euros(euros: i64) -> Self {
        Self(euros * 100)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }

    /// Floors the amount at zero.
    #[must_use]
    pub fn at_least_zero(self) -> MoneyCents {
        MoneyCents(self.0.max(0))
    }

    /// Multiplies by a rate expressed in basis points, rounding half away
    /// from zero to the cent.
    #[must_use]
    pub fn apply_rate_bps(self, rate_bps: i64) -> MoneyCents {
        let product = i128::from(self.0) * i128::from(rate_bps);
        let scale = i128::from(RATE_SCALE);
        let half = scale / 2;
        let rounded = if product >= 0 {
            (product + half) / scale
        } else {
            (product - half) / scale
        };
        MoneyCents(rounded as i64)
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}€", abs / 100, abs % 100)
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl AddAssign for MoneyCents {
    fn add_assign(&mut self, rhs: MoneyCents) {
        self.0 += rhs.0;
    }
}

impl Sub for MoneyCents {
    type Output = MoneyCents;

    fn sub(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 - rhs.0)
    }
}

impl SubAssign for MoneyCents {
    fn sub_assign(&mut self, rhs: MoneyCents) {
        self.0 -= rhs.0;
    }
}

impl Neg for MoneyCents {
    type Output = MoneyCents;

    fn neg(self) -> Self::Output {
        MoneyCents(-self.0)
    }
}

/// Unit price times a quantity.
impl Mul<i64> for MoneyCents {
    type Output = MoneyCents;

    fn mul(self, rhs: i64) -> Self::Output {
        MoneyCents(self.0 * rhs)
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = MoneyCents>>(iter: I) -> Self {
        iter.fold(MoneyCents::ZERO, Add::add)
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses euros typed by a human (`"12"`, `"12.5"`, `"12,50 €"`).
    ///
    /// At most two fractional digits are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidAmount(format!("invalid amount: {s:?}"));

        let trimmed = s.trim().trim_end_matches('€').trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim()),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed).trim()),
        };
        if digits.is_empty() {
            return Err(invalid());
        }

        let normalized = digits.replace(',', ".");
        let (euros_part, cents_part) = match normalized.split_once('.') {
            Some((euros, cents)) => (euros, cents),
            None => (normalized.as_str(), ""),
        };
        if euros_part.is_empty()
            || !euros_part.bytes().all(|b| b.is_ascii_digit())
            || !cents_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        if cents_part.len() > 2 {
            return Err(EngineError::InvalidAmount(
                "amounts have at most two decimals".to_string(),
            ));
        }

        let euros: i64 = euros_part.parse().map_err(|_| invalid())?;
        let cents: i64 = match cents_part.len() {
            0 => 0,
            1 => cents_part.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => cents_part.parse().map_err(|_| invalid())?,
        };
        let total = euros
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))?;

        Ok(MoneyCents(if negative { -total } else { total }))
    }
}
