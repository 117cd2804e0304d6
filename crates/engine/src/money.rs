use std::{
    fmt,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Signed money amount represented as **integer cents**.
///
/// Use this type for **all** monetary values in the engine (expense amounts,
/// budgets, computed shares) to avoid floating-point drift.
///
/// # Examples
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects >
/// 2 decimals):
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct MoneyCents(i64);

/// Reconciliation tolerance: split totals must land within one cent of the
/// expense amount. The single epsilon used everywhere sums are checked.
pub const RECONCILE_EPSILON: MoneyCents = MoneyCents(1);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Absolute difference between two amounts.
    #[must_use]
    pub const fn abs_diff(self, rhs: MoneyCents) -> MoneyCents {
        MoneyCents((self.0 - rhs.0).abs())
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_add(rhs.0).map(MoneyCents)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: MoneyCents) -> Option<MoneyCents> {
        self.0.checked_sub(rhs.0).map(MoneyCents)
    }

    /// Splits the amount into `n` near-equal parts that sum exactly to the
    /// original.
    ///
    /// Integer division leaves a residual of up to `n - 1` cents; those cents
    /// are handed out one each to the first parts, so `100.00 / 3` yields
    /// `[33.34, 33.33, 33.33]` and never drops or invents a cent.
    ///
    /// Returns an empty vector when `n == 0`.
    #[must_use]
    pub fn split_even(self, n: usize) -> Vec<MoneyCents> {
        if n == 0 {
            return Vec::new();
        }
        let n = n as i64;
        let base = self.0.div_euclid(n);
        let residual = self.0.rem_euclid(n);
        (0..n)
            .map(|i| MoneyCents(if i < residual { base + 1 } else { base }))
            .collect()
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let units = abs / 100;
        let cents = abs % 100;
        write!(f, "{sign}{units}.{cents:02}")
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

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - max 2 fractional digits (rejects `12.345`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || EngineError::InvalidAmount("empty amount".to_string());
        let invalid = || EngineError::InvalidAmount("invalid amount".to_string());
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (sign, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (-1i64, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (1i64, stripped)
        } else {
            (1i64, trimmed)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(empty());
        }

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let units_str = parts.next().ok_or_else(invalid)?;
        let cents_str = parts.next();

        if parts.next().is_some() {
            return Err(invalid());
        }

        if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = units_str.parse().map_err(|_| invalid())?;

        let cents: i64 = match cents_str {
            None => 0,
            Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                match frac.len() {
                    0 => 0,
                    1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                    2 => frac.parse::<i64>().map_err(|_| invalid())?,
                    _ => return Err(EngineError::InvalidAmount("too many decimals".to_string())),
                }
            }
        };

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(overflow)?;

        let signed = if sign < 0 {
            total.checked_neg().ok_or_else(overflow)?
        } else {
            total
        };

        Ok(MoneyCents(signed))
    }
}

/// A split value with four fractional digits, stored scaled by 10⁴.
///
/// The meaning depends on the split type:
/// - `Average` / `Ratio`: a fraction of the whole, where `10_000` = 100%.
/// - `Fixed` / `Selective`: an absolute amount, where `10_000` = 1.00.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct SplitValue(i64);

impl SplitValue {
    pub const SCALE: i64 = 10_000;

    /// Wraps a raw 10⁴-scaled value.
    #[must_use]
    pub const fn from_raw(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw 10⁴-scaled value.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// The fraction `1/n`, rounded half-up to four digits (`0.3333` for 3).
    ///
    /// Returns zero when `n == 0`.
    #[must_use]
    pub fn fraction_of(n: usize) -> Self {
        if n == 0 {
            return Self(0);
        }
        let n = n as i64;
        Self((Self::SCALE * 10 / n + 5) / 10)
    }

    /// An absolute amount expressed as a split value.
    #[must_use]
    pub const fn from_amount(amount: MoneyCents) -> Self {
        Self(amount.cents() * 100)
    }

    /// Interprets the value as an absolute amount, rounding to whole cents.
    #[must_use]
    pub fn as_amount(self) -> MoneyCents {
        MoneyCents(round_div(self.0 as i128, 100))
    }

    /// Interprets the value as a fraction and applies it to `amount`,
    /// rounding half-up to whole cents.
    #[must_use]
    pub fn apply_to(self, amount: MoneyCents) -> MoneyCents {
        MoneyCents(round_div(
            amount.cents() as i128 * self.0 as i128,
            Self::SCALE as i128,
        ))
    }
}

impl fmt::Display for SplitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:04}", abs / 10_000, abs % 10_000)
    }
}

/// Division rounding half away from zero.
fn round_div(numerator: i128, denominator: i128) -> i64 {
    let half = denominator / 2;
    let adjusted = if numerator >= 0 {
        numerator + half
    } else {
        numerator - half
    };
    (adjusted / denominator) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_two_decimals() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00");
        assert_eq!(MoneyCents::new(1).to_string(), "0.01");
        assert_eq!(MoneyCents::new(10).to_string(), "0.10");
        assert_eq!(MoneyCents::new(1050).to_string(), "10.50");
        assert_eq!(MoneyCents::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
        assert_eq!("10.5".parse::<MoneyCents>().unwrap().cents(), 1050);
        assert_eq!("10,50".parse::<MoneyCents>().unwrap().cents(), 1050);
        assert_eq!("-0.01".parse::<MoneyCents>().unwrap().cents(), -1);
        assert_eq!("+1.00".parse::<MoneyCents>().unwrap().cents(), 100);
        assert_eq!("  2.30 ".parse::<MoneyCents>().unwrap().cents(), 230);
    }

    #[test]
    fn parse_rejects_more_than_two_decimals() {
        assert!("12.345".parse::<MoneyCents>().is_err());
        assert!("0.001".parse::<MoneyCents>().is_err());
    }

    #[test]
    fn split_even_exact() {
        let parts = MoneyCents::new(80_000).split_even(4);
        assert_eq!(parts, vec![MoneyCents::new(20_000); 4]);
    }

    #[test]
    fn split_even_distributes_residual_to_front() {
        let parts = MoneyCents::new(10_000).split_even(3);
        assert_eq!(
            parts,
            vec![
                MoneyCents::new(3334),
                MoneyCents::new(3333),
                MoneyCents::new(3333)
            ]
        );
        let total: i64 = parts.iter().map(|p| p.cents()).sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn split_even_zero_parts() {
        assert!(MoneyCents::new(100).split_even(0).is_empty());
    }

    #[test]
    fn fraction_of_rounds_half_up() {
        assert_eq!(SplitValue::fraction_of(4).raw(), 2500);
        assert_eq!(SplitValue::fraction_of(3).raw(), 3333);
        assert_eq!(SplitValue::fraction_of(6).raw(), 1667);
    }

    #[test]
    fn apply_fraction_to_amount() {
        let quarter = SplitValue::fraction_of(4);
        assert_eq!(quarter.apply_to(MoneyCents::new(80_000)).cents(), 20_000);
        let third = SplitValue::fraction_of(3);
        assert_eq!(third.apply_to(MoneyCents::new(10_000)).cents(), 3333);
    }

    #[test]
    fn amount_round_trip() {
        let amount = MoneyCents::new(15_000);
        assert_eq!(SplitValue::from_amount(amount).as_amount(), amount);
    }
}
