//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! All amounts are integer minor currency units (e.g. rupiah, cents). Float
//! arithmetic never touches a price: `1000 / 3 = 333` loses one unit and we
//! know exactly where it went, which is why bundle discounts are spread with
//! [`Money::distribute`] instead of division.
//!
//! ## Usage
//! ```rust
//! use meridian_core::money::Money;
//!
//! let price = Money::from_minor(15_000);
//! let line_total = price.multiply_quantity(3);
//! assert_eq!(line_total.minor(), 45_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// - **i64 (signed)**: allows negative values for corrections and discounts
/// - **Single-field tuple struct**: zero-cost abstraction over i64
/// - Every price in the engine (list price, special price, discount, cart
///   totals) flows through this type
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(2_500);
    /// assert_eq!(unit_price.multiply_quantity(4).minor(), 10_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns the smaller of two values.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// Splits this amount across weighted shares without losing minor units.
    ///
    /// Largest-remainder allocation: each share gets
    /// `floor(total * weight / weight_sum)`, then leftover units go to the
    /// shares with the largest remainders, ties broken by position. The
    /// returned shares always sum to exactly `self`.
    ///
    /// Invariant: `weights` must be non-empty with a positive sum; otherwise
    /// an empty vector is returned and the caller keeps the whole amount.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::Money;
    ///
    /// // 100 split over weights 1:1:1 -> 34 + 33 + 33
    /// let shares = Money::from_minor(100).distribute(&[1, 1, 1]);
    /// assert_eq!(shares.iter().map(|m| m.minor()).sum::<i64>(), 100);
    /// ```
    pub fn distribute(&self, weights: &[i64]) -> Vec<Money> {
        let weight_sum: i64 = weights.iter().sum();
        if weights.is_empty() || weight_sum <= 0 {
            return Vec::new();
        }

        // i128 intermediate so total * weight cannot overflow
        let total = self.0 as i128;
        let mut shares: Vec<i64> = Vec::with_capacity(weights.len());
        let mut remainders: Vec<(usize, i128)> = Vec::with_capacity(weights.len());

        for (idx, &w) in weights.iter().enumerate() {
            let exact = total * w as i128;
            shares.push((exact / weight_sum as i128) as i64);
            remainders.push((idx, exact % weight_sum as i128));
        }

        let assigned: i64 = shares.iter().sum();
        let mut leftover = self.0 - assigned;

        // Largest remainder first; stable order keeps this deterministic.
        remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let mut cursor = 0;
        while leftover > 0 {
            let (idx, _) = remainders[cursor % remainders.len()];
            shares[idx] += 1;
            leftover -= 1;
            cursor += 1;
        }

        shares.into_iter().map(Money).collect()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows raw minor units; currency formatting is a screen concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(15_000);
        assert_eq!(money.minor(), 15_000);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1_000);
        let b = Money::from_minor(400);

        assert_eq!((a + b).minor(), 1_400);
        assert_eq!((a - b).minor(), 600);
        assert_eq!((a * 3).minor(), 3_000);
        assert_eq!(a.multiply_quantity(5).minor(), 5_000);
    }

    #[test]
    fn test_zero_and_sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(!Money::from_minor(1).is_zero());
        assert!(Money::from_minor(-1).is_negative());
        assert!(!Money::from_minor(1).is_negative());
    }

    #[test]
    fn test_distribute_conserves_total() {
        let total = Money::from_minor(25_000);
        let shares = total.distribute(&[300_000, 150_000, 50_000]);
        assert_eq!(shares.len(), 3);
        assert_eq!(shares.iter().map(|m| m.minor()).sum::<i64>(), 25_000);
        // Heaviest weight gets the biggest share.
        assert!(shares[0] > shares[1]);
        assert!(shares[1] > shares[2]);
    }

    #[test]
    fn test_distribute_equal_weights_with_remainder() {
        let shares = Money::from_minor(100).distribute(&[1, 1, 1]);
        assert_eq!(
            shares.iter().map(|m| m.minor()).collect::<Vec<_>>(),
            vec![34, 33, 33]
        );
    }

    #[test]
    fn test_distribute_is_deterministic() {
        let total = Money::from_minor(77_777);
        let weights = [13, 7, 29, 7];
        assert_eq!(total.distribute(&weights), total.distribute(&weights));
    }

    #[test]
    fn test_distribute_degenerate_weights() {
        assert!(Money::from_minor(100).distribute(&[]).is_empty());
        assert!(Money::from_minor(100).distribute(&[0, 0]).is_empty());
    }
}
