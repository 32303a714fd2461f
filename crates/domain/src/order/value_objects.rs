//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

/// Money amount in minor currency units (kopecks, cents).
///
/// Serialized as a bare integer so it matches the message and API shape.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a money amount from minor units.
    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the whole major-unit part.
    pub fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor remainder after the major part.
    pub fn minor_part(&self) -> i64 {
        self.0.abs() % 100
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Applies a percentage discount, truncating toward zero.
    pub fn percent_off(&self, percent: i32) -> Money {
        Money(self.0 - self.0 * i64::from(percent) / 100)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-{}.{:02}", self.major().abs(), self.minor_part())
        } else {
            write!(f, "{}.{:02}", self.major(), self.minor_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
