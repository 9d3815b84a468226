use std::{fmt::Display, iter::Sum, ops::Add};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::number::Number;

/// A value of kilo watt hours.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Default)]
#[serde(transparent)]
pub struct Kwh(Number);

impl Kwh {
    pub fn zero() -> Self {
        Self(Number::zero())
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative()
    }

    /// Saturating addition
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub(crate) fn from_watt_hours(num: Number) -> Self {
        Self(num / Number::from(dec!(1000)))
    }

    /// The share `self` represents of `total`, `None` when `total` is zero.
    pub(crate) fn ratio_of(self, total: Self) -> Option<Number> {
        self.0.checked_div(total.0)
    }
}

impl Add for Kwh {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sum for Kwh {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Kwh::saturating_add)
    }
}

impl From<Decimal> for Kwh {
    fn from(value: Decimal) -> Self {
        Self(value.into())
    }
}

impl From<Number> for Kwh {
    fn from(value: Number) -> Self {
        Self(value)
    }
}

impl From<Kwh> for Decimal {
    fn from(value: Kwh) -> Self {
        value.0.into()
    }
}

impl From<Kwh> for Number {
    fn from(value: Kwh) -> Self {
        value.0
    }
}

impl Display for Kwh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", Decimal::from(self.0))
    }
}

/// A value of kilo watts, used for the contracted power.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Default)]
#[serde(transparent)]
pub struct Kw(Number);

impl Kw {
    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative()
    }

    pub fn is_positive(self) -> bool {
        !self.0.is_zero() && !self.0.is_sign_negative()
    }
}

impl From<Decimal> for Kw {
    fn from(value: Decimal) -> Self {
        Self(value.into())
    }
}

impl From<Kw> for Decimal {
    fn from(value: Kw) -> Self {
        value.0.into()
    }
}

impl Display for Kw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} kW", self.0)
    }
}
