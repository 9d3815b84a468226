use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Sub},
};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{electricity::Kwh, number::Number};

/// A monetary amount in euros. Also used for unit prices such as euros per kWh or per day.
#[derive(
    Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct Money(Number);

impl Money {
    /// No money at all.
    pub fn zero() -> Self {
        Self(Number::zero())
    }

    /// Round this amount to whole cents, half away from zero.
    #[must_use]
    pub fn round_cents(self) -> Self {
        Self(self.0.round_cents())
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

    pub(crate) fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Divide this amount in equal parts, `None` when `parts` is zero.
    pub(crate) fn checked_div(self, parts: Number) -> Option<Self> {
        self.0.checked_div(parts).map(Self)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl Mul<Number> for Money {
    type Output = Money;

    fn mul(self, rhs: Number) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Mul<Money> for Number {
    type Output = Money;

    fn mul(self, rhs: Money) -> Self::Output {
        Money(rhs.0 * self)
    }
}

impl Mul<Kwh> for Money {
    type Output = Money;

    fn mul(self, rhs: Kwh) -> Self::Output {
        Self(self.0 * Number::from(rhs))
    }
}

impl Mul<Money> for Kwh {
    type Output = Money;

    fn mul(self, rhs: Money) -> Self::Output {
        rhs * self
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value.into())
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0.into()
    }
}

impl From<Money> for Number {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", Decimal::from(self.0))
    }
}

/// A tax or discount percentage, `21` meaning 21%.
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Percentage(Number);

impl Percentage {
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// The part of `amount` this percentage represents. Not rounded.
    pub fn of(self, amount: Money) -> Money {
        Money(amount.0 * (self.0 / Number::from(dec!(100))))
    }
}

impl Mul<Money> for Percentage {
    type Output = Money;

    /// The amount with this percentage added on top, as a tax would.
    fn mul(self, rhs: Money) -> Self::Output {
        let factor = (self.0 / Number::from(dec!(100))) + Number::one();
        Money(rhs.0 * factor)
    }
}

impl Mul<Percentage> for Money {
    type Output = Money;

    fn mul(self, rhs: Percentage) -> Self::Output {
        rhs * self
    }
}

impl From<Decimal> for Percentage {
    fn from(value: Decimal) -> Self {
        Self(value.into())
    }
}

impl From<Percentage> for Decimal {
    fn from(value: Percentage) -> Self {
        value.0.into()
    }
}

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}
