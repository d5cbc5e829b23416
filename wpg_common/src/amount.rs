use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Sub},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The number of decimals of the default payment asset (a USD stablecoin).
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

//--------------------------------------     TokenAmount     ---------------------------------------------------------
/// An amount of the payment asset, expressed as an integer number of the asset's smallest unit.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct TokenAmount(i64);

op!(binary TokenAmount, Add, add);
op!(binary TokenAmount, Sub, sub);
op!(inplace TokenAmount, AddAssign, add_assign);
op!(inplace TokenAmount, SubAssign, sub_assign);
op!(unary TokenAmount, Neg, neg);

impl Sum for TokenAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a token amount: {0}")]
pub struct TokenAmountConversionError(String);

impl From<i64> for TokenAmount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for TokenAmount {
    type Error = TokenAmountConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(TokenAmountConversionError(format!("Value {value} is too large to convert to a token amount")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl FromStr for TokenAmount {
    type Err = TokenAmountConversionError;

    /// Parses an integer number of smallest units.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|e| TokenAmountConversionError(format!("{s}: {e}")))
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}u", self.0)
    }
}

impl TokenAmount {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// The absolute distance between two amounts. Saturates rather than overflowing.
    pub fn abs_diff(&self, other: TokenAmount) -> TokenAmount {
        let diff = self.0.abs_diff(other.0);
        Self(i64::try_from(diff).unwrap_or(i64::MAX))
    }

    /// Converts a UI amount (e.g. `1.5` for one and a half tokens), as reported by most indexers, into smallest units.
    /// The result is rounded to the nearest unit, since floating point UI amounts are rarely exact.
    pub fn from_ui_amount(ui_amount: f64, decimals: u8) -> Result<Self, TokenAmountConversionError> {
        let value = Decimal::from_f64_retain(ui_amount)
            .ok_or_else(|| TokenAmountConversionError(format!("{ui_amount} is not a finite decimal number")))?;
        let units = scale_to_units(value, decimals)
            .ok_or_else(|| TokenAmountConversionError(format!("{ui_amount} is out of range")))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        units.to_i64().map(Self).ok_or_else(|| TokenAmountConversionError(format!("{ui_amount} is out of range")))
    }

    /// Parses a decimal string (e.g. `"1.00"`) exactly, without passing through floating point.
    ///
    /// Fails if the string has more fractional digits than `decimals`, unless the excess digits are all zero.
    pub fn from_decimal_str(value: &str, decimals: u8) -> Result<Self, TokenAmountConversionError> {
        let invalid = |msg: String| TokenAmountConversionError(format!("Invalid amount {value}. {msg}"));
        let parsed = Decimal::from_str_exact(value.trim()).map_err(|e| invalid(e.to_string()))?;
        let units = scale_to_units(parsed, decimals).ok_or_else(|| invalid("Amount is out of range".into()))?;
        if !units.fract().is_zero() {
            return Err(invalid("Too many decimal places".into()));
        }
        units.to_i64().map(Self).ok_or_else(|| invalid("Amount is out of range".into()))
    }
}

/// Multiplies `value` by `10^decimals`, or `None` on overflow.
fn scale_to_units(value: Decimal, decimals: u8) -> Option<Decimal> {
    let scale = (0..decimals).try_fold(Decimal::ONE, |acc, _| acc.checked_mul(Decimal::TEN))?;
    value.checked_mul(scale)
}

impl Sub<i64> for TokenAmount {
    type Output = Self;

    fn sub(self, rhs: i64) -> Self::Output {
        Self(self.0 - rhs)
    }
}
