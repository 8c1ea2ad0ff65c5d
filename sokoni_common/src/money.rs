use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const KES_CURRENCY_CODE: &str = "KES";
pub const KES_CURRENCY_CODE_LOWER: &str = "kes";

//--------------------------------------       Cents        ----------------------------------------------------------
/// An exact amount of Kenyan Shillings, stored as an integer number of cents.
///
/// All order arithmetic (subtotals, commission splits, refunds) is done in `Cents` so that sums and splits are exact.
/// Floating point never enters the ledger.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Cents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Cents {}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {} is too large to convert to Cents", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}KSh {}.{:02}", cents / 100, cents % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_shillings(shillings: i64) -> Self {
        Self(shillings * 100)
    }

    /// The amount in whole shillings, rounded down. The mobile-money gateway only accepts integer shilling amounts.
    pub fn whole_shillings(&self) -> i64 {
        self.0 / 100
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Splits the amount into a platform commission and a remainder, at the given rate in basis points.
    ///
    /// The commission is rounded down to the cent and the remainder takes up the difference, so the two halves always
    /// sum back to the original amount exactly.
    pub fn split(&self, rate_bps: u32) -> (Cents, Cents) {
        let commission = Cents(self.0 * i64::from(rate_bps) / 10_000);
        (commission, Cents(self.0 - commission.0))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic_is_exact() {
        let a = Cents::from_shillings(1000);
        let b = Cents::from(50);
        assert_eq!((a + b).value(), 100_050);
        assert_eq!((a - b).value(), 99_950);
        assert_eq!((b * 3).value(), 150);
        let total: Cents = vec![a, b, b].into_iter().sum();
        assert_eq!(total.value(), 100_100);
    }

    #[test]
    fn split_halves_sum_to_the_whole() {
        for (amount, rate) in [(200_000i64, 2500u32), (99_99, 2500), (1, 2500), (333_33, 1000), (0, 2500)] {
            let subtotal = Cents::from(amount);
            let (commission, payout) = subtotal.split(rate);
            assert_eq!(commission + payout, subtotal, "split of {subtotal} at {rate}bps drifted");
        }
    }

    #[test]
    fn split_never_drifts_for_arbitrary_amounts() {
        // xorshift-driven sweep over awkward amounts and rates.
        let mut state: u64 = 0x5eed_cafe_f00d_1234;
        for _ in 0..10_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let amount = (state % 10_000_000) as i64;
            let rate = (state % 10_001) as u32;
            let subtotal = Cents::from(amount);
            let (commission, payout) = subtotal.split(rate);
            assert_eq!(commission + payout, subtotal, "split of {subtotal} at {rate}bps drifted");
            assert!(commission.value() >= 0 && payout.value() >= 0);
            assert!(commission <= subtotal);
        }
    }

    #[test]
    fn quarter_rate_split() {
        let (commission, payout) = Cents::from_shillings(2000).split(2500);
        assert_eq!(commission, Cents::from_shillings(500));
        assert_eq!(payout, Cents::from_shillings(1500));
    }

    #[test]
    fn display_formats_cents() {
        assert_eq!(Cents::from(150_000).to_string(), "KSh 1500.00");
        assert_eq!(Cents::from(99).to_string(), "KSh 0.99");
        assert_eq!(Cents::from(-1234).to_string(), "-KSh 12.34");
    }
}
