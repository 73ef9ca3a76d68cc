//! Fixed-point helpers.
//!
//! Every amount, price and ratio is a `Decimal` truncated to [`PRECISION`]
//! decimal places after each multiplication or division. Truncation is
//! toward zero, which is floor for the non-negative values this crate works
//! with, so repeated settlements round the same way integer 1e18 arithmetic
//! would.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::FeeError;

/// Decimal places kept after every operation.
pub const PRECISION: u32 = 18;

/// Seconds in a 365-day year.
pub const SECONDS_PER_YEAR: i64 = 365 * 24 * 3600;

/// Basis points per unit.
pub const BPS_SCALE: u32 = 4;

pub fn truncate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRECISION, RoundingStrategy::ToZero)
}

pub fn mul(a: Decimal, b: Decimal) -> Result<Decimal, FeeError> {
    a.checked_mul(b)
        .map(truncate)
        .ok_or(FeeError::Overflow("multiplication"))
}

/// `a / b`, floored. Callers guard against a zero divisor.
pub fn div(a: Decimal, b: Decimal) -> Result<Decimal, FeeError> {
    if b.is_zero() {
        return Err(FeeError::InvariantViolation("division by zero".into()));
    }
    a.checked_div(b)
        .map(truncate)
        .ok_or(FeeError::Overflow("division"))
}

/// `a * b / c` with a single truncation at the end.
///
/// When `a * b` does not fit in a `Decimal` the quotient `b / c` is floored
/// first and then scaled by `a`, which loses at most `a * 1e-18`.
pub fn mul_div(a: Decimal, b: Decimal, c: Decimal) -> Result<Decimal, FeeError> {
    if c.is_zero() {
        return Err(FeeError::InvariantViolation("division by zero".into()));
    }
    match a.checked_mul(b) {
        Some(product) => product
            .checked_div(c)
            .map(truncate)
            .ok_or(FeeError::Overflow("division")),
        None => mul(a, div(b, c)?),
    }
}

pub fn add(a: Decimal, b: Decimal) -> Result<Decimal, FeeError> {
    a.checked_add(b).ok_or(FeeError::Overflow("addition"))
}

/// `base` raised to a whole power by squaring, floored after every step.
pub fn pow(base: Decimal, mut exp: u64) -> Result<Decimal, FeeError> {
    let mut result = Decimal::ONE;
    let mut square = base;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul(result, square)?;
        }
        exp >>= 1;
        if exp > 0 {
            square = mul(square, square)?;
        }
    }
    Ok(result)
}

/// Convert basis points to a fraction (`2000` → `0.2`).
pub fn bps_to_fraction(bps: u32) -> Decimal {
    Decimal::new(bps as i64, BPS_SCALE)
}

/// Shares to mint so that the recipient ends up holding exactly `fee_value`
/// worth of a fund valued at `gav`:
///
/// `shares / (supply + shares) * gav == fee_value`
/// ⇒ `shares = supply * fee_value / (gav - fee_value)`
pub fn dilutive_shares(
    supply: Decimal,
    fee_value: Decimal,
    gav: Decimal,
) -> Result<Decimal, FeeError> {
    if fee_value >= gav {
        return Err(FeeError::InvariantViolation(format!(
            "fee value {fee_value} must be below gav {gav}"
        )));
    }
    mul_div(supply, fee_value, gav - fee_value)
}
