//! Exact decimal helpers for money, rates and percentages
//!
//! All arithmetic is done with `Decimal`. Values are persisted as canonical
//! decimal TEXT so they reload without drift.

use crate::{Error, Result};
use rust_decimal::prelude::*;

/// Decimal places kept for monetary amounts
pub const MONEY_DP: u32 = 2;

/// Decimal places kept for ratio percentages
pub const RATIO_DP: u32 = 4;

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Round a monetary amount to 2 places, half away from zero
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a percentage to 4 places, half away from zero
#[inline]
pub fn round_ratio(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(RATIO_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount * pct / 100`, rounded as money
pub fn percent_of(amount: Decimal, pct: Decimal) -> Result<Decimal> {
    amount
        .checked_mul(pct)
        .and_then(|v| v.checked_div(ONE_HUNDRED))
        .map(round_money)
        .ok_or_else(|| overflow(format!("{} * {}%", amount, pct)))
}

/// `part / whole * 100`, or zero when `whole` is zero
pub fn ratio_pct(part: Decimal, whole: Decimal) -> Result<Decimal> {
    if whole.is_zero() {
        return Ok(Decimal::ZERO);
    }
    part.checked_div(whole)
        .and_then(|v| v.checked_mul(ONE_HUNDRED))
        .ok_or_else(|| overflow(format!("{} / {}", part, whole)))
}

/// Sum that reports overflow instead of panicking
pub fn checked_sum<I>(values: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| overflow(format!("{} + {}", acc, v)))
    })
}

fn overflow(expression: String) -> Error {
    Error::Internal(format!("Decimal overflow computing {}", expression))
}

/// Parse a decimal read back from a TEXT column.
///
/// A value that fails to parse means the row is corrupt; the column name is
/// carried in the error for diagnosis.
pub fn parse_stored(column: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| {
        Error::Internal(format!(
            "Corrupt decimal in column {}: '{}' ({})",
            column, raw, e
        ))
    })
}

/// Canonical TEXT representation for storage
#[inline]
pub fn to_stored(value: Decimal) -> String {
    value.normalize().to_string()
}
