//! Row validation and normalization
//!
//! Turns a [`RawRow`] into a [`NormalizedRow`] ready to insert. Amounts accept
//! `.` or `,` as decimal separator and are taken as absolute values; returns
//! are re-signed negative afterwards.

use crate::schema::RawRow;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use spx_common::db::OperationKind;
use spx_common::money::round_money;
use spx_common::{Error, Result};
use std::str::FromStr;
use tracing::warn;

/// Accepted date layouts, tried in order
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%m/%d/%Y"];

/// Reason stored for returns without one
pub const DEFAULT_RETURN_REASON: &str = "Unspecified";

/// Largest accepted magnitude of a monetary field, given or derived
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Largest accepted quantity
pub const MAX_QUANTITY: i64 = 1_000_000;

const RETURN_KEYWORDS: &[&str] = &["return", "devol"];

/// A validated row
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub salesperson_name: String,
    pub reference: String,
    pub product_name: Option<String>,
    pub kind: OperationKind,
    pub return_reason: Option<String>,
    pub quantity: i64,
    /// Always positive
    pub unit_value: Decimal,
    /// Negative for returns
    pub total_value: Decimal,
    /// Negative for returns
    pub tax: Decimal,
    pub date: NaiveDate,
}

/// Validate and normalize one row. Unparsable dates fall back to `today`.
pub fn normalize(row: RawRow, today: NaiveDate) -> Result<NormalizedRow> {
    let salesperson_name = row
        .salesperson
        .ok_or_else(|| Error::InvalidInput("Missing salesperson name".to_string()))?;
    let reference = row
        .reference
        .ok_or_else(|| Error::InvalidInput("Missing product reference".to_string()))?;

    let kind = classify(row.operation_type.as_deref());
    let quantity = parse_quantity(row.quantity.as_deref())?;
    let unit_value = parse_amount("unit value", row.unit_value.as_deref())?.unwrap_or_default();
    let total = match parse_amount("total value", row.total_value.as_deref())? {
        Some(total) => total,
        None => derive_total(unit_value, quantity)?,
    };
    let tax = parse_amount("tax", row.tax.as_deref())?.unwrap_or_default();

    let date = match row.date.as_deref() {
        None => today,
        Some(raw) => parse_date(raw).unwrap_or_else(|| {
            warn!("Unrecognized date '{}', using {}", raw, today);
            today
        }),
    };

    let (total_value, tax, return_reason) = match kind {
        OperationKind::Sale => (total, tax, None),
        OperationKind::Return => (
            -total,
            -tax,
            Some(row.reason.unwrap_or_else(|| DEFAULT_RETURN_REASON.to_string())),
        ),
    };

    Ok(NormalizedRow {
        salesperson_name,
        reference,
        product_name: row.product,
        kind,
        return_reason,
        quantity,
        unit_value,
        total_value,
        tax,
        date,
    })
}

/// A row is a return when its type mentions a return keyword
pub fn classify(operation_type: Option<&str>) -> OperationKind {
    let Some(raw) = operation_type else {
        return OperationKind::Sale;
    };
    let lowered = raw.to_lowercase();
    if RETURN_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        OperationKind::Return
    } else {
        OperationKind::Sale
    }
}

/// Absolute decimal value of a non-empty field
pub fn parse_amount(field: &str, raw: Option<&str>) -> Result<Option<Decimal>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let normalized = raw.trim().replace(',', ".");
    let value = Decimal::from_str(&normalized)
        .map_err(|_| Error::InvalidInput(format!("Invalid {} '{}'", field, raw)))?
        .abs();
    if value > Decimal::from(MAX_AMOUNT) {
        return Err(Error::InvalidInput(format!(
            "{} '{}' exceeds {}",
            field, raw, MAX_AMOUNT
        )));
    }
    Ok(Some(value))
}

/// `unit_value * quantity`, bounded like a given total
fn derive_total(unit_value: Decimal, quantity: i64) -> Result<Decimal> {
    unit_value
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
        .filter(|total| *total <= Decimal::from(MAX_AMOUNT))
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "Total of {} x {} exceeds {}",
                quantity, unit_value, MAX_AMOUNT
            ))
        })
}

/// Absolute whole quantity; 1 when absent
pub fn parse_quantity(raw: Option<&str>) -> Result<i64> {
    let Some(value) = parse_amount("quantity", raw)? else {
        return Ok(1);
    };
    let invalid = || Error::InvalidInput(format!("Invalid quantity '{}'", raw.unwrap_or_default()));
    if !value.fract().is_zero() {
        return Err(invalid());
    }
    let quantity = value.to_i64().ok_or_else(invalid)?;
    if quantity > MAX_QUANTITY {
        return Err(Error::InvalidInput(format!(
            "Quantity '{}' exceeds {}",
            raw.unwrap_or_default(),
            MAX_QUANTITY
        )));
    }
    Ok(quantity)
}

/// First format in [`DATE_FORMATS`] that parses `raw`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}
