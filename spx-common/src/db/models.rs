//! Database models
//!
//! Row structs for every table plus the decoding from `SqliteRow`. Decimal
//! columns are TEXT and go through [`crate::money::parse_stored`].

use crate::money::parse_stored;
use crate::time::{parse_optional_timestamp, parse_timestamp};
use crate::{Error, Period, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        concat!("Unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

/// Kind of a recorded sales transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Sale,
    Return,
}

text_enum!(OperationKind { Sale => "sale", Return => "return" });

/// Lifecycle state of a commission record
///
/// Transitions only move forward: calculated → approved → paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionState {
    Calculated,
    Approved,
    Paid,
}

text_enum!(CommissionState {
    Calculated => "calculated",
    Approved => "approved",
    Paid => "paid",
});

impl CommissionState {
    /// The state a record must be in to move to `self`
    pub fn required_source(&self) -> Option<CommissionState> {
        match self {
            CommissionState::Calculated => None,
            CommissionState::Approved => Some(CommissionState::Calculated),
            CommissionState::Paid => Some(CommissionState::Approved),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalespersonStatus {
    Active,
    Inactive,
}

text_enum!(SalespersonStatus { Active => "active", Inactive => "inactive" });

/// State of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    Processing,
    Completed,
    Error,
}

text_enum!(ImportState {
    Processing => "processing",
    Completed => "completed",
    Error => "error",
});

/// What an ingestion file is declared to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Sales,
    Returns,
    #[default]
    Mixed,
}

text_enum!(ImportKind { Sales => "sales", Returns => "returns", Mixed => "mixed" });

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Salesperson {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub email: String,
    pub hired_on: NaiveDate,
    pub status: SalespersonStatus,
}

impl Salesperson {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            hired_on: row.try_get("hired_on")?,
            status: row.try_get::<String, _>("status")?.parse()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub reference: String,
    pub name: String,
    pub unit_price: Decimal,
    pub category: String,
}

impl Product {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            reference: row.try_get("reference")?,
            name: row.try_get("name")?,
            unit_price: parse_stored("unit_price", &row.try_get::<String, _>("unit_price")?)?,
            category: row.try_get("category")?,
        })
    }
}

/// One recorded sale or return. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesTransaction {
    pub id: i64,
    pub salesperson_id: i64,
    pub product_id: i64,
    pub sale_date: NaiveDate,
    pub quantity: i64,
    pub unit_value: Decimal,
    /// Negative for returns
    pub total_value: Decimal,
    pub tax: Decimal,
    pub operation_kind: OperationKind,
    pub return_reason: Option<String>,
    pub source_file: String,
}

impl SalesTransaction {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            salesperson_id: row.try_get("salesperson_id")?,
            product_id: row.try_get("product_id")?,
            sale_date: row.try_get("sale_date")?,
            quantity: row.try_get("quantity")?,
            unit_value: parse_stored("unit_value", &row.try_get::<String, _>("unit_value")?)?,
            total_value: parse_stored("total_value", &row.try_get::<String, _>("total_value")?)?,
            tax: parse_stored("tax", &row.try_get::<String, _>("tax")?)?,
            operation_kind: row.try_get::<String, _>("operation_kind")?.parse()?,
            return_reason: row.try_get("return_reason")?,
            source_file: row.try_get("source_file")?,
        })
    }
}

/// Rate and threshold configuration applied to a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRuleSet {
    pub id: i64,
    pub name: String,
    pub base_rate_pct: Decimal,
    pub bonus_rate_pct: Decimal,
    pub bonus_threshold: Decimal,
    pub penalty_rate_pct: Decimal,
    pub return_ratio_threshold: Decimal,
    pub valid_from: Period,
    pub valid_until: Option<Period>,
    pub active: bool,
}

impl CommissionRuleSet {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let valid_until: Option<String> = row.try_get("valid_until")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            base_rate_pct: parse_stored("base_rate_pct", &row.try_get::<String, _>("base_rate_pct")?)?,
            bonus_rate_pct: parse_stored("bonus_rate_pct", &row.try_get::<String, _>("bonus_rate_pct")?)?,
            bonus_threshold: parse_stored("bonus_threshold", &row.try_get::<String, _>("bonus_threshold")?)?,
            penalty_rate_pct: parse_stored(
                "penalty_rate_pct",
                &row.try_get::<String, _>("penalty_rate_pct")?,
            )?,
            return_ratio_threshold: parse_stored(
                "return_ratio_threshold",
                &row.try_get::<String, _>("return_ratio_threshold")?,
            )?,
            valid_from: stored_period("valid_from", row.try_get("valid_from")?)?,
            valid_until: valid_until
                .map(|p| stored_period("valid_until", p))
                .transpose()?,
            active: row.try_get::<i64, _>("active")? != 0,
        })
    }
}

/// Computed commission for one salesperson and period.
///
/// Unique per (salesperson_id, period). Invariants:
/// `final_amount = base_amount + bonus_amount - penalty_amount` and
/// `net_sales = gross_sales - gross_returns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub id: i64,
    pub salesperson_id: i64,
    pub rule_set_id: i64,
    pub period: Period,
    pub gross_sales: Decimal,
    pub gross_returns: Decimal,
    pub net_sales: Decimal,
    pub return_ratio_pct: Decimal,
    pub base_amount: Decimal,
    pub bonus_amount: Decimal,
    pub penalty_amount: Decimal,
    pub final_amount: Decimal,
    pub bonus_applied: bool,
    pub penalty_applied: bool,
    pub state: CommissionState,
    pub computed_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl CommissionRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let money = |column: &str| -> Result<Decimal> {
            parse_stored(column, &row.try_get::<String, _>(column)?)
        };
        Ok(Self {
            id: row.try_get("id")?,
            salesperson_id: row.try_get("salesperson_id")?,
            rule_set_id: row.try_get("rule_set_id")?,
            period: stored_period("period", row.try_get("period")?)?,
            gross_sales: money("gross_sales")?,
            gross_returns: money("gross_returns")?,
            net_sales: money("net_sales")?,
            return_ratio_pct: money("return_ratio_pct")?,
            base_amount: money("base_amount")?,
            bonus_amount: money("bonus_amount")?,
            penalty_amount: money("penalty_amount")?,
            final_amount: money("final_amount")?,
            bonus_applied: row.try_get::<i64, _>("bonus_applied")? != 0,
            penalty_applied: row.try_get::<i64, _>("penalty_applied")? != 0,
            state: row.try_get::<String, _>("state")?.parse()?,
            computed_at: parse_timestamp("computed_at", &row.try_get::<String, _>("computed_at")?)?,
            approved_at: parse_optional_timestamp("approved_at", row.try_get("approved_at")?)?,
            paid_at: parse_optional_timestamp("paid_at", row.try_get("paid_at")?)?,
            notes: row.try_get("notes")?,
        })
    }
}

/// Derived per-period dashboard cache, upserted after every batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetricsSnapshot {
    pub period: Period,
    pub total_net_sales: Decimal,
    pub total_commissions: Decimal,
    pub salesperson_count: i64,
    pub bonus_count: i64,
    pub bonus_ratio_pct: Decimal,
    pub avg_return_ratio_pct: Decimal,
    pub refreshed_at: DateTime<Utc>,
}

impl DashboardMetricsSnapshot {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            period: stored_period("period", row.try_get("period")?)?,
            total_net_sales: parse_stored(
                "total_net_sales",
                &row.try_get::<String, _>("total_net_sales")?,
            )?,
            total_commissions: parse_stored(
                "total_commissions",
                &row.try_get::<String, _>("total_commissions")?,
            )?,
            salesperson_count: row.try_get("salesperson_count")?,
            bonus_count: row.try_get("bonus_count")?,
            bonus_ratio_pct: parse_stored(
                "bonus_ratio_pct",
                &row.try_get::<String, _>("bonus_ratio_pct")?,
            )?,
            avg_return_ratio_pct: parse_stored(
                "avg_return_ratio_pct",
                &row.try_get::<String, _>("avg_return_ratio_pct")?,
            )?,
            refreshed_at: parse_timestamp("refreshed_at", &row.try_get::<String, _>("refreshed_at")?)?,
        })
    }
}

/// One ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLog {
    pub id: i64,
    pub file: String,
    pub kind: ImportKind,
    pub state: ImportState,
    pub rows_processed: i64,
    pub rows_ok: i64,
    pub rows_failed: i64,
    pub error_summary: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ImportLog {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            file: row.try_get("file")?,
            kind: row.try_get::<String, _>("kind")?.parse()?,
            state: row.try_get::<String, _>("state")?.parse()?,
            rows_processed: row.try_get("rows_processed")?,
            rows_ok: row.try_get("rows_ok")?,
            rows_failed: row.try_get("rows_failed")?,
            error_summary: row.try_get("error_summary")?,
            started_at: parse_timestamp("started_at", &row.try_get::<String, _>("started_at")?)?,
            finished_at: parse_optional_timestamp("finished_at", row.try_get("finished_at")?)?,
        })
    }
}

fn stored_period(column: &str, raw: String) -> Result<Period> {
    raw.parse()
        .map_err(|e| Error::Internal(format!("Corrupt period in column {}: {}", column, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_text_round_trip() {
        for state in [CommissionState::Calculated, CommissionState::Approved, CommissionState::Paid] {
            assert_eq!(state.as_str().parse::<CommissionState>().unwrap(), state);
        }
        assert!("pending".parse::<CommissionState>().is_err());
    }

    #[test]
    fn test_state_transitions_only_forward() {
        assert_eq!(CommissionState::Approved.required_source(), Some(CommissionState::Calculated));
        assert_eq!(CommissionState::Paid.required_source(), Some(CommissionState::Approved));
        assert_eq!(CommissionState::Calculated.required_source(), None);
        assert!(CommissionState::Calculated < CommissionState::Approved);
        assert!(CommissionState::Approved < CommissionState::Paid);
    }

    #[test]
    fn test_operation_kind_text() {
        assert_eq!(OperationKind::Return.to_string(), "return");
        assert_eq!("sale".parse::<OperationKind>().unwrap(), OperationKind::Sale);
    }

    #[test]
    fn test_import_kind_default_is_mixed() {
        assert_eq!(ImportKind::default(), ImportKind::Mixed);
        assert_eq!("returns".parse::<ImportKind>().unwrap(), ImportKind::Returns);
    }
}
