//! Sales aggregation per (salesperson, period)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spx_common::db::OperationKind;
use spx_common::money::{checked_sum, parse_stored, ratio_pct, round_ratio};
use spx_common::{Error, Period, Result};
use sqlx::{Row, SqliteConnection};

/// Period totals for one salesperson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesAggregate {
    pub gross_sales: Decimal,
    /// Sum of absolute return values
    pub gross_returns: Decimal,
    pub net_sales: Decimal,
    /// `gross_returns / gross_sales * 100`, rounded to 4 places
    pub return_ratio_pct: Decimal,
    pub sale_count: i64,
    pub return_count: i64,
}

/// Fold signed transaction totals into an aggregate.
///
/// Returns `None` when there is no sale among the transactions. Totals too
/// large for `Decimal` are an `Internal` error.
pub fn aggregate_transactions<I>(transactions: I) -> Result<Option<SalesAggregate>>
where
    I: IntoIterator<Item = (OperationKind, Decimal)>,
{
    let mut gross_sales = Decimal::ZERO;
    let mut gross_returns = Decimal::ZERO;
    let mut sale_count = 0i64;
    let mut return_count = 0i64;

    for (kind, total) in transactions {
        match kind {
            OperationKind::Sale => {
                gross_sales = checked_sum([gross_sales, total])?;
                sale_count += 1;
            }
            OperationKind::Return => {
                gross_returns = checked_sum([gross_returns, total.abs()])?;
                return_count += 1;
            }
        }
    }

    if sale_count == 0 {
        return Ok(None);
    }

    Ok(Some(SalesAggregate {
        gross_sales,
        gross_returns,
        net_sales: checked_sum([gross_sales, -gross_returns])?,
        return_ratio_pct: round_ratio(ratio_pct(gross_returns, gross_sales)?),
        sale_count,
        return_count,
    }))
}

/// Aggregate stored transactions of a salesperson within a period
pub async fn aggregate(
    conn: &mut SqliteConnection,
    salesperson_id: i64,
    period: Period,
) -> Result<Option<SalesAggregate>> {
    let rows = sqlx::query(
        r#"
        SELECT id, operation_kind, total_value
        FROM sales_transactions
        WHERE salesperson_id = ?
          AND sale_date >= ?
          AND sale_date < ?
        "#,
    )
    .bind(salesperson_id)
    .bind(period.first_day())
    .bind(period.end_exclusive())
    .fetch_all(&mut *conn)
    .await?;

    let mut transactions = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: i64 = row.try_get("id")?;
        let kind: OperationKind = row
            .try_get::<String, _>("operation_kind")?
            .parse()
            .map_err(|e| Error::Internal(format!("Transaction {}: {}", id, e)))?;
        let total = parse_stored("total_value", &row.try_get::<String, _>("total_value")?)
            .map_err(|e| Error::Internal(format!("Transaction {}: {}", id, e)))?;
        transactions.push((kind, total));
    }

    aggregate_transactions(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_sales_and_returns_split() {
        let agg = aggregate_transactions(vec![
            (OperationKind::Sale, d("1000000")),
            (OperationKind::Sale, d("500000")),
            (OperationKind::Return, d("-100000")),
        ])
        .unwrap()
        .unwrap();

        assert_eq!(agg.gross_sales, d("1500000"));
        assert_eq!(agg.gross_returns, d("100000"));
        assert_eq!(agg.net_sales, d("1400000"));
        assert_eq!(agg.return_ratio_pct, d("6.6667"));
        assert_eq!(agg.sale_count, 2);
        assert_eq!(agg.return_count, 1);
    }

    #[test]
    fn test_empty_without_sales() {
        assert!(aggregate_transactions(Vec::new()).unwrap().is_none());
        assert!(aggregate_transactions(vec![(OperationKind::Return, d("-50"))])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_zero_gross_sales_gives_zero_ratio() {
        let agg = aggregate_transactions(vec![
            (OperationKind::Sale, Decimal::ZERO),
            (OperationKind::Return, d("-10")),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(agg.return_ratio_pct, Decimal::ZERO);
        assert_eq!(agg.net_sales, d("-10"));
    }

    #[test]
    fn test_positive_return_values_still_count_as_returns() {
        let agg = aggregate_transactions(vec![
            (OperationKind::Sale, d("200")),
            (OperationKind::Return, d("20")),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(agg.gross_returns, d("20"));
        assert_eq!(agg.net_sales, d("180"));
    }

    #[test]
    fn test_overflowing_totals_are_an_error() {
        let huge = d("50000000000000000000000000000");
        let err = aggregate_transactions(vec![
            (OperationKind::Sale, huge),
            (OperationKind::Sale, huge),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert!(!err.is_fatal());
    }
}
