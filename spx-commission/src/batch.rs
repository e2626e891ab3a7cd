//! Period batch processing
//!
//! One period run is one transaction: resolve rules, compute every active
//! salesperson, refresh the dashboard snapshot, commit. A failing salesperson
//! is recorded and skipped; a missing rule set or a storage fault rolls the
//! whole run back.

use crate::aggregator::aggregate;
use crate::calculator::{calculate, CommissionCalculation};
use crate::rules::get_active_rules;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spx_common::db::{CommissionRecord, CommissionRuleSet, CommissionState, DashboardMetricsSnapshot};
use spx_common::money::{checked_sum, ratio_pct, round_ratio, to_stored};
use spx_common::{time, Error, Period, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};

/// A salesperson whose computation failed inside an otherwise healthy run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalespersonError {
    pub salesperson_id: i64,
    pub salesperson_name: String,
    pub message: String,
}

impl std::fmt::Display for SalespersonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Salesperson {} (id {}): {}",
            self.salesperson_name, self.salesperson_id, self.message
        )
    }
}

/// Summary of a committed period run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub period: Period,
    pub rule_set_id: i64,
    /// Every active salesperson visited, including failures
    pub processed_count: usize,
    /// Records inserted or overwritten
    pub success_count: usize,
    /// Salespeople without sales in the period
    pub empty_count: usize,
    /// Salespeople whose record is already approved or paid and was left as is
    pub locked: Vec<i64>,
    pub errors: Vec<SalespersonError>,
    /// Sum of final amounts written in this run
    pub total_commissions: Decimal,
}

/// How a run ended, for callers that report status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Ok,
    PartialErrors,
}

impl BatchResult {
    fn new(period: Period, rule_set_id: i64) -> Self {
        Self {
            period,
            rule_set_id,
            processed_count: 0,
            success_count: 0,
            empty_count: 0,
            locked: Vec::new(),
            errors: Vec::new(),
            total_commissions: Decimal::ZERO,
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.errors.is_empty() {
            RunOutcome::Ok
        } else {
            RunOutcome::PartialErrors
        }
    }
}

/// Result of computing one salesperson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "record", rename_all = "snake_case")]
pub enum SalespersonOutcome {
    /// Record inserted or overwritten
    Written(CommissionRecord),
    /// Existing record already approved or paid; not modified
    Locked(CommissionRecord),
    /// No sales in the period; no record
    Empty,
}

/// Result of a recompute request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recalculation {
    Salesperson(SalespersonOutcome),
    Period(BatchResult),
}

/// Compute commissions for every active salesperson in `period`
pub async fn run_period(pool: &SqlitePool, period: Period) -> Result<BatchResult> {
    info!("Starting commission run for period {}", period);
    let mut tx = pool.begin().await?;

    match run_period_in(&mut tx, period).await {
        Ok(result) => {
            tx.commit().await?;
            info!(
                "✓ Period {} committed: {} processed, {} written, {} empty, {} locked, {} errors, total {}",
                period,
                result.processed_count,
                result.success_count,
                result.empty_count,
                result.locked.len(),
                result.errors.len(),
                result.total_commissions
            );
            Ok(result)
        }
        Err(e) => {
            error!("Commission run for {} aborted: {}", period, e);
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback after failed run also failed: {}", rollback);
            }
            Err(e)
        }
    }
}

async fn run_period_in(conn: &mut SqliteConnection, period: Period) -> Result<BatchResult> {
    let rules = get_active_rules(conn, period).await?;
    let mut result = BatchResult::new(period, rules.id);

    let salespeople = sqlx::query("SELECT id, name FROM salespeople WHERE status = 'active' ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;
    debug!("{} active salespeople for {}", salespeople.len(), period);

    for row in &salespeople {
        let salesperson_id: i64 = row.try_get("id")?;
        let salesperson_name: String = row.try_get("name")?;

        match compute_salesperson(conn, salesperson_id, period, &rules).await {
            Ok(SalespersonOutcome::Written(record)) => {
                result.success_count += 1;
                result.total_commissions =
                    checked_sum([result.total_commissions, record.final_amount])?;
            }
            Ok(SalespersonOutcome::Locked(record)) => {
                debug!(
                    "Record {} for {} is {}; left unchanged",
                    record.id, salesperson_name, record.state
                );
                result.locked.push(salesperson_id);
            }
            Ok(SalespersonOutcome::Empty) => {
                result.empty_count += 1;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let failure = SalespersonError {
                    salesperson_id,
                    salesperson_name,
                    message: e.to_string(),
                };
                warn!("{}", failure);
                result.errors.push(failure);
            }
        }

        result.processed_count += 1;
    }

    refresh_dashboard_metrics(conn, period).await?;

    Ok(result)
}

/// Recompute one salesperson, or the whole period when no id is given.
///
/// The period must be `YYYY-MM` and not later than the current month.
pub async fn recalculate(
    pool: &SqlitePool,
    period: &str,
    salesperson_id: Option<i64>,
) -> Result<Recalculation> {
    let period = Period::validate(period)?;

    let Some(salesperson_id) = salesperson_id else {
        return run_period(pool, period).await.map(Recalculation::Period);
    };

    info!("Recalculating salesperson {} for period {}", salesperson_id, period);
    let mut tx = pool.begin().await?;

    let outcome = recalculate_in(&mut tx, salesperson_id, period).await;

    match outcome {
        Ok(outcome) => {
            tx.commit().await?;
            Ok(Recalculation::Salesperson(outcome))
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback after failed recalculation also failed: {}", rollback);
            }
            Err(e)
        }
    }
}

async fn recalculate_in(
    conn: &mut SqliteConnection,
    salesperson_id: i64,
    period: Period,
) -> Result<SalespersonOutcome> {
    let rules = get_active_rules(conn, period).await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM salespeople WHERE id = ?")
        .bind(salesperson_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("salesperson {}", salesperson_id)));
    }

    compute_salesperson(conn, salesperson_id, period, &rules).await
}

/// Aggregate → calculate → upsert for one salesperson
async fn compute_salesperson(
    conn: &mut SqliteConnection,
    salesperson_id: i64,
    period: Period,
    rules: &CommissionRuleSet,
) -> Result<SalespersonOutcome> {
    let Some(aggregate) = aggregate(conn, salesperson_id, period).await? else {
        debug!("Salesperson {} has no sales in {}", salesperson_id, period);
        return Ok(SalespersonOutcome::Empty);
    };

    let calculation = calculate(&aggregate, rules)?;
    if calculation.final_amount.is_sign_negative() && !calculation.final_amount.is_zero() {
        warn!(
            "Salesperson {} has a negative commission of {} for {} (penalty {} exceeds base + bonus)",
            salesperson_id, calculation.final_amount, period, calculation.penalty_amount
        );
    }

    let written = upsert_record(conn, salesperson_id, period, rules.id, &calculation).await?;

    let row = sqlx::query("SELECT * FROM commission_records WHERE salesperson_id = ? AND period = ?")
        .bind(salesperson_id)
        .bind(period.to_string())
        .fetch_one(&mut *conn)
        .await?;
    let record = CommissionRecord::from_row(&row)?;

    if written {
        Ok(SalespersonOutcome::Written(record))
    } else {
        Ok(SalespersonOutcome::Locked(record))
    }
}

/// Insert the record, or overwrite it while it is still `calculated`.
///
/// Returns false when an approved or paid record blocked the write.
async fn upsert_record(
    conn: &mut SqliteConnection,
    salesperson_id: i64,
    period: Period,
    rule_set_id: i64,
    calc: &CommissionCalculation,
) -> Result<bool> {
    let affected = sqlx::query(
        r#"
        INSERT INTO commission_records (
            salesperson_id, rule_set_id, period,
            gross_sales, gross_returns, net_sales, return_ratio_pct,
            base_amount, bonus_amount, penalty_amount, final_amount,
            bonus_applied, penalty_applied, state, computed_at, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(salesperson_id, period) DO UPDATE SET
            rule_set_id = excluded.rule_set_id,
            gross_sales = excluded.gross_sales,
            gross_returns = excluded.gross_returns,
            net_sales = excluded.net_sales,
            return_ratio_pct = excluded.return_ratio_pct,
            base_amount = excluded.base_amount,
            bonus_amount = excluded.bonus_amount,
            penalty_amount = excluded.penalty_amount,
            final_amount = excluded.final_amount,
            bonus_applied = excluded.bonus_applied,
            penalty_applied = excluded.penalty_applied,
            computed_at = excluded.computed_at,
            notes = excluded.notes
        WHERE commission_records.state = 'calculated'
        "#,
    )
    .bind(salesperson_id)
    .bind(rule_set_id)
    .bind(period.to_string())
    .bind(to_stored(calc.gross_sales))
    .bind(to_stored(calc.gross_returns))
    .bind(to_stored(calc.net_sales))
    .bind(to_stored(calc.return_ratio_pct))
    .bind(to_stored(calc.base_amount))
    .bind(to_stored(calc.bonus_amount))
    .bind(to_stored(calc.penalty_amount))
    .bind(to_stored(calc.final_amount))
    .bind(calc.bonus_applied)
    .bind(calc.penalty_applied)
    .bind(CommissionState::Calculated.as_str())
    .bind(time::now().to_rfc3339())
    .bind(&calc.notes)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(affected > 0)
}

/// Rebuild the dashboard snapshot of `period` from its stored records
pub async fn refresh_dashboard_metrics(
    conn: &mut SqliteConnection,
    period: Period,
) -> Result<DashboardMetricsSnapshot> {
    let rows = sqlx::query("SELECT * FROM commission_records WHERE period = ?")
        .bind(period.to_string())
        .fetch_all(&mut *conn)
        .await?;
    let records = rows
        .iter()
        .map(CommissionRecord::from_row)
        .collect::<Result<Vec<_>>>()?;

    let snapshot = snapshot_from_records(period, &records)?;

    sqlx::query(
        r#"
        INSERT INTO dashboard_metrics (
            period, total_net_sales, total_commissions, salesperson_count,
            bonus_count, bonus_ratio_pct, avg_return_ratio_pct, refreshed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(period) DO UPDATE SET
            total_net_sales = excluded.total_net_sales,
            total_commissions = excluded.total_commissions,
            salesperson_count = excluded.salesperson_count,
            bonus_count = excluded.bonus_count,
            bonus_ratio_pct = excluded.bonus_ratio_pct,
            avg_return_ratio_pct = excluded.avg_return_ratio_pct,
            refreshed_at = excluded.refreshed_at
        "#,
    )
    .bind(period.to_string())
    .bind(to_stored(snapshot.total_net_sales))
    .bind(to_stored(snapshot.total_commissions))
    .bind(snapshot.salesperson_count)
    .bind(snapshot.bonus_count)
    .bind(to_stored(snapshot.bonus_ratio_pct))
    .bind(to_stored(snapshot.avg_return_ratio_pct))
    .bind(snapshot.refreshed_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    debug!(
        "Dashboard metrics for {}: {} salespeople, {} with bonus, total {}",
        period, snapshot.salesperson_count, snapshot.bonus_count, snapshot.total_commissions
    );
    Ok(snapshot)
}

fn snapshot_from_records(
    period: Period,
    records: &[CommissionRecord],
) -> Result<DashboardMetricsSnapshot> {
    let count = Decimal::from(records.len() as i64);
    let bonus_count = records.iter().filter(|r| r.bonus_applied).count() as i64;
    let ratio_sum = checked_sum(records.iter().map(|r| r.return_ratio_pct))?;
    let avg_return_ratio_pct = if records.is_empty() {
        Decimal::ZERO
    } else {
        round_ratio(ratio_sum / count)
    };

    Ok(DashboardMetricsSnapshot {
        period,
        total_net_sales: checked_sum(records.iter().map(|r| r.net_sales))?,
        total_commissions: checked_sum(records.iter().map(|r| r.final_amount))?,
        salesperson_count: records.len() as i64,
        bonus_count,
        bonus_ratio_pct: round_ratio(ratio_pct(Decimal::from(bonus_count), count)?),
        avg_return_ratio_pct,
        refreshed_at: time::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn record(salesperson_id: i64, net: &str, fin: &str, ratio: &str, bonus: bool) -> CommissionRecord {
        CommissionRecord {
            id: salesperson_id,
            salesperson_id,
            rule_set_id: 1,
            period: "2024-06".parse().unwrap(),
            gross_sales: d(net),
            gross_returns: Decimal::ZERO,
            net_sales: d(net),
            return_ratio_pct: d(ratio),
            base_amount: d(fin),
            bonus_amount: Decimal::ZERO,
            penalty_amount: Decimal::ZERO,
            final_amount: d(fin),
            bonus_applied: bonus,
            penalty_applied: false,
            state: CommissionState::Calculated,
            computed_at: time::now(),
            approved_at: None,
            paid_at: None,
            notes: None,
        }
    }

    #[test]
    fn test_snapshot_from_records() {
        let period = "2024-06".parse().unwrap();
        let records = vec![
            record(1, "1400000", "210000", "6.6667", true),
            record(2, "500000", "25000", "2", false),
            record(3, "800000", "40000", "0", false),
        ];
        let snapshot = snapshot_from_records(period, &records).unwrap();

        assert_eq!(snapshot.total_net_sales, d("2700000"));
        assert_eq!(snapshot.total_commissions, d("275000"));
        assert_eq!(snapshot.salesperson_count, 3);
        assert_eq!(snapshot.bonus_count, 1);
        assert_eq!(snapshot.bonus_ratio_pct, d("33.3333"));
        assert_eq!(snapshot.avg_return_ratio_pct, d("2.8889"));
    }

    #[test]
    fn test_snapshot_of_empty_period() {
        let snapshot = snapshot_from_records("2024-06".parse().unwrap(), &[]).unwrap();
        assert_eq!(snapshot.salesperson_count, 0);
        assert_eq!(snapshot.bonus_ratio_pct, Decimal::ZERO);
        assert_eq!(snapshot.avg_return_ratio_pct, Decimal::ZERO);
        assert_eq!(snapshot.total_commissions, Decimal::ZERO);
    }

    #[test]
    fn test_outcome_reflects_errors() {
        let mut result = BatchResult::new("2024-06".parse().unwrap(), 1);
        assert_eq!(result.outcome(), RunOutcome::Ok);
        result.errors.push(SalespersonError {
            salesperson_id: 7,
            salesperson_name: "Ana Ruiz".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(result.outcome(), RunOutcome::PartialErrors);
        assert_eq!(result.errors[0].to_string(), "Salesperson Ana Ruiz (id 7): boom");
    }
}
