//! Read accessors for the request layer
//!
//! Everything here returns plain data structures; formatting (JSON, CSV,
//! tables) belongs to the caller.

use crate::aggregator::{aggregate, SalesAggregate};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spx_common::db::{CommissionRecord, CommissionState, DashboardMetricsSnapshot};
use spx_common::money::{checked_sum, round_ratio};
use spx_common::{Error, Period, Result};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::BTreeMap;

/// Optional filters for [`list_records`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    pub period: Option<Period>,
    pub salesperson_id: Option<i64>,
    pub state: Option<CommissionState>,
}

/// A record joined with its salesperson and rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDetail {
    #[serde(flatten)]
    pub record: CommissionRecord,
    pub salesperson_code: String,
    pub salesperson_name: String,
    pub salesperson_email: String,
    pub rule_set_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub salesperson_count: i64,
    pub gross_sales: Decimal,
    pub gross_returns: Decimal,
    pub net_sales: Decimal,
    pub avg_return_ratio_pct: Decimal,
    pub base_total: Decimal,
    pub bonus_total: Decimal,
    pub penalty_total: Decimal,
    pub commission_total: Decimal,
    pub bonus_count: i64,
    pub penalty_count: i64,
    pub calculated_count: i64,
    pub approved_count: i64,
    pub paid_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSalesperson {
    /// Competition rank: ties share a rank and the next rank is skipped
    pub rank: usize,
    pub salesperson_id: i64,
    pub code: String,
    pub name: String,
    pub net_sales: Decimal,
    pub final_amount: Decimal,
    pub bonus_applied: bool,
    pub penalty_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionBucket {
    pub label: String,
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period: Period,
    pub salesperson_count: i64,
    pub gross_sales: Decimal,
    pub net_sales: Decimal,
    pub total_commissions: Decimal,
    pub avg_return_ratio_pct: Decimal,
}

/// Upper bounds (exclusive) of the distribution buckets; the last is open
const DISTRIBUTION_BUCKETS: &[(&str, Option<i64>)] = &[
    ("< 1M", Some(1_000_000)),
    ("1M - 2M", Some(2_000_000)),
    ("2M - 3M", Some(3_000_000)),
    ("3M - 5M", Some(5_000_000)),
    ("> 5M", None),
];

/// Records matching `filter`, newest period first, then by final amount
pub async fn list_records(pool: &SqlitePool, filter: &RecordFilter) -> Result<Vec<CommissionRecord>> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM commission_records WHERE 1 = 1");
    if let Some(period) = filter.period {
        builder.push(" AND period = ").push_bind(period.to_string());
    }
    if let Some(salesperson_id) = filter.salesperson_id {
        builder.push(" AND salesperson_id = ").push_bind(salesperson_id);
    }
    if let Some(state) = filter.state {
        builder.push(" AND state = ").push_bind(state.as_str());
    }
    builder.push(" ORDER BY period DESC, CAST(final_amount AS REAL) DESC, id");

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(CommissionRecord::from_row).collect()
}

/// One record with salesperson and rule-set details
pub async fn get_record(pool: &SqlitePool, id: i64) -> Result<RecordDetail> {
    let row = sqlx::query(
        r#"
        SELECT c.*,
               s.code AS salesperson_code,
               s.name AS salesperson_name,
               s.email AS salesperson_email,
               r.name AS rule_set_name
        FROM commission_records c
        INNER JOIN salespeople s ON c.salesperson_id = s.id
        INNER JOIN commission_rule_sets r ON c.rule_set_id = r.id
        WHERE c.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("commission record {}", id)))?;

    Ok(RecordDetail {
        record: CommissionRecord::from_row(&row)?,
        salesperson_code: row.try_get("salesperson_code")?,
        salesperson_name: row.try_get("salesperson_name")?,
        salesperson_email: row.try_get("salesperson_email")?,
        rule_set_name: row.try_get("rule_set_name")?,
    })
}

/// Totals and state counts over every record of a period
pub async fn period_summary(pool: &SqlitePool, period: Period) -> Result<PeriodSummary> {
    let records = records_for_period(pool, period).await?;
    let count_state = |state: CommissionState| records.iter().filter(|r| r.state == state).count() as i64;

    Ok(PeriodSummary {
        period,
        salesperson_count: records.len() as i64,
        gross_sales: checked_sum(records.iter().map(|r| r.gross_sales))?,
        gross_returns: checked_sum(records.iter().map(|r| r.gross_returns))?,
        net_sales: checked_sum(records.iter().map(|r| r.net_sales))?,
        avg_return_ratio_pct: average_ratio(&records)?,
        base_total: checked_sum(records.iter().map(|r| r.base_amount))?,
        bonus_total: checked_sum(records.iter().map(|r| r.bonus_amount))?,
        penalty_total: checked_sum(records.iter().map(|r| r.penalty_amount))?,
        commission_total: checked_sum(records.iter().map(|r| r.final_amount))?,
        bonus_count: records.iter().filter(|r| r.bonus_applied).count() as i64,
        penalty_count: records.iter().filter(|r| r.penalty_applied).count() as i64,
        calculated_count: count_state(CommissionState::Calculated),
        approved_count: count_state(CommissionState::Approved),
        paid_count: count_state(CommissionState::Paid),
    })
}

/// Salespeople of a period ranked by final commission
pub async fn top_salespeople(
    pool: &SqlitePool,
    period: Period,
    limit: usize,
) -> Result<Vec<RankedSalesperson>> {
    let rows = sqlx::query(
        r#"
        SELECT c.*, s.code AS salesperson_code, s.name AS salesperson_name
        FROM commission_records c
        INNER JOIN salespeople s ON c.salesperson_id = s.id
        WHERE c.period = ?
        "#,
    )
    .bind(period.to_string())
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        let record = CommissionRecord::from_row(row)?;
        entries.push(RankedSalesperson {
            rank: 0,
            salesperson_id: record.salesperson_id,
            code: row.try_get("salesperson_code")?,
            name: row.try_get("salesperson_name")?,
            net_sales: record.net_sales,
            final_amount: record.final_amount,
            bonus_applied: record.bonus_applied,
            penalty_applied: record.penalty_applied,
        });
    }

    entries.sort_by(|a, b| {
        b.final_amount
            .cmp(&a.final_amount)
            .then(a.salesperson_id.cmp(&b.salesperson_id))
    });
    assign_ranks(&mut entries);
    entries.truncate(limit);
    Ok(entries)
}

fn assign_ranks(entries: &mut [RankedSalesperson]) {
    let mut previous: Option<Decimal> = None;
    let mut rank = 0;
    for (index, entry) in entries.iter_mut().enumerate() {
        if previous != Some(entry.final_amount) {
            rank = index + 1;
            previous = Some(entry.final_amount);
        }
        entry.rank = rank;
    }
}

/// Non-empty commission buckets of a period, lowest bucket first
pub async fn distribution(pool: &SqlitePool, period: Period) -> Result<Vec<DistributionBucket>> {
    let records = records_for_period(pool, period).await?;
    bucketize(records.iter().map(|r| r.final_amount))
}

fn bucketize<I: IntoIterator<Item = Decimal>>(amounts: I) -> Result<Vec<DistributionBucket>> {
    let mut buckets: Vec<DistributionBucket> = DISTRIBUTION_BUCKETS
        .iter()
        .map(|(label, _)| DistributionBucket {
            label: label.to_string(),
            count: 0,
            total: Decimal::ZERO,
        })
        .collect();

    for amount in amounts {
        let index = DISTRIBUTION_BUCKETS
            .iter()
            .position(|(_, bound)| bound.map_or(true, |b| amount < Decimal::from(b)))
            .unwrap_or(DISTRIBUTION_BUCKETS.len() - 1);
        buckets[index].count += 1;
        buckets[index].total = checked_sum([buckets[index].total, amount])?;
    }

    buckets.retain(|b| b.count > 0);
    Ok(buckets)
}

/// Per-period totals for the `months` months up to and including `today`'s month
pub async fn trend(pool: &SqlitePool, months: u32, today: NaiveDate) -> Result<Vec<TrendPoint>> {
    let since = Period::of_date(today).months_back(months.max(1) - 1);
    let rows = sqlx::query("SELECT * FROM commission_records WHERE period >= ? ORDER BY period")
        .bind(since.to_string())
        .fetch_all(pool)
        .await?;

    let mut by_period: BTreeMap<Period, Vec<CommissionRecord>> = BTreeMap::new();
    for row in &rows {
        let record = CommissionRecord::from_row(row)?;
        by_period.entry(record.period).or_default().push(record);
    }

    by_period
        .into_iter()
        .map(|(period, records)| {
            Ok(TrendPoint {
                period,
                salesperson_count: records.len() as i64,
                gross_sales: checked_sum(records.iter().map(|r| r.gross_sales))?,
                net_sales: checked_sum(records.iter().map(|r| r.net_sales))?,
                total_commissions: checked_sum(records.iter().map(|r| r.final_amount))?,
                avg_return_ratio_pct: average_ratio(&records)?,
            })
        })
        .collect()
}

/// Cached dashboard snapshot of a period, if a batch has run for it
pub async fn dashboard_metrics(
    pool: &SqlitePool,
    period: Period,
) -> Result<Option<DashboardMetricsSnapshot>> {
    let row = sqlx::query("SELECT * FROM dashboard_metrics WHERE period = ?")
        .bind(period.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(DashboardMetricsSnapshot::from_row).transpose()
}

/// Live sales aggregate of one salesperson (not the stored record)
pub async fn sales_summary(
    pool: &SqlitePool,
    salesperson_id: i64,
    period: Period,
) -> Result<Option<SalesAggregate>> {
    let mut conn = pool.acquire().await?;
    aggregate(&mut conn, salesperson_id, period).await
}

async fn records_for_period(pool: &SqlitePool, period: Period) -> Result<Vec<CommissionRecord>> {
    let rows = sqlx::query("SELECT * FROM commission_records WHERE period = ?")
        .bind(period.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(CommissionRecord::from_row).collect()
}

fn average_ratio(records: &[CommissionRecord]) -> Result<Decimal> {
    if records.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let sum = checked_sum(records.iter().map(|r| r.return_ratio_pct))?;
    Ok(round_ratio(sum / Decimal::from(records.len() as i64)))
}
