//! Commission record lifecycle: calculated → approved → paid
//!
//! Each id is transitioned independently. Ids not in the required source
//! state are skipped silently; callers get the number actually moved.

use spx_common::db::CommissionState;
use spx_common::{time, Error, Period, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Approve `calculated` records. Stamps `approved_at`.
pub async fn approve(pool: &SqlitePool, ids: &[i64]) -> Result<u64> {
    require_ids(ids)?;
    let target = CommissionState::Approved;
    let source = source_of(target)?;
    let mut tx = pool.begin().await?;
    let stamp = time::now().to_rfc3339();
    let mut moved = 0;

    for id in ids {
        let affected = sqlx::query(
            "UPDATE commission_records SET state = ?, approved_at = ? WHERE id = ? AND state = ?",
        )
        .bind(target.as_str())
        .bind(&stamp)
        .bind(id)
        .bind(source.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            debug!("Record {} not in {} state; approval skipped", id, source);
        }
        moved += affected;
    }

    tx.commit().await?;
    info!("Approved {} of {} commission records", moved, ids.len());
    Ok(moved)
}

/// Approve every `calculated` record of a period
pub async fn approve_period(pool: &SqlitePool, period: Period) -> Result<u64> {
    let target = CommissionState::Approved;
    let source = source_of(target)?;
    let moved = sqlx::query(
        "UPDATE commission_records SET state = ?, approved_at = ? WHERE period = ? AND state = ?",
    )
    .bind(target.as_str())
    .bind(time::now().to_rfc3339())
    .bind(period.to_string())
    .bind(source.as_str())
    .execute(pool)
    .await?
    .rows_affected();

    info!("Approved {} commission records for period {}", moved, period);
    Ok(moved)
}

/// Mark `approved` records paid. Stamps `paid_at`; `notes`, when given,
/// replace the record's notes.
pub async fn pay(pool: &SqlitePool, ids: &[i64], notes: Option<&str>) -> Result<u64> {
    require_ids(ids)?;
    let target = CommissionState::Paid;
    let source = source_of(target)?;
    let mut tx = pool.begin().await?;
    let stamp = time::now().to_rfc3339();
    let mut moved = 0;

    for id in ids {
        let affected = sqlx::query(
            r#"
            UPDATE commission_records
            SET state = ?, paid_at = ?, notes = COALESCE(?, notes)
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(target.as_str())
        .bind(&stamp)
        .bind(notes)
        .bind(id)
        .bind(source.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            debug!("Record {} not in {} state; payment skipped", id, source);
        }
        moved += affected;
    }

    tx.commit().await?;
    info!("Marked {} of {} commission records paid", moved, ids.len());
    Ok(moved)
}

fn source_of(target: CommissionState) -> Result<CommissionState> {
    target
        .required_source()
        .ok_or_else(|| Error::Internal(format!("No transition leads to {}", target)))
}

fn require_ids(ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        return Err(Error::InvalidInput("No commission record ids given".to_string()));
    }
    Ok(())
}
