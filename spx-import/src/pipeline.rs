//! Import run
//!
//! An import reads the whole file, logs the run as `processing`, then inserts
//! every valid row inside one transaction. Invalid rows are counted and
//! reported by line number; a storage fault rolls everything back and marks
//! the run `error`.

use crate::parse::normalize;
use crate::resolver::EntityCache;
use crate::schema::HeaderSchema;
use crate::sniff::detect_delimiter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spx_common::config::ImportConfig;
use spx_common::db::{ImportKind, ImportState};
use spx_common::money::{ratio_pct, round_money, to_stored};
use spx_common::{time, Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// A data row that could not be imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based line in the file; the header is line 1
    pub line: u64,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    Ok,
    PartialErrors,
}

/// Summary of a committed import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub log_id: i64,
    pub file: String,
    pub kind: ImportKind,
    /// Non-blank data rows seen
    pub processed: usize,
    pub ok: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
    pub created_salespeople: usize,
    pub created_products: usize,
}

impl ImportReport {
    pub fn outcome(&self) -> ImportOutcome {
        if self.failed == 0 {
            ImportOutcome::Ok
        } else {
            ImportOutcome::PartialErrors
        }
    }

    /// Share of processed rows imported, as a percentage with 2 decimals
    pub fn success_pct(&self) -> Decimal {
        ratio_pct(Decimal::from(self.ok), Decimal::from(self.processed))
            .map(round_money)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct RunStats {
    processed: usize,
    ok: usize,
    failed: usize,
    errors: Vec<RowError>,
    created_salespeople: usize,
    created_products: usize,
}

/// Import the delimited file at `path`
pub async fn import_file(
    pool: &SqlitePool,
    path: &Path,
    kind: ImportKind,
    config: &ImportConfig,
) -> Result<ImportReport> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        Error::NotFound(format!("Cannot read import file {}: {}", path.display(), e))
    })?;
    let file = path.display().to_string();
    let source_file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.clone());

    info!("Starting {} import of {}", kind, file);
    let log_id = start_log(pool, &file, kind).await?;

    let mut stats = RunStats::default();
    match run_import(pool, &data, &source_file, config, &mut stats).await {
        Ok(()) => {
            let state = if stats.failed == 0 {
                ImportState::Completed
            } else {
                ImportState::Error
            };
            if let Err(log_err) =
                finish_log(pool, log_id, state, &stats, None, config.error_log_limit).await
            {
                warn!("Import {} committed but its log was not finalized: {}", log_id, log_err);
            }

            info!(
                "✓ Import of {} committed: {} processed, {} ok, {} failed",
                file, stats.processed, stats.ok, stats.failed
            );
            Ok(ImportReport {
                log_id,
                file,
                kind,
                processed: stats.processed,
                ok: stats.ok,
                failed: stats.failed,
                errors: stats.errors,
                created_salespeople: stats.created_salespeople,
                created_products: stats.created_products,
            })
        }
        Err(e) => {
            error!("Import of {} aborted: {}", file, e);
            let fatal = e.to_string();
            if let Err(log_err) = finish_log(
                pool,
                log_id,
                ImportState::Error,
                &stats,
                Some(&fatal),
                config.error_log_limit,
            )
            .await
            {
                warn!("Failed to record aborted import {}: {}", log_id, log_err);
            }
            Err(e)
        }
    }
}

async fn run_import(
    pool: &SqlitePool,
    data: &[u8],
    source_file: &str,
    config: &ImportConfig,
    stats: &mut RunStats,
) -> Result<()> {
    let first_line = data.split(|b| *b == b'\n').next().unwrap_or_default();
    let delimiter = detect_delimiter(&String::from_utf8_lossy(first_line));
    debug!("Detected delimiter {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut record = csv::ByteRecord::new();
    if !reader.read_byte_record(&mut record).map_err(malformed)? {
        return Err(Error::InvalidInput("File has no header row".to_string()));
    }
    let schema = HeaderSchema::from_headers(&lossy_fields(&record));
    info!("Columns detected: {} ({} unknown)", schema.width(), schema.unknown_headers().len());
    for header in schema.unknown_headers() {
        debug!("Ignoring column '{}'", header);
    }

    let mut tx = pool.begin().await?;
    match import_rows(&mut tx, &mut reader, &schema, source_file, config, stats).await {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback after failed import also failed: {}", rollback);
            }
            Err(e)
        }
    }
}

async fn import_rows(
    conn: &mut SqliteConnection,
    reader: &mut csv::Reader<&[u8]>,
    schema: &HeaderSchema,
    source_file: &str,
    config: &ImportConfig,
    stats: &mut RunStats,
) -> Result<()> {
    let mut cache = EntityCache::load(conn, &config.email_domain).await?;
    let today = time::today();
    let progress_interval = config.progress_interval.max(1);
    let mut record = csv::ByteRecord::new();

    while reader.read_byte_record(&mut record).map_err(malformed)? {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let fields = lossy_fields(&record);
        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        stats.processed += 1;

        match import_row(conn, &mut cache, schema, &fields, source_file, today).await {
            Ok(()) => {
                stats.ok += 1;
                if stats.ok % progress_interval == 0 {
                    info!("  ✓ Imported {} rows", stats.ok);
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let failure = RowError {
                    line,
                    message: row_message(e),
                };
                warn!("{}", failure);
                stats.failed += 1;
                stats.errors.push(failure);
            }
        }
    }

    stats.created_salespeople = cache.created_salespeople();
    stats.created_products = cache.created_products();
    Ok(())
}

async fn import_row(
    conn: &mut SqliteConnection,
    cache: &mut EntityCache,
    schema: &HeaderSchema,
    fields: &[String],
    source_file: &str,
    today: chrono::NaiveDate,
) -> Result<()> {
    let row = normalize(schema.decode(fields)?, today)?;

    let salesperson_id = cache
        .resolve_salesperson(conn, &row.salesperson_name, today)
        .await?;
    let product_id = cache
        .resolve_product(conn, &row.reference, row.product_name.as_deref(), row.unit_value)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO sales_transactions (
            salesperson_id, product_id, sale_date, quantity, unit_value,
            total_value, tax, operation_kind, return_reason, source_file
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(salesperson_id)
    .bind(product_id)
    .bind(row.date)
    .bind(row.quantity)
    .bind(to_stored(row.unit_value))
    .bind(to_stored(row.total_value))
    .bind(to_stored(row.tax))
    .bind(row.kind.as_str())
    .bind(&row.return_reason)
    .bind(source_file)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn start_log(pool: &SqlitePool, file: &str, kind: ImportKind) -> Result<i64> {
    let id = sqlx::query(
        "INSERT INTO import_logs (file, kind, state, started_at) VALUES (?, ?, ?, ?)",
    )
    .bind(file)
    .bind(kind.as_str())
    .bind(ImportState::Processing.as_str())
    .bind(time::now().to_rfc3339())
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

async fn finish_log(
    pool: &SqlitePool,
    log_id: i64,
    state: ImportState,
    stats: &RunStats,
    fatal: Option<&str>,
    error_log_limit: usize,
) -> Result<()> {
    let summary = error_summary(&stats.errors, fatal, error_log_limit);
    sqlx::query(
        r#"
        UPDATE import_logs
        SET state = ?, rows_processed = ?, rows_ok = ?, rows_failed = ?,
            error_summary = ?, finished_at = ?
        WHERE id = ?
        "#,
    )
    .bind(state.as_str())
    .bind(stats.processed as i64)
    .bind(stats.ok as i64)
    .bind(stats.failed as i64)
    .bind(summary)
    .bind(time::now().to_rfc3339())
    .bind(log_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Newline-joined row errors, capped at `limit`, with the fatal cause last
fn error_summary(errors: &[RowError], fatal: Option<&str>, limit: usize) -> Option<String> {
    let mut lines: Vec<String> = errors.iter().take(limit).map(ToString::to_string).collect();
    if let Some(fatal) = fatal {
        lines.push(format!("Fatal: {}", fatal));
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn row_message(e: Error) -> String {
    match e {
        Error::InvalidInput(message) => message,
        other => other.to_string(),
    }
}

fn lossy_fields(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

fn malformed(e: csv::Error) -> Error {
    Error::InvalidInput(format!("Malformed delimited data: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(n: u64) -> Vec<RowError> {
        (1..=n)
            .map(|i| RowError {
                line: i + 1,
                message: "Missing product reference".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_error_summary_truncates() {
        let summary = error_summary(&errors(5), None, 3).unwrap();
        assert_eq!(summary.lines().count(), 3);
        assert_eq!(summary.lines().next(), Some("Line 2: Missing product reference"));
    }

    #[test]
    fn test_error_summary_appends_fatal() {
        let summary = error_summary(&errors(1), Some("disk full"), 100).unwrap();
        assert_eq!(summary, "Line 2: Missing product reference\nFatal: disk full");
        assert_eq!(error_summary(&[], None, 100), None);
    }

    #[test]
    fn test_report_percentages() {
        let report = ImportReport {
            log_id: 1,
            file: "june.csv".to_string(),
            kind: ImportKind::Mixed,
            processed: 3,
            ok: 2,
            failed: 1,
            errors: errors(1),
            created_salespeople: 0,
            created_products: 0,
        };
        assert_eq!(report.outcome(), ImportOutcome::PartialErrors);
        assert_eq!(report.success_pct(), Decimal::new(6667, 2));
    }
}
