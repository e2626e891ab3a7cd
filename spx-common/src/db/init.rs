//! Database initialization
//!
//! Opens (or creates) the SQLite store and makes sure every table exists.
//! All statements are idempotent so every tool can run this at startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Schema version written by this build
pub const SCHEMA_VERSION: i64 = 1;

const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas go on the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_salespeople_table(pool).await?;
    create_products_table(pool).await?;
    create_sales_transactions_table(pool).await?;
    create_commission_rule_sets_table(pool).await?;
    create_commission_records_table(pool).await?;
    create_dashboard_metrics_table(pool).await?;
    create_import_logs_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_salespeople_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS salespeople (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            hired_on TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'inactive'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_products_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reference TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            unit_price TEXT NOT NULL DEFAULT '0',
            category TEXT NOT NULL DEFAULT 'General'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sales_transactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sales_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            salesperson_id INTEGER NOT NULL REFERENCES salespeople(id),
            product_id INTEGER NOT NULL REFERENCES products(id),
            sale_date TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            unit_value TEXT NOT NULL,
            total_value TEXT NOT NULL,
            tax TEXT NOT NULL DEFAULT '0',
            operation_kind TEXT NOT NULL CHECK (operation_kind IN ('sale', 'return')),
            return_reason TEXT,
            source_file TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sales_transactions_salesperson_date
         ON sales_transactions (salesperson_id, sale_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_commission_rule_sets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commission_rule_sets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            base_rate_pct TEXT NOT NULL,
            bonus_rate_pct TEXT NOT NULL,
            bonus_threshold TEXT NOT NULL,
            penalty_rate_pct TEXT NOT NULL,
            return_ratio_threshold TEXT NOT NULL,
            valid_from TEXT NOT NULL,
            valid_until TEXT,
            active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_commission_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commission_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            salesperson_id INTEGER NOT NULL REFERENCES salespeople(id),
            rule_set_id INTEGER NOT NULL REFERENCES commission_rule_sets(id),
            period TEXT NOT NULL,
            gross_sales TEXT NOT NULL,
            gross_returns TEXT NOT NULL,
            net_sales TEXT NOT NULL,
            return_ratio_pct TEXT NOT NULL,
            base_amount TEXT NOT NULL,
            bonus_amount TEXT NOT NULL,
            penalty_amount TEXT NOT NULL,
            final_amount TEXT NOT NULL,
            bonus_applied INTEGER NOT NULL DEFAULT 0,
            penalty_applied INTEGER NOT NULL DEFAULT 0,
            state TEXT NOT NULL DEFAULT 'calculated'
                CHECK (state IN ('calculated', 'approved', 'paid')),
            computed_at TEXT NOT NULL,
            approved_at TEXT,
            paid_at TEXT,
            notes TEXT,
            UNIQUE (salesperson_id, period)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_dashboard_metrics_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dashboard_metrics (
            period TEXT PRIMARY KEY,
            total_net_sales TEXT NOT NULL,
            total_commissions TEXT NOT NULL,
            salesperson_count INTEGER NOT NULL,
            bonus_count INTEGER NOT NULL,
            bonus_ratio_pct TEXT NOT NULL,
            avg_return_ratio_pct TEXT NOT NULL,
            refreshed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_import_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file TEXT NOT NULL,
            kind TEXT NOT NULL,
            state TEXT NOT NULL CHECK (state IN ('processing', 'completed', 'error')),
            rows_processed INTEGER NOT NULL DEFAULT 0,
            rows_ok INTEGER NOT NULL DEFAULT 0,
            rows_failed INTEGER NOT NULL DEFAULT 0,
            error_summary TEXT,
            started_at TEXT NOT NULL,
            finished_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
