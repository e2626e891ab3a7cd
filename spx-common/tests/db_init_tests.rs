//! Database initialization tests
//!
//! - New database file is created with the full schema
//! - Re-opening an existing database is idempotent
//! - Uniqueness of commission records per (salesperson, period) is enforced by the store

use spx_common::db::init::{init_database, SCHEMA_VERSION};
use tempfile::TempDir;

const TABLES: &[&str] = &[
    "schema_version",
    "salespeople",
    "products",
    "sales_transactions",
    "commission_rule_sets",
    "commission_records",
    "dashboard_metrics",
    "import_logs",
];

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("spx.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");

    let pool = pool.unwrap();
    for table in TABLES {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("spx.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(versions, vec![SCHEMA_VERSION]);
}

#[tokio::test]
async fn test_commission_record_unique_per_salesperson_period() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("spx.db")).await.unwrap();

    sqlx::query(
        "INSERT INTO salespeople (code, name, email, hired_on) VALUES ('VEN001', 'Ana', 'ana@x', '2024-01-01')",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO commission_rule_sets (name, base_rate_pct, bonus_rate_pct, bonus_threshold,
             penalty_rate_pct, return_ratio_threshold, valid_from)
         VALUES ('Plan', '5', '10', '1000000', '8', '10', '2024-01')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let insert = "INSERT INTO commission_records (salesperson_id, rule_set_id, period, gross_sales,
            gross_returns, net_sales, return_ratio_pct, base_amount, bonus_amount, penalty_amount,
            final_amount, computed_at)
        VALUES (1, 1, '2024-06', '0', '0', '0', '0', '0', '0', '0', '0', '2024-06-30T00:00:00Z')";

    sqlx::query(insert).execute(&pool).await.unwrap();
    let duplicate = sqlx::query(insert).execute(&pool).await;
    assert!(duplicate.is_err(), "duplicate (salesperson, period) must be rejected");
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("spx.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO sales_transactions (salesperson_id, product_id, sale_date, quantity,
             unit_value, total_value, operation_kind, source_file)
         VALUES (99, 99, '2024-06-01', 1, '1', '1', 'sale', 'x.csv')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "dangling salesperson/product must be rejected");
}
