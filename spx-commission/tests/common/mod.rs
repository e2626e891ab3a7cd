//! Shared fixtures for commission integration tests

#![allow(dead_code)]

use rust_decimal::Decimal;
use spx_commission::rules::{create_rule_set, NewRuleSet};
use spx_common::db::init::init_database;
use spx_common::Period;
use sqlx::SqlitePool;
use std::str::FromStr;
use tempfile::TempDir;

pub const PERIOD: &str = "2024-06";

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn period() -> Period {
    PERIOD.parse().unwrap()
}

/// Fresh database in a temporary directory. Keep the `TempDir` alive for the test.
pub async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("spx.db")).await.unwrap();
    (dir, pool)
}

/// 5% base, 10% bonus over 1,000,000 net, 8% penalty over a 10% return ratio
pub async fn standard_rules(pool: &SqlitePool) -> i64 {
    create_rule_set(
        pool,
        &NewRuleSet {
            name: "Standard".to_string(),
            base_rate_pct: d("5"),
            bonus_rate_pct: d("10"),
            bonus_threshold: d("1000000"),
            penalty_rate_pct: d("8"),
            return_ratio_threshold: d("10"),
            valid_from: "2024-01".parse().unwrap(),
            valid_until: None,
        },
    )
    .await
    .unwrap()
    .id
}

pub async fn add_salesperson(pool: &SqlitePool, code: &str, name: &str) -> i64 {
    sqlx::query(
        "INSERT INTO salespeople (code, name, email, hired_on, status) VALUES (?, ?, ?, '2023-01-01', 'active')",
    )
    .bind(code)
    .bind(name)
    .bind(format!("{}@example.com", code.to_lowercase()))
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn add_product(pool: &SqlitePool, reference: &str) -> i64 {
    sqlx::query("INSERT INTO products (reference, name, unit_price) VALUES (?, ?, '0')")
        .bind(reference)
        .bind(format!("Product {}", reference))
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

/// Store a transaction with a raw total; returns carry a negative total
pub async fn add_transaction(
    pool: &SqlitePool,
    salesperson_id: i64,
    product_id: i64,
    date: &str,
    kind: &str,
    total: &str,
) {
    sqlx::query(
        r#"
        INSERT INTO sales_transactions (
            salesperson_id, product_id, sale_date, quantity, unit_value,
            total_value, tax, operation_kind, source_file
        ) VALUES (?, ?, ?, 1, ?, ?, '0', ?, 'fixture.csv')
        "#,
    )
    .bind(salesperson_id)
    .bind(product_id)
    .bind(date)
    .bind(total.trim_start_matches('-'))
    .bind(total)
    .bind(kind)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
