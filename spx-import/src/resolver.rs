//! Run-scoped entity resolution
//!
//! Salespeople are keyed by name and products by reference, both lowercased
//! with runs of whitespace collapsed to one space. The cache is loaded once per import run and
//! discarded with it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use spx_common::db::SalespersonStatus;
use spx_common::money::to_stored;
use spx_common::Result;
use sqlx::{Row, SqliteConnection};
use std::collections::HashMap;
use tracing::{debug, info};

/// Prefix of generated salesperson codes
pub const SALESPERSON_CODE_PREFIX: &str = "VEN";

/// Category given to products created during import
pub const DEFAULT_PRODUCT_CATEGORY: &str = "General";

/// Cache lookup key for names and references
pub fn cache_key(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// `Ana  Ruiz` → `ana.ruiz@<domain>`
pub fn synthesize_email(name: &str, domain: &str) -> String {
    let local: Vec<String> = name.split_whitespace().map(str::to_lowercase).collect();
    format!("{}@{}", local.join("."), domain)
}

pub fn salesperson_code(sequence: i64) -> String {
    format!("{}{:03}", SALESPERSON_CODE_PREFIX, sequence)
}

/// Name → id and reference → id mappings for one import run
#[derive(Debug, Default)]
pub struct EntityCache {
    salespeople: HashMap<String, i64>,
    products: HashMap<String, i64>,
    email_domain: String,
    created_salespeople: usize,
    created_products: usize,
}

impl EntityCache {
    /// Load every existing salesperson and product
    pub async fn load(conn: &mut SqliteConnection, email_domain: &str) -> Result<Self> {
        let mut cache = Self {
            email_domain: email_domain.to_string(),
            ..Default::default()
        };

        for row in sqlx::query("SELECT id, name FROM salespeople")
            .fetch_all(&mut *conn)
            .await?
        {
            let name: String = row.try_get("name")?;
            cache.salespeople.entry(cache_key(&name)).or_insert(row.try_get("id")?);
        }

        for row in sqlx::query("SELECT id, reference FROM products")
            .fetch_all(&mut *conn)
            .await?
        {
            let reference: String = row.try_get("reference")?;
            cache.products.entry(cache_key(&reference)).or_insert(row.try_get("id")?);
        }

        debug!(
            "Entity cache loaded: {} salespeople, {} products",
            cache.salespeople.len(),
            cache.products.len()
        );
        Ok(cache)
    }

    pub fn created_salespeople(&self) -> usize {
        self.created_salespeople
    }

    pub fn created_products(&self) -> usize {
        self.created_products
    }

    /// Id of the salesperson called `name`, creating it when unknown
    pub async fn resolve_salesperson(
        &mut self,
        conn: &mut SqliteConnection,
        name: &str,
        today: NaiveDate,
    ) -> Result<i64> {
        let key = cache_key(name);
        if let Some(id) = self.salespeople.get(&key) {
            return Ok(*id);
        }

        let next: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(CAST(SUBSTR(code, 4) AS INTEGER)), 0) + 1
            FROM salespeople
            WHERE code LIKE 'VEN%'
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;

        let code = salesperson_code(next);
        let name = name.trim();
        let email = synthesize_email(name, &self.email_domain);

        let id = sqlx::query(
            "INSERT INTO salespeople (code, name, email, hired_on, status) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&code)
        .bind(name)
        .bind(&email)
        .bind(today)
        .bind(SalespersonStatus::Active.as_str())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        info!("Created salesperson {} '{}' <{}>", code, name, email);
        self.salespeople.insert(key, id);
        self.created_salespeople += 1;
        Ok(id)
    }

    /// Id of the product with `reference`, creating a placeholder when unknown
    pub async fn resolve_product(
        &mut self,
        conn: &mut SqliteConnection,
        reference: &str,
        name: Option<&str>,
        unit_price: Decimal,
    ) -> Result<i64> {
        let key = cache_key(reference);
        if let Some(id) = self.products.get(&key) {
            return Ok(*id);
        }

        let reference = reference.trim();
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("Product {}", reference),
        };

        let id = sqlx::query(
            "INSERT INTO products (reference, name, unit_price, category) VALUES (?, ?, ?, ?)",
        )
        .bind(reference)
        .bind(&name)
        .bind(to_stored(unit_price.abs()))
        .bind(DEFAULT_PRODUCT_CATEGORY)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        info!("Created product {} '{}'", reference, name);
        self.products.insert(key, id);
        self.created_products += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_ignores_case_and_padding() {
        assert_eq!(cache_key("  Ana Ruiz "), cache_key("ana ruiz"));
        assert_eq!(cache_key("ANA RUIZ"), "ana ruiz");
    }

    #[test]
    fn test_cache_key_collapses_inner_whitespace() {
        assert_eq!(cache_key("Ana  Ruiz"), "ana ruiz");
        assert_eq!(cache_key("Ana\tRuiz"), cache_key("ana ruiz"));
    }

    #[test]
    fn test_synthesize_email() {
        assert_eq!(synthesize_email("Ana Ruiz", "example.com"), "ana.ruiz@example.com");
        assert_eq!(synthesize_email(" José  María Pérez ", "acme.test"), "josé.maría.pérez@acme.test");
    }

    #[test]
    fn test_salesperson_code_padding() {
        assert_eq!(salesperson_code(1), "VEN001");
        assert_eq!(salesperson_code(42), "VEN042");
        assert_eq!(salesperson_code(1234), "VEN1234");
    }
}
