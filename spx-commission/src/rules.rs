//! Commission rule sets
//!
//! A period is computed against exactly one active rule set. There is no
//! implicit default: a period without rules fails with `RulesMissing`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spx_common::db::CommissionRuleSet;
use spx_common::money::to_stored;
use spx_common::{Error, Period, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

/// Input for creating a rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRuleSet {
    pub name: String,
    pub base_rate_pct: Decimal,
    pub bonus_rate_pct: Decimal,
    pub bonus_threshold: Decimal,
    pub penalty_rate_pct: Decimal,
    pub return_ratio_threshold: Decimal,
    pub valid_from: Period,
    pub valid_until: Option<Period>,
}

impl NewRuleSet {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Rule set name is empty".to_string()));
        }
        let fields = [
            ("base_rate_pct", self.base_rate_pct),
            ("bonus_rate_pct", self.bonus_rate_pct),
            ("bonus_threshold", self.bonus_threshold),
            ("penalty_rate_pct", self.penalty_rate_pct),
            ("return_ratio_threshold", self.return_ratio_threshold),
        ];
        for (field, value) in fields {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(Error::InvalidInput(format!(
                    "{} must not be negative, got {}",
                    field, value
                )));
            }
        }
        if let Some(until) = self.valid_until {
            if until < self.valid_from {
                return Err(Error::InvalidInput(format!(
                    "valid_until {} precedes valid_from {}",
                    until, self.valid_from
                )));
            }
        }
        Ok(())
    }
}

/// Resolve the rule set covering `period`.
///
/// Picks the active set whose validity window contains the period, preferring
/// the latest `valid_from` and then the newest id.
pub async fn get_active_rules(
    conn: &mut SqliteConnection,
    period: Period,
) -> Result<CommissionRuleSet> {
    let period_text = period.to_string();
    let row = sqlx::query(
        r#"
        SELECT * FROM commission_rule_sets
        WHERE active = 1
          AND valid_from <= ?
          AND (valid_until IS NULL OR valid_until >= ?)
        ORDER BY valid_from DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(&period_text)
    .bind(&period_text)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let rules = CommissionRuleSet::from_row(&row)?;
            debug!("Period {} uses rule set {} ({})", period, rules.id, rules.name);
            Ok(rules)
        }
        None => Err(Error::RulesMissing(period)),
    }
}

/// Store a new active rule set
pub async fn create_rule_set(pool: &SqlitePool, new: &NewRuleSet) -> Result<CommissionRuleSet> {
    new.validate()?;

    let id = sqlx::query(
        r#"
        INSERT INTO commission_rule_sets (
            name, base_rate_pct, bonus_rate_pct, bonus_threshold,
            penalty_rate_pct, return_ratio_threshold, valid_from, valid_until, active
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(new.name.trim())
    .bind(to_stored(new.base_rate_pct))
    .bind(to_stored(new.bonus_rate_pct))
    .bind(to_stored(new.bonus_threshold))
    .bind(to_stored(new.penalty_rate_pct))
    .bind(to_stored(new.return_ratio_threshold))
    .bind(new.valid_from.to_string())
    .bind(new.valid_until.map(|p| p.to_string()))
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!("Created rule set {} '{}' valid from {}", id, new.name, new.valid_from);

    let row = sqlx::query("SELECT * FROM commission_rule_sets WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    CommissionRuleSet::from_row(&row)
}

/// Mark a rule set inactive so it is no longer selected
pub async fn deactivate_rule_set(pool: &SqlitePool, id: i64) -> Result<()> {
    let affected = sqlx::query("UPDATE commission_rule_sets SET active = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(Error::NotFound(format!("rule set {}", id)));
    }
    info!("Deactivated rule set {}", id);
    Ok(())
}

/// All rule sets, newest validity first
pub async fn list_rule_sets(pool: &SqlitePool) -> Result<Vec<CommissionRuleSet>> {
    let rows = sqlx::query("SELECT * FROM commission_rule_sets ORDER BY valid_from DESC, id DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(CommissionRuleSet::from_row).collect()
}
