//! spx-commission - commission computation and lifecycle CLI
//!
//! Every command opens the configured database, performs one operation and
//! prints its result as JSON on stdout. Logs go to stderr (or the configured
//! log file). Exit status is non-zero on any fatal error.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use spx_commission::queries::{self, RecordFilter};
use spx_commission::rules::{self, NewRuleSet};
use spx_commission::{batch, lifecycle};
use spx_common::config::{resolve_database_path, TomlConfig};
use spx_common::db::{init_database, CommissionState};
use spx_common::{logging, time, Period};
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments for spx-commission
#[derive(Parser, Debug)]
#[command(name = "spx-commission")]
#[command(about = "Sales commission computation and lifecycle")]
#[command(version)]
struct Args {
    /// SQLite database path
    #[arg(short, long, env = "SPX_DATABASE")]
    database: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "SPX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute commissions for every active salesperson of a period
    Run { period: String },
    /// Recompute a period, or a single salesperson within it
    Recalc {
        period: String,
        #[arg(long)]
        salesperson: Option<i64>,
    },
    /// Approve calculated records
    Approve {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Approve every calculated record of a period
    ApprovePeriod { period: Period },
    /// Mark approved records paid
    Pay {
        #[arg(required = true)]
        ids: Vec<i64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List commission records
    Records {
        #[arg(long)]
        period: Option<Period>,
        #[arg(long)]
        salesperson: Option<i64>,
        #[arg(long)]
        state: Option<CommissionState>,
    },
    /// Show one record with salesperson details
    Show { id: i64 },
    /// Totals and state counts of a period
    Summary { period: Period },
    /// Salespeople ranked by commission
    Top {
        period: Period,
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Commission distribution buckets of a period
    Distribution { period: Period },
    /// Per-period totals for recent months
    Trend {
        #[arg(long, default_value = "6")]
        months: u32,
    },
    /// Cached dashboard metrics of a period
    Metrics { period: Period },
    /// Live sales aggregate of a salesperson
    Sales { salesperson: i64, period: Period },
    /// Rule-set administration
    #[command(subcommand)]
    Rules(RulesCommand),
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// List all rule sets
    List,
    /// Add an active rule set
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        base_rate: Decimal,
        #[arg(long)]
        bonus_rate: Decimal,
        #[arg(long)]
        bonus_threshold: Decimal,
        #[arg(long)]
        penalty_rate: Decimal,
        #[arg(long)]
        return_threshold: Decimal,
        #[arg(long)]
        valid_from: Period,
        #[arg(long)]
        valid_until: Option<Period>,
    },
    /// Stop selecting a rule set
    Deactivate { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load(args.config.as_deref());
    logging::init_tracing(&config.logging)?;

    info!("Starting spx-commission v{}", env!("CARGO_PKG_VERSION"));

    let db_path = resolve_database_path(args.database.as_deref(), &config);
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match args.command {
        Command::Run { period } => {
            let period = Period::validate(&period)?;
            print_json(&batch::run_period(&pool, period).await?)?;
        }
        Command::Recalc { period, salesperson } => {
            print_json(&batch::recalculate(&pool, &period, salesperson).await?)?;
        }
        Command::Approve { ids } => {
            let moved = lifecycle::approve(&pool, &ids).await?;
            print_json(&serde_json::json!({ "approved": moved }))?;
        }
        Command::ApprovePeriod { period } => {
            let moved = lifecycle::approve_period(&pool, period).await?;
            print_json(&serde_json::json!({ "approved": moved }))?;
        }
        Command::Pay { ids, notes } => {
            let moved = lifecycle::pay(&pool, &ids, notes.as_deref()).await?;
            print_json(&serde_json::json!({ "paid": moved }))?;
        }
        Command::Records {
            period,
            salesperson,
            state,
        } => {
            let filter = RecordFilter {
                period,
                salesperson_id: salesperson,
                state,
            };
            print_json(&queries::list_records(&pool, &filter).await?)?;
        }
        Command::Show { id } => print_json(&queries::get_record(&pool, id).await?)?,
        Command::Summary { period } => print_json(&queries::period_summary(&pool, period).await?)?,
        Command::Top { period, limit } => {
            print_json(&queries::top_salespeople(&pool, period, limit).await?)?
        }
        Command::Distribution { period } => {
            print_json(&queries::distribution(&pool, period).await?)?
        }
        Command::Trend { months } => {
            print_json(&queries::trend(&pool, months, time::today()).await?)?
        }
        Command::Metrics { period } => {
            print_json(&queries::dashboard_metrics(&pool, period).await?)?
        }
        Command::Sales {
            salesperson,
            period,
        } => print_json(&queries::sales_summary(&pool, salesperson, period).await?)?,
        Command::Rules(RulesCommand::List) => print_json(&rules::list_rule_sets(&pool).await?)?,
        Command::Rules(RulesCommand::Add {
            name,
            base_rate,
            bonus_rate,
            bonus_threshold,
            penalty_rate,
            return_threshold,
            valid_from,
            valid_until,
        }) => {
            let new = NewRuleSet {
                name,
                base_rate_pct: base_rate,
                bonus_rate_pct: bonus_rate,
                bonus_threshold,
                penalty_rate_pct: penalty_rate,
                return_ratio_threshold: return_threshold,
                valid_from,
                valid_until,
            };
            print_json(&rules::create_rule_set(&pool, &new).await?)?;
        }
        Command::Rules(RulesCommand::Deactivate { id }) => {
            rules::deactivate_rule_set(&pool, id).await?;
            print_json(&serde_json::json!({ "deactivated": id }))?;
        }
    }

    pool.close().await;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
