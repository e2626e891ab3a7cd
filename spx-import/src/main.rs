//! spx-import - delimited sales file importer
//!
//! Loads one file into the transaction store and prints a run summary.
//! Exits non-zero when the run aborts; rows rejected individually do not
//! change the exit status.

use anyhow::{Context, Result};
use clap::Parser;
use spx_common::config::{resolve_database_path, TomlConfig};
use spx_common::db::{init_database, ImportKind};
use spx_common::logging;
use spx_import::{import_file, ImportReport};
use std::path::PathBuf;
use tracing::info;

/// Errors listed in the summary before collapsing the rest
const SUMMARY_ERROR_COUNT: usize = 5;

/// Command-line arguments for spx-import
#[derive(Parser, Debug)]
#[command(name = "spx-import")]
#[command(about = "Import sales and returns from a delimited file")]
#[command(version)]
struct Args {
    /// File to import (comma, semicolon, tab or pipe delimited)
    file: PathBuf,

    /// Run kind recorded in the import log: sales, returns or mixed
    #[arg(short, long, default_value = "mixed")]
    kind: ImportKind,

    /// SQLite database path
    #[arg(short, long, env = "SPX_DATABASE")]
    database: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "SPX_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load(args.config.as_deref());
    logging::init_tracing(&config.logging)?;

    info!("Starting spx-import v{}", env!("CARGO_PKG_VERSION"));

    let db_path = resolve_database_path(args.database.as_deref(), &config);
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let report = import_file(&pool, &args.file, args.kind, &config.import)
        .await
        .with_context(|| format!("Import of {} failed", args.file.display()))?;
    print_summary(&report);

    pool.close().await;
    Ok(())
}

fn print_summary(report: &ImportReport) {
    let rule = "=".repeat(60);
    println!("{}", rule);
    println!("IMPORT SUMMARY");
    println!("{}", rule);
    println!("File:                 {}", report.file);
    println!("Kind:                 {}", report.kind);
    println!("Rows processed:       {}", report.processed);
    println!("Rows imported:        {}", report.ok);
    println!("Rows failed:          {}", report.failed);
    if report.failed > 0 {
        println!("Success rate:         {}%", report.success_pct());
    }
    if report.created_salespeople > 0 || report.created_products > 0 {
        println!(
            "Created:              {} salespeople, {} products",
            report.created_salespeople, report.created_products
        );
    }

    if !report.errors.is_empty() {
        println!();
        println!("First errors:");
        for error in report.errors.iter().take(SUMMARY_ERROR_COUNT) {
            println!("  - {}", error);
        }
        if report.errors.len() > SUMMARY_ERROR_COUNT {
            println!("  ... and {} more", report.errors.len() - SUMMARY_ERROR_COUNT);
        }
    }
    println!("{}", rule);
}
