//! # SPX Common Library
//!
//! Shared code for the SPX commission tools including:
//! - Database bootstrap, schema and row models
//! - Error taxonomy shared by the commission engine and the importer
//! - Configuration loading and logging bootstrap
//! - Period (`YYYY-MM`) and exact money helpers

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod money;
pub mod period;
pub mod time;

pub use error::{Error, Result};
pub use period::Period;
