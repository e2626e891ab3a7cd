//! spx-import library
//!
//! Loads delimited sales files into the transaction store:
//! - [`sniff`]: delimiter detection from the first line
//! - [`schema`]: header aliases and typed raw rows
//! - [`parse`]: per-row validation and normalization
//! - [`resolver`]: run-scoped resolve-or-create of salespeople and products
//! - [`pipeline`]: the transactional import run and its log

pub mod parse;
pub mod pipeline;
pub mod resolver;
pub mod schema;
pub mod sniff;

pub use pipeline::{import_file, ImportOutcome, ImportReport, RowError};
pub use sniff::detect_delimiter;
