//! spx-commission library
//!
//! Period-scoped commission computation and lifecycle:
//! - [`rules`]: active rule-set lookup and administration
//! - [`aggregator`]: per-salesperson period totals
//! - [`calculator`]: pure commission arithmetic
//! - [`batch`]: transactional period runs and recompute
//! - [`lifecycle`]: approve / pay transitions
//! - [`queries`]: read accessors for records, summaries and metrics

pub mod aggregator;
pub mod batch;
pub mod calculator;
pub mod lifecycle;
pub mod queries;
pub mod rules;

pub use aggregator::SalesAggregate;
pub use batch::{recalculate, run_period, BatchResult, Recalculation, RunOutcome, SalespersonOutcome};
pub use calculator::{calculate, CommissionCalculation};
pub use lifecycle::{approve, approve_period, pay};
pub use rules::{get_active_rules, NewRuleSet};
