//! Commission arithmetic
//!
//! Pure: no I/O, no clock. The only failure is `Decimal` overflow on
//! out-of-range inputs. Amounts are rounded to cents as they are computed
//! and `final_amount` is derived from the rounded parts, so
//! `final = base + bonus - penalty` holds exactly on the stored values.

use crate::aggregator::SalesAggregate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spx_common::db::CommissionRuleSet;
use spx_common::money::{checked_sum, percent_of};
use spx_common::Result;

pub const BONUS_NOTE: &str = "Bonus applied for exceeding the sales threshold";
pub const PENALTY_NOTE: &str = "Penalty applied for exceeding the return ratio threshold";
pub const STANDARD_NOTE: &str = "Standard commission applied";

/// Result of applying a rule set to one aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionCalculation {
    pub gross_sales: Decimal,
    pub gross_returns: Decimal,
    pub net_sales: Decimal,
    pub return_ratio_pct: Decimal,
    pub base_amount: Decimal,
    pub bonus_amount: Decimal,
    pub penalty_amount: Decimal,
    /// May be negative when the penalty dominates
    pub final_amount: Decimal,
    pub bonus_applied: bool,
    pub penalty_applied: bool,
    pub notes: String,
}

/// Apply `rules` to `aggregate`.
///
/// Both tiers use strict comparisons: net sales equal to the bonus threshold
/// earn no bonus, a return ratio equal to its threshold draws no penalty.
pub fn calculate(
    aggregate: &SalesAggregate,
    rules: &CommissionRuleSet,
) -> Result<CommissionCalculation> {
    let net_sales = checked_sum([aggregate.gross_sales, -aggregate.gross_returns])?;

    let base_amount = percent_of(net_sales, rules.base_rate_pct)?;

    let bonus_applied = net_sales > rules.bonus_threshold;
    let bonus_amount = if bonus_applied {
        percent_of(net_sales, rules.bonus_rate_pct)?
    } else {
        Decimal::ZERO
    };

    let penalty_applied = aggregate.return_ratio_pct > rules.return_ratio_threshold;
    let penalty_amount = if penalty_applied {
        percent_of(net_sales, rules.penalty_rate_pct)?
    } else {
        Decimal::ZERO
    };

    Ok(CommissionCalculation {
        gross_sales: aggregate.gross_sales,
        gross_returns: aggregate.gross_returns,
        net_sales,
        return_ratio_pct: aggregate.return_ratio_pct,
        base_amount,
        bonus_amount,
        penalty_amount,
        final_amount: checked_sum([base_amount, bonus_amount, -penalty_amount])?,
        bonus_applied,
        penalty_applied,
        notes: generate_notes(bonus_applied, penalty_applied),
    })
}

/// Notes derived from the two tier flags
pub fn generate_notes(bonus_applied: bool, penalty_applied: bool) -> String {
    let mut notes = Vec::with_capacity(2);
    if bonus_applied {
        notes.push(BONUS_NOTE);
    }
    if penalty_applied {
        notes.push(PENALTY_NOTE);
    }
    if notes.is_empty() {
        notes.push(STANDARD_NOTE);
    }
    notes.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate_transactions;
    use spx_common::db::OperationKind;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rules() -> CommissionRuleSet {
        CommissionRuleSet {
            id: 1,
            name: "Standard".to_string(),
            base_rate_pct: d("5"),
            bonus_rate_pct: d("10"),
            bonus_threshold: d("1000000"),
            penalty_rate_pct: d("8"),
            return_ratio_threshold: d("10"),
            valid_from: "2024-01".parse().unwrap(),
            valid_until: None,
            active: true,
        }
    }

    fn agg(sales: &str, returns: &str) -> SalesAggregate {
        aggregate_transactions(vec![
            (OperationKind::Sale, d(sales)),
            (OperationKind::Return, -d(returns)),
        ])
        .unwrap()
        .unwrap()
    }

    fn assert_invariants(c: &CommissionCalculation) {
        assert_eq!(c.final_amount, c.base_amount + c.bonus_amount - c.penalty_amount);
        assert_eq!(c.net_sales, c.gross_sales - c.gross_returns);
    }

    #[test]
    fn test_reference_scenario_bonus_without_penalty() {
        let c = calculate(&agg("1500000", "100000"), &rules()).unwrap();

        assert_eq!(c.net_sales, d("1400000"));
        assert_eq!(c.return_ratio_pct, d("6.6667"));
        assert_eq!(c.base_amount, d("70000"));
        assert!(c.bonus_applied);
        assert_eq!(c.bonus_amount, d("140000"));
        assert!(!c.penalty_applied);
        assert_eq!(c.penalty_amount, Decimal::ZERO);
        assert_eq!(c.final_amount, d("210000"));
        assert_eq!(c.notes, BONUS_NOTE);
        assert_invariants(&c);
    }

    #[test]
    fn test_bonus_threshold_is_strict() {
        let c = calculate(&agg("1000000", "0"), &rules()).unwrap();
        assert!(!c.bonus_applied, "net sales equal to threshold must not earn a bonus");
        assert_eq!(c.bonus_amount, Decimal::ZERO);
        assert_eq!(c.final_amount, d("50000"));

        let c = calculate(&agg("1000000.01", "0"), &rules()).unwrap();
        assert!(c.bonus_applied);
        assert_invariants(&c);
    }

    #[test]
    fn test_penalty_threshold_is_strict() {
        // 100 / 1000 = exactly 10%
        let c = calculate(&agg("1000", "100"), &rules()).unwrap();
        assert!(!c.penalty_applied);
        assert_eq!(c.notes, STANDARD_NOTE);

        let c = calculate(&agg("1000", "101"), &rules()).unwrap();
        assert!(c.penalty_applied);
        assert_eq!(c.penalty_amount, d("71.92"));
        assert_invariants(&c);
    }

    #[test]
    fn test_penalty_can_make_commission_negative() {
        let mut r = rules();
        r.base_rate_pct = d("1");
        r.penalty_rate_pct = d("20");
        let c = calculate(&agg("1000", "500"), &r).unwrap();

        assert!(c.penalty_applied);
        assert_eq!(c.base_amount, d("5"));
        assert_eq!(c.penalty_amount, d("100"));
        assert_eq!(c.final_amount, d("-95"));
        assert_invariants(&c);
    }

    #[test]
    fn test_both_tiers_concatenate_notes() {
        let c = calculate(&agg("3000000", "600000"), &rules()).unwrap();
        assert!(c.bonus_applied);
        assert!(c.penalty_applied);
        assert_eq!(c.notes, format!("{}. {}", BONUS_NOTE, PENALTY_NOTE));
        assert_invariants(&c);
    }

    #[test]
    fn test_fractional_amounts_keep_invariant() {
        let c = calculate(&agg("1234567.89", "234567.77"), &rules()).unwrap();
        assert_eq!(c.base_amount, d("50000.01"));
        assert_invariants(&c);
    }

    #[test]
    fn test_notes_are_deterministic() {
        assert_eq!(generate_notes(false, false), STANDARD_NOTE);
        assert_eq!(generate_notes(true, false), BONUS_NOTE);
        assert_eq!(generate_notes(false, true), PENALTY_NOTE);
    }

    #[test]
    fn test_oversized_rate_overflows_as_error() {
        let mut r = rules();
        r.base_rate_pct = d("79228162514264337593543950335");
        let err = calculate(&agg("1000", "0"), &r).unwrap_err();
        assert!(matches!(err, spx_common::Error::Internal(_)));
    }
}
