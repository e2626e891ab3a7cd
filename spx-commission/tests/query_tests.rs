//! Read accessor tests over a small two-period dataset

mod common;

use chrono::NaiveDate;
use common::*;
use spx_commission::batch::run_period;
use spx_commission::lifecycle::approve;
use spx_commission::queries::{
    dashboard_metrics, distribution, get_record, list_records, period_summary, sales_summary,
    top_salespeople, trend, RecordFilter,
};
use spx_common::db::CommissionState;
use sqlx::SqlitePool;

struct Fixture {
    ana: i64,
    eva: i64,
    leo: i64,
}

/// June: Ana earns the reference 210000, Eva and Leo tie at 100.
/// May: Ana alone at 50.
async fn seed(pool: &SqlitePool) -> Fixture {
    standard_rules(pool).await;
    let ana = add_salesperson(pool, "VEN001", "Ana Ruiz").await;
    let eva = add_salesperson(pool, "VEN002", "Eva Mora").await;
    let leo = add_salesperson(pool, "VEN003", "Leo Paz").await;
    let product = add_product(pool, "P-100").await;

    add_transaction(pool, ana, product, "2024-05-10", "sale", "1000").await;
    add_transaction(pool, ana, product, "2024-06-03", "sale", "1500000").await;
    add_transaction(pool, ana, product, "2024-06-20", "return", "-100000").await;
    add_transaction(pool, eva, product, "2024-06-05", "sale", "2000").await;
    add_transaction(pool, leo, product, "2024-06-06", "sale", "2000").await;

    run_period(pool, "2024-05".parse().unwrap()).await.unwrap();
    run_period(pool, period()).await.unwrap();
    Fixture { ana, eva, leo }
}

#[tokio::test]
async fn test_period_summary() {
    let (_dir, pool) = setup().await;
    let fx = seed(&pool).await;
    let ana_record = list_records(
        &pool,
        &RecordFilter {
            period: Some(period()),
            salesperson_id: Some(fx.ana),
            state: None,
        },
    )
    .await
    .unwrap()
    .remove(0);
    approve(&pool, &[ana_record.id]).await.unwrap();

    let summary = period_summary(&pool, period()).await.unwrap();
    assert_eq!(summary.salesperson_count, 3);
    assert_eq!(summary.gross_sales, d("1504000"));
    assert_eq!(summary.gross_returns, d("100000"));
    assert_eq!(summary.net_sales, d("1404000"));
    assert_eq!(summary.commission_total, d("210200"));
    assert_eq!(summary.avg_return_ratio_pct, d("2.2222"));
    assert_eq!(summary.bonus_count, 1);
    assert_eq!(summary.penalty_count, 0);
    assert_eq!(summary.calculated_count, 2);
    assert_eq!(summary.approved_count, 1);
    assert_eq!(summary.paid_count, 0);
}

#[tokio::test]
async fn test_list_records_filters() {
    let (_dir, pool) = setup().await;
    let fx = seed(&pool).await;

    let all = list_records(&pool, &RecordFilter::default()).await.unwrap();
    assert_eq!(all.len(), 4);
    // Newest period first, then by final amount
    assert_eq!(all[0].salesperson_id, fx.ana);
    assert_eq!(all[0].period, period());
    assert_eq!(all[3].period.to_string(), "2024-05");

    let ana = RecordFilter {
        salesperson_id: Some(fx.ana),
        ..Default::default()
    };
    assert_eq!(list_records(&pool, &ana).await.unwrap().len(), 2);

    let approved = RecordFilter {
        state: Some(CommissionState::Approved),
        ..Default::default()
    };
    assert!(list_records(&pool, &approved).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_record_detail_joins_salesperson() {
    let (_dir, pool) = setup().await;
    let fx = seed(&pool).await;
    let id = list_records(
        &pool,
        &RecordFilter {
            salesperson_id: Some(fx.eva),
            ..Default::default()
        },
    )
    .await
    .unwrap()[0]
        .id;

    let detail = get_record(&pool, id).await.unwrap();
    assert_eq!(detail.salesperson_code, "VEN002");
    assert_eq!(detail.salesperson_name, "Eva Mora");
    assert_eq!(detail.rule_set_name, "Standard");
    assert_eq!(detail.record.final_amount, d("100"));
}

#[tokio::test]
async fn test_top_salespeople_ranks_ties() {
    let (_dir, pool) = setup().await;
    let fx = seed(&pool).await;

    let top = top_salespeople(&pool, period(), 10).await.unwrap();
    let ranking: Vec<(usize, i64)> = top.iter().map(|t| (t.rank, t.salesperson_id)).collect();
    assert_eq!(ranking, vec![(1, fx.ana), (2, fx.eva), (2, fx.leo)]);
    assert!(top[0].bonus_applied);

    let top1 = top_salespeople(&pool, period(), 1).await.unwrap();
    assert_eq!(top1.len(), 1);
    assert_eq!(top1[0].name, "Ana Ruiz");
}

#[tokio::test]
async fn test_distribution() {
    let (_dir, pool) = setup().await;
    seed(&pool).await;

    let buckets = distribution(&pool, period()).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].label, "< 1M");
    assert_eq!(buckets[0].count, 3);
    assert_eq!(buckets[0].total, d("210200"));

    assert!(distribution(&pool, "2024-01".parse().unwrap()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_trend_covers_recent_months() {
    let (_dir, pool) = setup().await;
    seed(&pool).await;
    let today = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();

    let points = trend(&pool, 3, today).await.unwrap();
    let summary: Vec<(String, i64)> = points
        .iter()
        .map(|p| (p.period.to_string(), p.salesperson_count))
        .collect();
    assert_eq!(summary, vec![("2024-05".to_string(), 1), ("2024-06".to_string(), 3)]);
    assert_eq!(points[0].total_commissions, d("50"));
    assert_eq!(points[1].total_commissions, d("210200"));

    // Two months from July: June and July
    let points = trend(&pool, 2, today).await.unwrap();
    assert_eq!(points.len(), 1);
}

#[tokio::test]
async fn test_dashboard_metrics_follow_runs() {
    let (_dir, pool) = setup().await;
    seed(&pool).await;

    let snapshot = dashboard_metrics(&pool, period()).await.unwrap().unwrap();
    assert_eq!(snapshot.salesperson_count, 3);
    assert_eq!(snapshot.bonus_count, 1);
    assert_eq!(snapshot.bonus_ratio_pct, d("33.3333"));
    assert_eq!(snapshot.total_commissions, d("210200"));
    assert_eq!(snapshot.total_net_sales, d("1404000"));

    assert!(dashboard_metrics(&pool, "2024-07".parse().unwrap()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sales_summary_is_live() {
    let (_dir, pool) = setup().await;
    let fx = seed(&pool).await;

    let june = sales_summary(&pool, fx.ana, period()).await.unwrap().unwrap();
    assert_eq!(june.gross_sales, d("1500000"));
    assert_eq!(june.gross_returns, d("100000"));
    assert_eq!(june.sale_count, 1);
    assert_eq!(june.return_count, 1);

    assert!(sales_summary(&pool, fx.ana, "2024-07".parse().unwrap()).await.unwrap().is_none());
}
