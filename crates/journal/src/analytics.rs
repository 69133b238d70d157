//! 분석 화면 한 장 분량의 결과 묶음.

use chrono::{DateTime, Utc};
use interface::{TradeRecord, FREE_TIER_LIMIT};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::metrics::{AnalyticsFilter, EquityCurve, Metrics, Period};
use crate::visibility::{analytics_window, filter_table, locked_count, table_visibility, TableRow};

/// 무료 사용자에게 배너를 띄우기 시작하는 기록 수
pub const BANNER_THRESHOLD: usize = FREE_TIER_LIMIT - 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub filter: AnalyticsFilter,
    /// 기간 필터 선택지
    pub periods: Vec<Period>,
    pub metrics: Metrics,
    pub equity: EquityCurve,
    /// 최신순, 잠긴 행은 마스킹됨
    pub table: Vec<TableRow>,
    pub available_strategies: Vec<String>,
    pub available_tickers: Vec<String>,
    pub total_trades: usize,
    pub locked_count: usize,
    pub history_banner: Option<String>,
    pub unlock_prompt: bool,
}

impl AnalyticsReport {
    /// `history` 는 entry_time 오름차순 전체 기록
    pub fn build(
        history: &[TradeRecord],
        is_premium: bool,
        filter: AnalyticsFilter,
        now: DateTime<Utc>,
    ) -> Self {
        let window = analytics_window(history, is_premium);
        let subset = filter.apply(window, now);

        let available_strategies = distinct(window, |r| &r.strategy_name);
        let available_tickers = distinct(window, |r| &r.ticker);

        let table = filter_table(table_visibility(history, is_premium), &filter, now);

        Self {
            periods: Period::ALL.to_vec(),
            metrics: Metrics::compute(&subset, history),
            equity: EquityCurve::from_records(&subset),
            table,
            available_strategies,
            available_tickers,
            total_trades: history.len(),
            locked_count: locked_count(history.len(), is_premium),
            history_banner: history_banner(history.len(), is_premium),
            unlock_prompt: unlock_prompt(history.len(), is_premium),
            filter,
        }
    }
}

fn distinct<'a>(records: &'a [TradeRecord], key: impl Fn(&'a TradeRecord) -> &'a String) -> Vec<String> {
    records
        .iter()
        .map(key)
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// 무료 한도에 가까워지면 보여주는 안내
pub fn history_banner(total: usize, is_premium: bool) -> Option<String> {
    if is_premium || total < BANNER_THRESHOLD {
        return None;
    }
    Some(format!(
        "Free plan shows only your most recent {} trades ({} saved). Every trade is still stored.",
        FREE_TIER_LIMIT, total
    ))
}

/// 잠긴 기록이 생긴 무료 사용자에게 해제 안내 (거래소 UID 제출)
pub fn unlock_prompt(total: usize, is_premium: bool) -> bool {
    !is_premium && total > FREE_TIER_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::trade;
    use chrono::Duration;

    fn history(n: usize) -> Vec<TradeRecord> {
        (0..n)
            .map(|i| {
                let (strategy, ticker) = if i % 3 == 0 {
                    ("Scalp", "ETHUSDT")
                } else {
                    ("Breakout", "BTCUSDT")
                };
                let profit = if i % 2 == 0 { 50.0 } else { -20.0 };
                trade(i as i64, profit, 45.0, strategy, ticker)
            })
            .collect()
    }

    #[test]
    fn test_tier_notices() {
        assert_eq!(history_banner(17, false), None);
        assert!(history_banner(18, false).is_some());
        assert_eq!(history_banner(500, true), None);

        assert!(!unlock_prompt(20, false));
        assert!(unlock_prompt(21, false));
        assert!(!unlock_prompt(21, true));
    }

    #[test]
    fn test_free_report_over_limit() {
        let records = history(25);
        let now = records[24].entry_time + Duration::hours(1);
        let report = AnalyticsReport::build(&records, false, AnalyticsFilter::default(), now);

        assert_eq!(report.total_trades, 25);
        assert_eq!(report.locked_count, 5);
        assert!(report.unlock_prompt);
        assert!(report.history_banner.is_some());
        assert_eq!(report.metrics.trade_count, 20);
        assert_eq!(report.equity.points.len(), 20);
        assert_eq!(report.table.len(), 25);
        assert_eq!(report.table.iter().filter(|r| r.locked).count(), 5);
        assert_eq!(report.metrics.current_balance, records[24].final_balance);
    }

    #[test]
    fn test_filters_narrow_metrics_but_not_balance() {
        let records = history(12);
        let now = records[11].entry_time + Duration::hours(1);
        let filter = AnalyticsFilter {
            strategies: ["Scalp".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let report = AnalyticsReport::build(&records, true, filter, now);

        assert_eq!(report.metrics.trade_count, 4);
        assert!(report.table.iter().all(|r| r.strategy_name == "Scalp"));
        assert_eq!(report.metrics.current_balance, records[11].final_balance);
        assert_eq!(report.available_strategies, vec!["Breakout", "Scalp"]);
        assert_eq!(report.available_tickers, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(report.locked_count, 0);
        assert!(!report.unlock_prompt);
    }

    #[test]
    fn test_period_then_tags() {
        let records = history(40);
        let now = records[39].entry_time + Duration::hours(1);
        let filter = AnalyticsFilter {
            period: Period::Last7Days,
            tickers: ["BTCUSDT".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let report = AnalyticsReport::build(&records, true, filter, now);

        let expected = records[33..]
            .iter()
            .filter(|r| r.ticker == "BTCUSDT")
            .count();
        assert_eq!(report.metrics.trade_count, expected);
        let buckets: usize = report.metrics.duration_buckets.iter().map(|b| b.trades).sum();
        assert_eq!(buckets, expected);
    }

    #[test]
    fn test_empty_history() {
        let report = AnalyticsReport::build(&[], false, AnalyticsFilter::default(), Utc::now());
        assert_eq!(report.metrics.trade_count, 0);
        assert!(report.table.is_empty());
        assert!(report.equity.points.is_empty());
        assert_eq!(report.history_banner, None);
        assert_eq!(report.periods, Period::ALL.to_vec());
    }
}
