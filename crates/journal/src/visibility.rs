//! 무료 사용자 가시성 규칙 (goldfish limit).
//!
//! 두 가지 서로 다른 슬라이스가 있다:
//! - `analytics_window`: 지표/차트 계산 대상. 무료 사용자는 최근 20건만.
//! - `table_visibility`: 표에는 항상 전체 기록이 나오고, 오래된 기록은 마스킹된다.

use chrono::{DateTime, Utc};
use interface::{Memo, TradeRecord, FREE_TIER_LIMIT};
use serde::Serialize;

use crate::metrics::AnalyticsFilter;

pub const LOCKED_TICKER: &str = "🔒 Locked";
pub const LOCKED_STRATEGY: &str = "****";
pub const ARCHIVED_STATUS: &str = "Archived";
pub const LOCKED_MOOD: &str = "🔒";
pub const LOCKED_DETAIL: &str = "Contact us to unlock your full history.";

/// 잠기는 (가장 오래된) 기록 수
pub fn locked_count(total: usize, is_premium: bool) -> usize {
    if is_premium {
        0
    } else {
        total.saturating_sub(FREE_TIER_LIMIT)
    }
}

/// 오름차순 위치 기준 잠금 여부
pub fn is_locked_ascending(index: usize, total: usize, is_premium: bool) -> bool {
    !is_premium && index < total.saturating_sub(FREE_TIER_LIMIT)
}

/// 최신순 순위 기준 잠금 여부 (rank 0 = 가장 최근). 표 화면의 기준 규칙.
pub fn is_locked_by_rank(rank: usize, is_premium: bool) -> bool {
    !is_premium && rank >= FREE_TIER_LIMIT
}

/// 지표 계산에 쓰는 구간. 무료 사용자는 최근 20건, 프리미엄은 전체.
pub fn analytics_window(history: &[TradeRecord], is_premium: bool) -> &[TradeRecord] {
    if is_premium {
        history
    } else {
        &history[history.len().saturating_sub(FREE_TIER_LIMIT)..]
    }
}

/// 잠기지 않은 행에서만 보이는 상세 정보
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeReport {
    pub exit_time: DateTime<Utc>,
    pub holding: String,
    pub duration_minutes: f64,
    pub start_balance: f64,
    pub final_balance: f64,
    pub satisfaction: u8,
    pub review: String,
    pub chart_url: String,
    pub memos: Vec<Memo>,
}

/// 표에 표시되는 한 행
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    /// 최신순 순위 (0 = 가장 최근)
    pub rank: usize,
    pub locked: bool,
    pub entry_time: DateTime<Utc>,
    pub ticker: String,
    pub strategy_name: String,
    pub result_status: String,
    pub profit: f64,
    pub roi: f64,
    pub mood: String,
    pub detail: String,
    pub report: Option<TradeReport>,
}

impl TableRow {
    fn from_record(rank: usize, record: &TradeRecord, locked: bool) -> Self {
        mask(Self {
            rank,
            locked,
            entry_time: record.entry_time,
            ticker: record.ticker.clone(),
            strategy_name: record.strategy_name.clone(),
            result_status: record.result_status.to_string(),
            profit: record.profit,
            roi: record.roi,
            mood: record.mood.to_string(),
            detail: record.strategy_detail.clone(),
            report: Some(TradeReport {
                exit_time: record.exit_time,
                holding: record.holding_display(),
                duration_minutes: record.duration_minutes,
                start_balance: record.start_balance,
                final_balance: record.final_balance,
                satisfaction: record.satisfaction,
                review: record.review.clone(),
                chart_url: record.chart_url.clone(),
                memos: record.memos.clone(),
            }),
        })
    }
}

/// 잠긴 행의 표시 필드를 대체 문구로 교체. 잠기지 않은 행은 그대로.
/// `locked` 만으로 결과가 정해지므로 여러 번 적용해도 같다.
pub fn mask(row: TableRow) -> TableRow {
    if !row.locked {
        return row;
    }
    TableRow {
        ticker: LOCKED_TICKER.to_string(),
        strategy_name: LOCKED_STRATEGY.to_string(),
        result_status: ARCHIVED_STATUS.to_string(),
        profit: 0.0,
        roi: 0.0,
        mood: LOCKED_MOOD.to_string(),
        detail: LOCKED_DETAIL.to_string(),
        report: None,
        ..row
    }
}

/// 전체 기록을 최신순 표 행으로 변환 (잠긴 행은 마스킹)
pub fn table_visibility(history: &[TradeRecord], is_premium: bool) -> Vec<TableRow> {
    let total = history.len();
    history
        .iter()
        .enumerate()
        .rev()
        .map(|(index, record)| {
            let rank = total - 1 - index;
            TableRow::from_record(rank, record, is_locked_by_rank(rank, is_premium))
        })
        .collect()
}

/// 표 필터. 기간 필터는 잠긴 행에도 똑같이 적용되지만,
/// 전략/티커 필터는 잠긴 행을 제거하지 않는다.
pub fn filter_table(rows: Vec<TableRow>, filter: &AnalyticsFilter, now: DateTime<Utc>) -> Vec<TableRow> {
    // 기간 필터는 오름차순 입력을 기대
    let mut ascending = rows;
    ascending.reverse();
    let mut windowed = filter.period.apply(ascending, now, |row| row.entry_time);
    windowed.reverse();

    windowed
        .into_iter()
        .filter(|row| {
            row.locked
                || (filter.matches_strategy(&row.strategy_name) && filter.matches_ticker(&row.ticker))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::trade;
    use crate::metrics::{Metrics, Period};
    use chrono::Duration;

    fn history(n: usize) -> Vec<TradeRecord> {
        (0..n)
            .map(|i| {
                let strategy = if i % 2 == 0 { "Breakout" } else { "Fade" };
                trade(i as i64, (i as f64) - 10.0, 30.0, strategy, "BTCUSDT")
            })
            .collect()
    }

    #[test]
    fn test_locking_threshold_for_all_sizes() {
        for n in 0..=60 {
            let records = history(n);

            let rows = table_visibility(&records, false);
            let locked = rows.iter().filter(|r| r.locked).count();
            assert_eq!(locked, n.saturating_sub(20), "n = {}", n);
            assert_eq!(locked, locked_count(n, false));

            let premium_rows = table_visibility(&records, true);
            assert!(premium_rows.iter().all(|r| !r.locked));
            assert_eq!(locked_count(n, true), 0);
        }
    }

    #[test]
    fn test_ascending_and_rank_rules_agree() {
        for n in 0..=60 {
            for index in 0..n {
                let rank = n - 1 - index;
                for premium in [false, true] {
                    assert_eq!(
                        is_locked_ascending(index, n, premium),
                        is_locked_by_rank(rank, premium),
                        "n = {}, index = {}, premium = {}",
                        n,
                        index,
                        premium
                    );
                }
            }
        }
    }

    #[test]
    fn test_locked_rows_are_the_oldest() {
        let records = history(25);
        let rows = table_visibility(&records, false);

        assert_eq!(rows.len(), 25);
        assert_eq!(rows[0].entry_time, records[24].entry_time);
        assert!(rows[..20].iter().all(|r| !r.locked));
        assert!(rows[20..].iter().all(|r| r.locked));
        assert_eq!(rows[24].entry_time, records[0].entry_time);
    }

    #[test]
    fn test_masking_placeholders_and_idempotence() {
        let records = history(21);
        let rows = table_visibility(&records, false);
        let locked = rows.last().unwrap().clone();

        assert!(locked.locked);
        assert_eq!(locked.ticker, LOCKED_TICKER);
        assert_eq!(locked.strategy_name, LOCKED_STRATEGY);
        assert_eq!(locked.result_status, "Archived");
        assert_eq!(locked.profit, 0.0);
        assert_eq!(locked.roi, 0.0);
        assert_eq!(locked.mood, LOCKED_MOOD);
        assert_eq!(locked.detail, LOCKED_DETAIL);
        assert!(locked.report.is_none());

        assert_eq!(mask(locked.clone()), locked);
        assert_eq!(mask(mask(locked.clone())), locked);

        let visible = rows[0].clone();
        assert_eq!(mask(visible.clone()), visible);
        assert_eq!(visible.ticker, "BTCUSDT");
        assert!(visible.report.is_some());
    }

    #[test]
    fn test_tag_filters_keep_locked_rows() {
        let records = history(30);
        let rows = table_visibility(&records, false);
        let now = records[29].entry_time;

        let filter = AnalyticsFilter {
            strategies: ["Breakout".to_string()].into_iter().collect(),
            tickers: ["ETHUSDT".to_string(), "BTCUSDT".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let filtered = filter_table(rows.clone(), &filter, now);

        let locked_before = rows.iter().filter(|r| r.locked).count();
        let locked_after = filtered.iter().filter(|r| r.locked).count();
        assert_eq!(locked_before, 10);
        assert_eq!(locked_after, locked_before);

        let unlocked: Vec<&TableRow> = filtered.iter().filter(|r| !r.locked).collect();
        assert_eq!(unlocked.len(), 10);
        assert!(unlocked.iter().all(|r| r.strategy_name == "Breakout"));

        let no_match = AnalyticsFilter {
            tickers: ["DOGEUSDT".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let filtered = filter_table(rows, &no_match, now);
        assert_eq!(filtered.len(), 10);
        assert!(filtered.iter().all(|r| r.locked));
    }

    #[test]
    fn test_time_window_applies_to_locked_rows() {
        let records = history(40);
        let rows = table_visibility(&records, false);
        let now = records[39].entry_time + Duration::hours(1);

        let week = AnalyticsFilter {
            period: Period::Last7Days,
            ..Default::default()
        };
        let filtered = filter_table(rows.clone(), &week, now);
        assert_eq!(filtered.len(), 7);
        assert!(filtered.iter().all(|r| !r.locked));

        let last_trades = AnalyticsFilter {
            period: Period::Last30Trades,
            ..Default::default()
        };
        let filtered = filter_table(rows, &last_trades, now);
        assert_eq!(filtered.len(), 30);
        assert_eq!(filtered.iter().filter(|r| r.locked).count(), 10);
        assert_eq!(filtered[0].rank, 0);
    }

    #[test]
    fn test_free_user_with_25_trades() {
        let records = history(25);
        let window = analytics_window(&records, false);
        assert_eq!(window.len(), 20);
        assert_eq!(window[0].entry_time, records[5].entry_time);

        let rows = table_visibility(&records, false);
        assert_eq!(rows.iter().filter(|r| r.locked).count(), 5);

        let metrics = Metrics::compute(window, &records);
        assert_eq!(metrics.trade_count, 20);
        let expected: f64 = records[5..].iter().map(|r| r.profit).sum();
        assert_eq!(metrics.total_profit, expected);
    }

    #[test]
    fn test_premium_user_with_25_trades() {
        let records = history(25);
        let window = analytics_window(&records, true);
        assert_eq!(window.len(), 25);
        assert!(table_visibility(&records, true).iter().all(|r| !r.locked));

        let metrics = Metrics::compute(window, &records);
        assert_eq!(metrics.trade_count, 25);
    }
}
