use chrono::{DateTime, Duration, Utc};
use interface::{ParseError, ResultStatus, TradeRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

/// "Last 30 Trades" 기간 필터의 거래 수
pub const RECENT_TRADES_WINDOW: usize = 30;

/// 분석 기간 필터
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Period {
    #[default]
    AllTime,
    Last7Days,
    Last30Days,
    Last30Trades,
}

impl Period {
    pub const ALL: [Period; 4] = [
        Period::AllTime,
        Period::Last7Days,
        Period::Last30Days,
        Period::Last30Trades,
    ];

    /// 시간 기준 필터의 하한 (거래 수 기준이면 None)
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::Last7Days => Some(now - Duration::days(7)),
            Period::Last30Days => Some(now - Duration::days(30)),
            Period::AllTime | Period::Last30Trades => None,
        }
    }

    /// entry_time 오름차순으로 정렬된 항목에 기간 필터 적용
    pub fn apply<T>(
        &self,
        items: Vec<T>,
        now: DateTime<Utc>,
        entry_time: impl Fn(&T) -> DateTime<Utc>,
    ) -> Vec<T> {
        match self {
            Period::AllTime => items,
            Period::Last7Days | Period::Last30Days => {
                let cutoff = self.cutoff(now).unwrap_or(now);
                items
                    .into_iter()
                    .filter(|item| entry_time(item) >= cutoff)
                    .collect()
            }
            Period::Last30Trades => {
                let skip = items.len().saturating_sub(RECENT_TRADES_WINDOW);
                items.into_iter().skip(skip).collect()
            }
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::AllTime => write!(f, "All Time"),
            Period::Last7Days => write!(f, "Last 7 Days"),
            Period::Last30Days => write!(f, "Last 30 Days"),
            Period::Last30Trades => write!(f, "Last 30 Trades"),
        }
    }
}

impl FromStr for Period {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "all" | "alltime" => Ok(Period::AllTime),
            "7d" | "last7days" => Ok(Period::Last7Days),
            "30d" | "last30days" => Ok(Period::Last30Days),
            "30t" | "last30trades" => Ok(Period::Last30Trades),
            _ => Err(ParseError::Period(s.to_string())),
        }
    }
}

/// 분석 화면 필터. 빈 집합은 "필터 없음".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsFilter {
    #[serde(default)]
    pub period: Period,
    #[serde(default)]
    pub strategies: BTreeSet<String>,
    #[serde(default)]
    pub tickers: BTreeSet<String>,
}

impl AnalyticsFilter {
    pub fn matches_strategy(&self, strategy_name: &str) -> bool {
        self.strategies.is_empty() || self.strategies.contains(strategy_name)
    }

    pub fn matches_ticker(&self, ticker: &str) -> bool {
        self.tickers.is_empty() || self.tickers.contains(ticker)
    }

    /// 기간 필터 후 전략/티커 필터. 입력은 entry_time 오름차순.
    pub fn apply(&self, records: &[TradeRecord], now: DateTime<Utc>) -> Vec<TradeRecord> {
        let windowed = self
            .period
            .apply(records.iter().collect::<Vec<_>>(), now, |r| r.entry_time);
        windowed
            .into_iter()
            .filter(|r| self.matches_strategy(&r.strategy_name) && self.matches_ticker(&r.ticker))
            .cloned()
            .collect()
    }
}

/// 보유 시간 구간
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationBucket {
    #[serde(rename = "0-1h")]
    UpTo1h,
    #[serde(rename = "1-3h")]
    UpTo3h,
    #[serde(rename = "3-6h")]
    UpTo6h,
    #[serde(rename = "6-12h")]
    UpTo12h,
    #[serde(rename = "12-24h")]
    UpTo24h,
    #[serde(rename = "24h+")]
    Over24h,
}

impl DurationBucket {
    pub const ALL: [DurationBucket; 6] = [
        DurationBucket::UpTo1h,
        DurationBucket::UpTo3h,
        DurationBucket::UpTo6h,
        DurationBucket::UpTo12h,
        DurationBucket::UpTo24h,
        DurationBucket::Over24h,
    ];

    pub fn from_minutes(minutes: f64) -> Self {
        if minutes <= 60.0 {
            DurationBucket::UpTo1h
        } else if minutes <= 180.0 {
            DurationBucket::UpTo3h
        } else if minutes <= 360.0 {
            DurationBucket::UpTo6h
        } else if minutes <= 720.0 {
            DurationBucket::UpTo12h
        } else if minutes <= 1440.0 {
            DurationBucket::UpTo24h
        } else {
            DurationBucket::Over24h
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DurationBucket::UpTo1h => "0-1h",
            DurationBucket::UpTo3h => "1-3h",
            DurationBucket::UpTo6h => "3-6h",
            DurationBucket::UpTo12h => "6-12h",
            DurationBucket::UpTo24h => "12-24h",
            DurationBucket::Over24h => "24h+",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketStat {
    pub bucket: DurationBucket,
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
}

/// 결과 상태별 건수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultCounts {
    pub win: usize,
    pub break_even: usize,
    pub loss: usize,
}

impl ResultCounts {
    pub fn from_records(records: &[TradeRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            match r.result_status {
                ResultStatus::Win => acc.win += 1,
                ResultStatus::BreakEven => acc.break_even += 1,
                ResultStatus::Loss => acc.loss += 1,
            }
            acc
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    /// 1부터 시작
    pub trade_num: usize,
    /// "MM/DD"
    pub date_label: String,
    pub final_balance: f64,
}

/// 잔고 곡선 + 차트 y축 범위
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityCurve {
    pub points: Vec<EquityPoint>,
    pub y_min: f64,
    pub y_max: f64,
}

impl EquityCurve {
    pub fn from_records(records: &[TradeRecord]) -> Self {
        let points: Vec<EquityPoint> = records
            .iter()
            .enumerate()
            .map(|(i, r)| EquityPoint {
                trade_num: i + 1,
                date_label: r.entry_time.format("%m/%d").to_string(),
                final_balance: r.final_balance,
            })
            .collect();

        if points.is_empty() {
            return Self {
                points,
                y_min: 0.0,
                y_max: 0.0,
            };
        }

        let min = points.iter().map(|p| p.final_balance).fold(f64::INFINITY, f64::min);
        let max = points
            .iter()
            .map(|p| p.final_balance)
            .fold(f64::NEG_INFINITY, f64::max);
        let diff = max - min;
        let padding = if diff > 0.0 {
            diff * 0.5
        } else if min != 0.0 {
            min.abs() * 0.05
        } else {
            100.0
        };

        Self {
            points,
            y_min: min - padding,
            y_max: max + padding,
        }
    }
}

/// 필터된 거래 묶음에 대한 성과 지표
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub trade_count: usize,
    pub total_profit: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub pl_ratio: f64,
    pub avg_holding_minutes: f64,
    /// 필터와 무관하게 전체 기록의 마지막 잔고
    pub current_balance: f64,
    pub duration_buckets: Vec<BucketStat>,
    pub result_counts: ResultCounts,
}

impl Metrics {
    /// `subset`: 필터가 적용된 분석 대상, `full_history`: 필터 전 전체 기록 (잔고용)
    pub fn compute(subset: &[TradeRecord], full_history: &[TradeRecord]) -> Self {
        let profits: Vec<f64> = subset.iter().map(|r| r.profit).collect();
        let wins: Vec<f64> = profits.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = profits
            .iter()
            .copied()
            .filter(|p| *p < 0.0)
            .map(f64::abs)
            .collect();

        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);
        let pl_ratio = if avg_loss > 0.0 { avg_win / avg_loss } else { 0.0 };

        let holdings: Vec<f64> = subset.iter().map(|r| r.duration_minutes).collect();

        Self {
            trade_count: subset.len(),
            total_profit: profits.iter().sum(),
            win_rate: percentage(wins.len(), subset.len()),
            avg_win,
            avg_loss,
            pl_ratio,
            avg_holding_minutes: mean(&holdings),
            current_balance: current_balance(full_history),
            duration_buckets: duration_buckets(subset),
            result_counts: ResultCounts::from_records(subset),
        }
    }
}

/// 전체 기록 기준 현재 잔고 (기록이 없으면 0)
pub fn current_balance(full_history: &[TradeRecord]) -> f64 {
    full_history.last().map(|r| r.final_balance).unwrap_or(0.0)
}

/// 여섯 구간을 항상 모두 반환 (빈 구간은 승률 0)
pub fn duration_buckets(records: &[TradeRecord]) -> Vec<BucketStat> {
    DurationBucket::ALL
        .iter()
        .map(|bucket| {
            let members: Vec<&TradeRecord> = records
                .iter()
                .filter(|r| DurationBucket::from_minutes(r.duration_minutes) == *bucket)
                .collect();
            let wins = members.iter().filter(|r| r.profit > 0.0).count();
            BucketStat {
                bucket: *bucket,
                trades: members.len(),
                wins,
                win_rate: percentage(wins, members.len()),
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
