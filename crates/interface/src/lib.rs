use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 무료 사용자에게 보여주는 최근 거래 수 (goldfish limit)
pub const FREE_TIER_LIMIT: usize = 20;

/// 전략 이름이 비어 있을 때 사용하는 기본 태그
pub const DEFAULT_STRATEGY: &str = "General";

/// 티커가 비어 있을 때 사용하는 기본값
pub const DEFAULT_TICKER: &str = "Unknown";

/// 거래 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResultStatus {
    Win,
    #[serde(rename = "Break-even")]
    BreakEven,
    Loss,
}

impl ResultStatus {
    pub const ALL: [ResultStatus; 3] = [ResultStatus::Win, ResultStatus::BreakEven, ResultStatus::Loss];

    /// 손익 부호로부터 기본 결과를 결정 (>0 Win, <0 Loss, 0 Break-even)
    pub fn from_profit(profit: f64) -> Self {
        if profit > 0.0 {
            ResultStatus::Win
        } else if profit < 0.0 {
            ResultStatus::Loss
        } else {
            ResultStatus::BreakEven
        }
    }
}

impl Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultStatus::Win => write!(f, "Win"),
            ResultStatus::BreakEven => write!(f, "Break-even"),
            ResultStatus::Loss => write!(f, "Loss"),
        }
    }
}

impl FromStr for ResultStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" => Ok(ResultStatus::Win),
            "break-even" | "breakeven" | "break_even" => Ok(ResultStatus::BreakEven),
            "loss" => Ok(ResultStatus::Loss),
            _ => Err(ParseError::ResultStatus(s.to_string())),
        }
    }
}

/// 진입 시 심리 상태
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mood {
    Calm,
    Confident,
    Anxious,
    Fomo,
    Revenge,
    Bored,
    /// 예전 데이터에 남아있는 기타 값
    Other(String),
}

impl Mood {
    pub const CHOICES: [Mood; 6] = [
        Mood::Calm,
        Mood::Confident,
        Mood::Anxious,
        Mood::Fomo,
        Mood::Revenge,
        Mood::Bored,
    ];
}

impl Default for Mood {
    fn default() -> Self {
        Mood::Other(String::new())
    }
}

impl Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mood::Calm => write!(f, "Calm"),
            Mood::Confident => write!(f, "Confident"),
            Mood::Anxious => write!(f, "Anxious"),
            Mood::Fomo => write!(f, "FOMO"),
            Mood::Revenge => write!(f, "Revenge"),
            Mood::Bored => write!(f, "Bored"),
            Mood::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<String> for Mood {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "calm" => Mood::Calm,
            "confident" => Mood::Confident,
            "anxious" => Mood::Anxious,
            "fomo" => Mood::Fomo,
            "revenge" => Mood::Revenge,
            "bored" => Mood::Bored,
            _ => Mood::Other(s),
        }
    }
}

impl From<&str> for Mood {
    fn from(s: &str) -> Self {
        Mood::from(s.to_string())
    }
}

impl From<Mood> for String {
    fn from(mood: Mood) -> Self {
        mood.to_string()
    }
}

/// 거래 중 남기는 실시간 메모
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    /// "HH:MM:SS"
    pub time: String,
    pub text: String,
}

impl Memo {
    pub fn new(at: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            time: at.format("%H:%M:%S").to_string(),
            text: text.into(),
        }
    }
}

/// 완료된 거래 기록. 저장된 후에는 변경되지 않는다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// 클라이언트가 생성한 멱등 키 (재시도 시 중복 저장 방지)
    #[serde(default)]
    pub trade_key: Uuid,
    pub user_id: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub ticker: String,
    pub strategy_name: String,
    pub strategy_detail: String,
    pub mood: Mood,
    pub start_balance: f64,
    pub final_balance: f64,
    pub profit: f64,
    pub roi: f64,
    pub result_status: ResultStatus,
    pub review: String,
    /// 1-10
    pub satisfaction: u8,
    /// 업로드된 차트 이미지 URL, 없으면 빈 문자열
    #[serde(default)]
    pub chart_url: String,
    pub duration_minutes: f64,
    #[serde(default)]
    pub memos: Vec<Memo>,
}

impl TradeRecord {
    pub fn has_chart(&self) -> bool {
        !self.chart_url.is_empty()
    }

    /// 표시용 보유 시간 ("45m", "2h 5m")
    pub fn holding_display(&self) -> String {
        let total = self.duration_minutes.max(0.0) as i64;
        let (hours, minutes) = (total / 60, total % 60);
        if hours == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}

/// profit = final_balance - start_balance
pub fn compute_profit(start_balance: f64, final_balance: f64) -> f64 {
    final_balance - start_balance
}

/// roi = profit / start_balance * 100, 시작 잔고가 0 이하이면 0
pub fn compute_roi(start_balance: f64, profit: f64) -> f64 {
    if start_balance > 0.0 {
        profit / start_balance * 100.0
    } else {
        0.0
    }
}

/// 진입~청산 사이의 분 (소수 포함)
pub fn duration_minutes(entry_time: DateTime<Utc>, exit_time: DateTime<Utc>) -> f64 {
    (exit_time - entry_time).num_milliseconds() as f64 / 60_000.0
}

/// 사용자 계정 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub is_premium: bool,
    pub exchange_uid: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 트레이딩 세션 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    #[default]
    PreTrading,
    Trading,
    PostTrading(PostTradingPhase),
    Analytics,
}

/// POST_TRADING 내부 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostTradingPhase {
    /// 리뷰 작성 중, 아직 저장 전
    AwaitingFeedback,
    /// 저장 완료, 피드백(또는 대체 문구) 표시 중
    FeedbackReady,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::PreTrading => write!(f, "PRE_TRADING"),
            Stage::Trading => write!(f, "TRADING"),
            Stage::PostTrading(PostTradingPhase::AwaitingFeedback) => write!(f, "POST_TRADING"),
            Stage::PostTrading(PostTradingPhase::FeedbackReady) => {
                write!(f, "POST_TRADING(feedback-ready)")
            }
            Stage::Analytics => write!(f, "ANALYTICS"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid result status: {0}")]
    ResultStatus(String),
    #[error("Invalid period: {0}")]
    Period(String),
}
