//! 사용자별 트레이딩 세션 상태 머신.
//!
//! PRE_TRADING -> TRADING -> POST_TRADING(리뷰 -> 피드백) -> ANALYTICS 로 순환한다.
//! 전이는 `Workflow::dispatch` 한 곳에서만 일어나고, 세션 객체는 명시적으로 전달된다.

pub mod draft;
pub mod registry;
pub mod workflow;

use interface::{Mood, ResultStatus, Stage, TradeRecord, UserProfile, DEFAULT_STRATEGY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

pub use draft::{PlanForm, ReviewForm, TradeDraft, ValidationError};
pub use registry::SessionRegistry;
pub use workflow::Workflow;

/// 사용자 한 명의 세션
#[derive(Debug, Clone, Serialize)]
pub struct UserSession {
    pub user_id: String,
    pub is_premium: bool,
    /// 저장소에서 읽은 전체 기록 (entry_time 오름차순)
    #[serde(skip)]
    pub full_history: Vec<TradeRecord>,
    pub stage: Stage,
    pub draft: Option<TradeDraft>,
    /// 마지막 저장 건에 대한 코치 피드백 또는 대체 문구
    pub feedback: Option<String>,
    pub last_saved: Option<TradeRecord>,
}

/// 계획 폼 기본값과 선택지
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOptions {
    pub default_start_balance: f64,
    pub tickers: Vec<String>,
    pub strategies: Vec<String>,
    pub moods: Vec<Mood>,
    /// 리뷰 폼에서 결과를 직접 고를 때의 선택지
    pub result_statuses: Vec<ResultStatus>,
}

impl UserSession {
    pub fn new(profile: &UserProfile, full_history: Vec<TradeRecord>) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            is_premium: profile.is_premium,
            full_history,
            stage: Stage::PreTrading,
            draft: None,
            feedback: None,
            last_saved: None,
        }
    }

    /// 직전 거래의 최종 잔고, 기록이 없으면 0
    pub fn default_start_balance(&self) -> f64 {
        self.full_history
            .last()
            .map(|r| r.final_balance)
            .unwrap_or(0.0)
    }

    pub fn plan_options(&self) -> PlanOptions {
        let tickers: BTreeSet<String> = self.full_history.iter().map(|r| r.ticker.clone()).collect();
        let mut strategies: BTreeSet<String> = self
            .full_history
            .iter()
            .map(|r| r.strategy_name.clone())
            .collect();
        strategies.insert(DEFAULT_STRATEGY.to_string());

        PlanOptions {
            default_start_balance: self.default_start_balance(),
            tickers: tickers.into_iter().collect(),
            strategies: strategies.into_iter().collect(),
            moods: Mood::CHOICES.to_vec(),
            result_statuses: ResultStatus::ALL.to_vec(),
        }
    }

    /// 새 거래 시작: 초안/메모/피드백 정리
    fn reset_draft(&mut self) {
        self.draft = None;
        self.feedback = None;
        self.last_saved = None;
    }
}

/// 세션에 적용하는 사용자 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SubmitPlan(PlanForm),
    SkipToAnalytics,
    AddMemo { text: String },
    EndTrade,
    Back,
    Save(ReviewForm),
    NewTrade,
    GoToAnalytics,
    /// 저장소에서 전체 기록 다시 읽기
    Resync,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::SubmitPlan(_) => "submit_plan",
            Event::SkipToAnalytics => "skip_to_analytics",
            Event::AddMemo { .. } => "add_memo",
            Event::EndTrade => "end_trade",
            Event::Back => "back",
            Event::Save(_) => "save",
            Event::NewTrade => "new_trade",
            Event::GoToAnalytics => "go_to_analytics",
            Event::Resync => "resync",
        }
    }
}

/// 전이는 성공했지만 사용자에게 알려야 하는 부분 실패
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// 차트 없이 저장됨
    ChartUploadFailed(String),
    /// 저장은 됐지만 기록 새로고침 실패
    HistoryRefreshFailed(String),
}

impl Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::ChartUploadFailed(reason) => {
                write!(f, "Chart image was not attached ({}). The trade was saved without it.", reason)
            }
            Notice::HistoryRefreshFailed(reason) => {
                write!(f, "Trade saved, but the history could not be reloaded ({}).", reason)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("'{event}' is not available in stage {stage}")]
    InvalidTransition { stage: Stage, event: &'static str },

    #[error("Journal store unavailable: {0}. The trade was NOT saved and your draft is kept, please retry.")]
    StoreUnavailable(String),
}
