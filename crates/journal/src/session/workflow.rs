use base64::Engine;
use chrono::{DateTime, Utc};
use interface::{PostTradingPhase, Stage, TradeRecord, UserProfile};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Event, Notice, PlanForm, ReviewForm, TradeDraft, UserSession, ValidationError, WorkflowError};
use crate::blob::{upload_chart, BlobStore};
use crate::config::DEFAULT_CHART_MAX_BYTES;
use crate::feedback::{feedback_or_placeholder, FeedbackService, TradeSummary};
use crate::record::TradeStore;

const DEFAULT_FEEDBACK_TIMEOUT: Duration = Duration::from_secs(8);

/// 세션 전이 실행기. 외부 협력자(저장소, 차트, 피드백)를 소유한다.
pub struct Workflow {
    store: Arc<dyn TradeStore>,
    blob: Option<Arc<dyn BlobStore>>,
    feedback: Option<Arc<dyn FeedbackService>>,
    feedback_timeout: Duration,
    max_chart_bytes: usize,
}

impl Workflow {
    pub fn new(store: Arc<dyn TradeStore>) -> Self {
        Self {
            store,
            blob: None,
            feedback: None,
            feedback_timeout: DEFAULT_FEEDBACK_TIMEOUT,
            max_chart_bytes: DEFAULT_CHART_MAX_BYTES,
        }
    }

    pub fn with_chart_limit(mut self, max_bytes: usize) -> Self {
        self.max_chart_bytes = max_bytes;
        self
    }

    pub fn with_blob(mut self, blob: Arc<dyn BlobStore>) -> Self {
        self.blob = Some(blob);
        self
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackService>, timeout: Duration) -> Self {
        self.feedback = Some(feedback);
        self.feedback_timeout = timeout;
        self
    }

    /// 로그인 시 전체 기록을 읽어 새 세션 생성
    pub async fn open_session(&self, profile: &UserProfile) -> Result<UserSession, WorkflowError> {
        let history = self.load_history(&profile.user_id).await?;
        Ok(UserSession::new(profile, history))
    }

    async fn load_history(&self, user_id: &str) -> Result<Vec<TradeRecord>, WorkflowError> {
        self.store.query_all(user_id).await.map_err(|e| {
            warn!("Failed to load history of {}: {}", user_id, e);
            WorkflowError::StoreUnavailable(e.to_string())
        })
    }

    /// 이벤트 하나를 적용. 실패하면 세션은 호출 전 상태 그대로 남는다.
    pub async fn dispatch(
        &self,
        session: &mut UserSession,
        event: Event,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notice>, WorkflowError> {
        let stage = session.stage;
        let name = event.name();
        debug!("{}: {} in {}", session.user_id, name, stage);

        match (stage, event) {
            (_, Event::Resync) => {
                session.full_history = self.load_history(&session.user_id).await?;
                Ok(Vec::new())
            }
            (Stage::PreTrading, Event::SubmitPlan(plan)) => {
                submit_plan(session, plan, now)?;
                Ok(Vec::new())
            }
            (Stage::PreTrading, Event::SkipToAnalytics) => {
                session.stage = Stage::Analytics;
                Ok(Vec::new())
            }
            (Stage::Trading, Event::AddMemo { text }) => {
                add_memo(session, &text, now)?;
                Ok(Vec::new())
            }
            (Stage::Trading, Event::EndTrade) => {
                end_trade(session, now);
                Ok(Vec::new())
            }
            (Stage::Trading, Event::Back) => {
                back_to_plan(session);
                Ok(Vec::new())
            }
            (Stage::PostTrading(PostTradingPhase::AwaitingFeedback), Event::Back) => {
                back_to_trading(session);
                Ok(Vec::new())
            }
            (Stage::PostTrading(PostTradingPhase::AwaitingFeedback), Event::Save(review)) => {
                self.save(session, review).await
            }
            (Stage::PostTrading(PostTradingPhase::FeedbackReady), Event::GoToAnalytics) => {
                session.stage = Stage::Analytics;
                Ok(Vec::new())
            }
            (Stage::PostTrading(PostTradingPhase::FeedbackReady), Event::NewTrade)
            | (Stage::Analytics, Event::NewTrade) => {
                new_trade(session);
                Ok(Vec::new())
            }
            (stage, _) => Err(WorkflowError::InvalidTransition { stage, event: name }),
        }
    }

    /// 리뷰 저장. 저장소 확인 전에는 단계를 넘기지 않는다.
    async fn save(
        &self,
        session: &mut UserSession,
        review: ReviewForm,
    ) -> Result<Vec<Notice>, WorkflowError> {
        review.validate()?;
        let draft = session.draft.as_ref().ok_or(WorkflowError::InvalidTransition {
            stage: session.stage,
            event: "save",
        })?;

        let mut notices = Vec::new();
        let mut chart_url = draft.chart_url.clone();
        if chart_url.is_none() {
            if let Some(encoded) = review.chart_base64.as_deref() {
                match self.upload(encoded).await {
                    Ok(url) => chart_url = Some(url),
                    Err(reason) => {
                        warn!("Chart upload failed for {}: {}", session.user_id, reason);
                        notices.push(Notice::ChartUploadFailed(reason));
                    }
                }
            }
        }

        let mut pending = draft.clone();
        pending.chart_url = chart_url;
        let record = pending.finalize(&session.user_id, &review)?;

        // 업로드된 차트는 저장 실패 후 재시도에 재사용
        if let Some(draft) = session.draft.as_mut() {
            draft.chart_url = pending.chart_url.clone();
        }

        if let Err(e) = self.store.insert(&record).await {
            warn!("Failed to save trade of {}: {}", session.user_id, e);
            return Err(WorkflowError::StoreUnavailable(e.to_string()));
        }
        info!(
            "Trade saved: user={}, ticker={}, profit={:.2}",
            record.user_id, record.ticker, record.profit
        );

        match self.store.query_all(&session.user_id).await {
            Ok(history) => session.full_history = history,
            Err(e) => {
                warn!("History refresh failed for {}: {}", session.user_id, e);
                session.full_history.push(record.clone());
                notices.push(Notice::HistoryRefreshFailed(e.to_string()));
            }
        }

        let summary = TradeSummary::from_record(&record);
        let feedback =
            feedback_or_placeholder(self.feedback.as_deref(), &summary, self.feedback_timeout).await;

        session.feedback = Some(feedback);
        session.last_saved = Some(record);
        session.stage = Stage::PostTrading(PostTradingPhase::FeedbackReady);
        Ok(notices)
    }

    async fn upload(&self, encoded: &str) -> Result<String, String> {
        let blob = self
            .blob
            .as_deref()
            .ok_or_else(|| "chart storage is not configured".to_string())?;
        let raw = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| format!("invalid base64 image: {}", e))?;
        if raw.len() > self.max_chart_bytes {
            return Err(format!(
                "image is {} bytes, the limit is {} bytes",
                raw.len(),
                self.max_chart_bytes
            ));
        }
        upload_chart(blob, raw).await.map_err(|e| e.to_string())
    }
}

fn submit_plan(session: &mut UserSession, plan: PlanForm, now: DateTime<Utc>) -> Result<(), ValidationError> {
    let draft = TradeDraft::from_plan(plan, session.default_start_balance(), now)?;
    session.draft = Some(draft);
    session.stage = Stage::Trading;
    Ok(())
}

fn add_memo(session: &mut UserSession, text: &str, now: DateTime<Utc>) -> Result<(), WorkflowError> {
    let draft = session.draft.as_mut().ok_or(WorkflowError::InvalidTransition {
        stage: session.stage,
        event: "add_memo",
    })?;
    draft.add_memo(text, now)?;
    Ok(())
}

fn end_trade(session: &mut UserSession, now: DateTime<Utc>) {
    if let Some(draft) = session.draft.as_mut() {
        draft.exit_time = Some(now.max(draft.entry_time));
    }
    session.stage = Stage::PostTrading(PostTradingPhase::AwaitingFeedback);
}

fn back_to_plan(session: &mut UserSession) {
    if let Some(draft) = session.draft.as_mut() {
        draft.exit_time = None;
    }
    session.stage = Stage::PreTrading;
}

fn back_to_trading(session: &mut UserSession) {
    if let Some(draft) = session.draft.as_mut() {
        draft.exit_time = None;
    }
    session.stage = Stage::Trading;
}

fn new_trade(session: &mut UserSession) {
    session.reset_draft();
    session.stage = Stage::PreTrading;
}
