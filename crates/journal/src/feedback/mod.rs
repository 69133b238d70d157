pub mod openai;

use async_trait::async_trait;
use interface::{Memo, ResultStatus, TradeRecord};
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

pub use openai::OpenAiFeedback;

pub const SYSTEM_PROMPT: &str = "You are a pro trader coach.";

const NOT_CONFIGURED_TEXT: &str =
    "AI feedback unavailable: no language model API key is configured. Your trade was saved.";

/// 코치 피드백 요청에 쓰이는 거래 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeSummary {
    pub strategy: String,
    pub result: ResultStatus,
    pub profit_amount: f64,
    pub roi_percent: f64,
    pub review: String,
    pub memos_text: String,
}

impl TradeSummary {
    pub fn from_record(record: &TradeRecord) -> Self {
        Self {
            strategy: record.strategy_name.clone(),
            result: record.result_status,
            profit_amount: record.profit,
            roi_percent: record.roi,
            review: record.review.clone(),
            memos_text: memos_text(&record.memos),
        }
    }

    pub fn prompt(&self, language: &str) -> String {
        format!(
            "[Trade Data]\n\
             Strategy: {}\n\
             Result: {} (${:.0}, {:.2}%)\n\
             Review: {}\n\
             Memos: {}\n\
             \n\
             Provide 3-line concise feedback in {}.",
            self.strategy,
            self.result,
            self.profit_amount,
            self.roi_percent,
            self.review,
            self.memos_text,
            language
        )
    }
}

/// "- HH:MM:SS text" 줄 목록, 메모가 없으면 "None"
pub fn memos_text(memos: &[Memo]) -> String {
    if memos.is_empty() {
        return "None".to_string();
    }
    memos
        .iter()
        .map(|m| format!("- {} {}", m.time, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 거래 요약을 받아 코치 스타일 텍스트를 돌려주는 외부 서비스
#[async_trait]
pub trait FeedbackService: Send + Sync {
    async fn feedback(&self, summary: &TradeSummary) -> Result<String, FeedbackError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("empty response from language model")]
    EmptyResponse,

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// 피드백은 최선 노력. 설정이 없거나 실패하면 사유를 담은 대체 문구를 반환한다.
pub async fn feedback_or_placeholder(
    service: Option<&dyn FeedbackService>,
    summary: &TradeSummary,
    timeout: Duration,
) -> String {
    let Some(service) = service else {
        return NOT_CONFIGURED_TEXT.to_string();
    };

    let result = match tokio::time::timeout(timeout, service.feedback(summary)).await {
        Ok(result) => result,
        Err(_) => Err(FeedbackError::Timeout(timeout)),
    };

    match result {
        Ok(text) => text,
        Err(e) => {
            warn!("Feedback request failed: {}", e);
            format!("AI feedback unavailable ({}). Your trade was saved.", e)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct CannedFeedback(pub &'static str);

    #[async_trait]
    impl FeedbackService for CannedFeedback {
        async fn feedback(&self, _summary: &TradeSummary) -> Result<String, FeedbackError> {
            Ok(self.0.to_string())
        }
    }

    pub(crate) struct FailingFeedback;

    #[async_trait]
    impl FeedbackService for FailingFeedback {
        async fn feedback(&self, _summary: &TradeSummary) -> Result<String, FeedbackError> {
            Err(FeedbackError::Api {
                status: 500,
                body: "upstream down".to_string(),
            })
        }
    }

    struct SlowFeedback;

    #[async_trait]
    impl FeedbackService for SlowFeedback {
        async fn feedback(&self, _summary: &TradeSummary) -> Result<String, FeedbackError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    fn summary() -> TradeSummary {
        TradeSummary {
            strategy: "Breakout".to_string(),
            result: ResultStatus::Win,
            profit_amount: 100.0,
            roi_percent: 10.0,
            review: "followed the plan".to_string(),
            memos_text: memos_text(&[Memo {
                time: "10:00:00".to_string(),
                text: "felt good".to_string(),
            }]),
        }
    }

    #[test]
    fn test_prompt_contains_trade_data() {
        let prompt = summary().prompt("Korean");
        assert!(prompt.starts_with("[Trade Data]\nStrategy: Breakout\n"));
        assert!(prompt.contains("Result: Win ($100, 10.00%)"));
        assert!(prompt.contains("Memos: - 10:00:00 felt good"));
        assert!(prompt.ends_with("Provide 3-line concise feedback in Korean."));
        assert_eq!(memos_text(&[]), "None");
    }

    #[tokio::test]
    async fn test_placeholder_when_not_configured() {
        let text = feedback_or_placeholder(None, &summary(), Duration::from_secs(1)).await;
        assert_eq!(text, NOT_CONFIGURED_TEXT);
    }

    #[tokio::test]
    async fn test_placeholder_on_failure_and_timeout() {
        let failing = FailingFeedback;
        let text = feedback_or_placeholder(Some(&failing), &summary(), Duration::from_secs(1)).await;
        assert!(text.contains("upstream down"));

        let slow = SlowFeedback;
        let text = feedback_or_placeholder(Some(&slow), &summary(), Duration::from_millis(20)).await;
        assert!(text.contains("timed out"));
    }

    #[tokio::test]
    async fn test_success_passes_text_through() {
        let canned = CannedFeedback("stick to the plan");
        let text = feedback_or_placeholder(Some(&canned), &summary(), Duration::from_secs(1)).await;
        assert_eq!(text, "stick to the plan");
    }
}
