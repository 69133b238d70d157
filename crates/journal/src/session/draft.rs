use chrono::{DateTime, Utc};
use interface::{
    compute_profit, compute_roi, duration_minutes, Memo, Mood, ResultStatus, TradeRecord,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 입력 검증 실패. 상태는 바뀌지 않고 폼을 다시 보여준다.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} must be zero or greater (got {value})")]
    NegativeBalance { field: &'static str, value: f64 },

    #[error("satisfaction must be between 1 and 10 (got {0})")]
    Satisfaction(u8),
}

/// PRE_TRADING 계획 폼
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanForm {
    /// 비우면 직전 거래의 최종 잔고
    #[serde(default)]
    pub start_balance: Option<f64>,
    pub ticker: String,
    pub strategy_name: String,
    pub strategy_detail: String,
    #[serde(default)]
    pub mood: Mood,
}

/// POST_TRADING 리뷰 폼
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewForm {
    pub final_balance: f64,
    /// 비우면 손익 부호로 결정
    #[serde(default)]
    pub result_status: Option<ResultStatus>,
    #[serde(default)]
    pub review: String,
    #[serde(default = "default_satisfaction")]
    pub satisfaction: u8,
    /// base64 로 인코딩된 차트 이미지 (PNG/JPEG/WebP)
    #[serde(default)]
    pub chart_base64: Option<String>,
}

fn default_satisfaction() -> u8 {
    5
}

impl ReviewForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_balance("final_balance", self.final_balance)?;
        if !(1..=10).contains(&self.satisfaction) {
            return Err(ValidationError::Satisfaction(self.satisfaction));
        }
        Ok(())
    }
}

/// 저장 전 진행 중인 거래
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeDraft {
    /// 저장 재시도 시 중복을 막는 멱등 키
    pub trade_key: Uuid,
    pub start_balance: f64,
    pub ticker: String,
    pub strategy_name: String,
    pub strategy_detail: String,
    pub mood: Mood,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub memos: Vec<Memo>,
    /// 업로드가 끝난 차트. 저장 재시도 시 다시 올리지 않는다.
    pub chart_url: Option<String>,
}

impl TradeDraft {
    pub fn from_plan(
        plan: PlanForm,
        default_start_balance: f64,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let ticker = required("ticker", plan.ticker)?;
        let strategy_name = required("strategy_name", plan.strategy_name)?;
        let strategy_detail = required("strategy_detail", plan.strategy_detail)?;

        let start_balance = plan.start_balance.unwrap_or(default_start_balance);
        ensure_balance("start_balance", start_balance)?;

        Ok(Self {
            trade_key: Uuid::new_v4(),
            start_balance,
            ticker,
            strategy_name,
            strategy_detail,
            mood: plan.mood,
            entry_time: now,
            exit_time: None,
            memos: Vec::new(),
            chart_url: None,
        })
    }

    pub fn add_memo(&mut self, text: &str, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::MissingField("memo text"));
        }
        self.memos.push(Memo::new(now, text));
        Ok(())
    }

    /// 리뷰 폼과 합쳐 저장할 기록을 만든다. exit_time 이 없으면 entry_time 사용.
    pub fn finalize(&self, user_id: &str, review: &ReviewForm) -> Result<TradeRecord, ValidationError> {
        review.validate()?;

        let exit_time = self.exit_time.unwrap_or(self.entry_time).max(self.entry_time);
        let profit = compute_profit(self.start_balance, review.final_balance);

        Ok(TradeRecord {
            trade_key: self.trade_key,
            user_id: user_id.to_string(),
            entry_time: self.entry_time,
            exit_time,
            ticker: self.ticker.clone(),
            strategy_name: self.strategy_name.clone(),
            strategy_detail: self.strategy_detail.clone(),
            mood: self.mood.clone(),
            start_balance: self.start_balance,
            final_balance: review.final_balance,
            profit,
            roi: compute_roi(self.start_balance, profit),
            result_status: review
                .result_status
                .unwrap_or_else(|| ResultStatus::from_profit(profit)),
            review: review.review.trim().to_string(),
            satisfaction: review.satisfaction,
            chart_url: self.chart_url.clone().unwrap_or_default(),
            duration_minutes: duration_minutes(self.entry_time, exit_time),
            memos: self.memos.clone(),
        })
    }
}

fn required(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn ensure_balance(field: &'static str, value: f64) -> Result<(), ValidationError> {
    // NaN 도 거부
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NegativeBalance { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn plan() -> PlanForm {
        PlanForm {
            start_balance: Some(1000.0),
            ticker: " BTCUSDT ".to_string(),
            strategy_name: "Breakout".to_string(),
            strategy_detail: "test".to_string(),
            mood: Mood::Calm,
        }
    }

    fn review(final_balance: f64) -> ReviewForm {
        ReviewForm {
            final_balance,
            result_status: None,
            review: "followed the plan".to_string(),
            satisfaction: 7,
            chart_base64: None,
        }
    }

    #[test]
    fn test_plan_requires_all_text_fields() {
        let now = Utc::now();
        for (field, mut form) in [
            ("ticker", plan()),
            ("strategy_name", plan()),
            ("strategy_detail", plan()),
        ] {
            match field {
                "ticker" => form.ticker = "   ".to_string(),
                "strategy_name" => form.strategy_name = String::new(),
                _ => form.strategy_detail = String::new(),
            }
            assert_eq!(
                TradeDraft::from_plan(form, 0.0, now),
                Err(ValidationError::MissingField(field))
            );
        }

        let draft = TradeDraft::from_plan(plan(), 0.0, now).unwrap();
        assert_eq!(draft.ticker, "BTCUSDT");
        assert_eq!(draft.entry_time, now);
    }

    #[test]
    fn test_plan_start_balance_default_and_negative() {
        let mut form = plan();
        form.start_balance = None;
        let draft = TradeDraft::from_plan(form.clone(), 1234.5, Utc::now()).unwrap();
        assert_eq!(draft.start_balance, 1234.5);

        form.start_balance = Some(-1.0);
        assert!(matches!(
            TradeDraft::from_plan(form, 0.0, Utc::now()),
            Err(ValidationError::NegativeBalance { field: "start_balance", .. })
        ));
    }

    #[test]
    fn test_finalize_computes_derived_fields() {
        let entry = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
        let mut draft = TradeDraft::from_plan(plan(), 0.0, entry).unwrap();
        draft.add_memo("felt good", entry + Duration::minutes(5)).unwrap();
        draft.exit_time = Some(entry + Duration::minutes(95));

        let record = draft.finalize("alice", &review(900.0)).unwrap();
        assert_eq!(record.profit, -100.0);
        assert_eq!(record.roi, -10.0);
        assert_eq!(record.result_status, ResultStatus::Loss);
        assert_eq!(record.duration_minutes, 95.0);
        assert_eq!(record.trade_key, draft.trade_key);
        assert_eq!(record.memos[0].time, "09:05:00");

        let mut overridden = review(900.0);
        overridden.result_status = Some(ResultStatus::BreakEven);
        let record = draft.finalize("alice", &overridden).unwrap();
        assert_eq!(record.result_status, ResultStatus::BreakEven);
    }

    #[test]
    fn test_review_validation() {
        let draft = TradeDraft::from_plan(plan(), 0.0, Utc::now()).unwrap();

        assert!(matches!(
            draft.finalize("alice", &review(-5.0)),
            Err(ValidationError::NegativeBalance { field: "final_balance", .. })
        ));

        let mut bad = review(1000.0);
        bad.satisfaction = 0;
        assert_eq!(draft.finalize("alice", &bad), Err(ValidationError::Satisfaction(0)));
        bad.satisfaction = 11;
        assert_eq!(draft.finalize("alice", &bad), Err(ValidationError::Satisfaction(11)));
    }

    #[test]
    fn test_empty_memo_rejected() {
        let mut draft = TradeDraft::from_plan(plan(), 0.0, Utc::now()).unwrap();
        assert_eq!(
            draft.add_memo("  ", Utc::now()),
            Err(ValidationError::MissingField("memo text"))
        );
        assert!(draft.memos.is_empty());
    }

    #[test]
    fn test_memo_text_kept_verbatim() {
        let mut draft = TradeDraft::from_plan(plan(), 0.0, Utc::now()).unwrap();
        draft.add_memo("  stop moved\n  to BE ", Utc::now()).unwrap();
        assert_eq!(draft.memos[0].text, "  stop moved\n  to BE ");
    }
}
