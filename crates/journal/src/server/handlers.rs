use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use interface::{Stage, TradeRecord};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::info;

use super::auth::AuthUser;
use super::error::ApiError;
use super::AppState;
use crate::analytics::{history_banner, unlock_prompt, AnalyticsReport};
use crate::metrics::{AnalyticsFilter, Period};
use crate::session::registry::SharedSession;
use crate::session::{Event, PlanOptions, TradeDraft, UserSession};

const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user_id: String,
    pub is_premium: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeUidRequest {
    pub uid: String,
}

/// 세션 화면 상태
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user_id: String,
    pub is_premium: bool,
    pub stage: Stage,
    pub stage_label: String,
    pub draft: Option<TradeDraft>,
    pub feedback: Option<String>,
    pub last_saved: Option<TradeRecord>,
    pub plan_options: PlanOptions,
    pub total_trades: usize,
    pub history_banner: Option<String>,
    pub unlock_prompt: bool,
}

impl SessionView {
    fn from_session(session: &UserSession) -> Self {
        let total = session.full_history.len();
        Self {
            user_id: session.user_id.clone(),
            is_premium: session.is_premium,
            stage: session.stage,
            stage_label: session.stage.to_string(),
            draft: session.draft.clone(),
            feedback: session.feedback.clone(),
            last_saved: session.last_saved.clone(),
            plan_options: session.plan_options(),
            total_trades: total,
            history_banner: history_banner(total, session.is_premium),
            unlock_prompt: unlock_prompt(total, session.is_premium),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub session: SessionView,
    pub notices: Vec<String>,
}

/// `strategy`, `ticker` 는 쉼표로 구분한 목록
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
    pub strategy: Option<String>,
    pub ticker: Option<String>,
}

impl AnalyticsQuery {
    fn into_filter(self) -> Result<AnalyticsFilter, ApiError> {
        let period = match self.period.as_deref().map(str::trim) {
            None | Some("") => Period::default(),
            Some(raw) => raw
                .parse::<Period>()
                .map_err(|e| ApiError::Validation(e.to_string()))?,
        };
        Ok(AnalyticsFilter {
            period,
            strategies: split_list(self.strategy.as_deref()),
            tickers: split_list(self.ticker.as_deref()),
        })
    }
}

fn split_list(raw: Option<&str>) -> BTreeSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn register(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user_id = creds.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::Validation("user_id is required".to_string()));
    }
    if creds.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let profile = state.users.register_user(user_id, &creds.password).await?;
    state.sessions.login(&state.workflow, &profile).await?;
    info!("User registered: {}", profile.user_id);

    Ok(Json(TokenResponse {
        token: state.jwt.issue(&profile.user_id)?,
        user_id: profile.user_id,
        is_premium: profile.is_premium,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    let profile = state
        .users
        .verify_user(creds.user_id.trim(), &creds.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid user id or password".to_string()))?;

    state.sessions.login(&state.workflow, &profile).await?;

    Ok(Json(TokenResponse {
        token: state.jwt.issue(&profile.user_id)?,
        user_id: profile.user_id,
        is_premium: profile.is_premium,
    }))
}

pub async fn logout(State(state): State<AppState>, user: AuthUser) -> Json<Value> {
    let closed = state.sessions.logout(&user.user_id).await;
    Json(json!({ "status": "logged_out", "session_closed": closed }))
}

pub async fn submit_exchange_uid(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ExchangeUidRequest>,
) -> Result<Json<Value>, ApiError> {
    let uid = req.uid.trim();
    if uid.is_empty() {
        return Err(ApiError::Validation("uid is required".to_string()));
    }
    state.users.submit_exchange_uid(&user.user_id, uid).await?;
    Ok(Json(json!({
        "status": "submitted",
        "message": "Your exchange UID was submitted for review.",
    })))
}

pub async fn get_session(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<SessionView>, ApiError> {
    let shared = session_for(&state, &user.user_id).await?;
    let session = shared.lock().await;
    Ok(Json(SessionView::from_session(&session)))
}

pub async fn post_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(event): Json<Event>,
) -> Result<Json<EventResponse>, ApiError> {
    let shared = session_for(&state, &user.user_id).await?;
    let mut session = shared.lock().await;

    let notices = state.workflow.dispatch(&mut session, event, Utc::now()).await?;

    Ok(Json(EventResponse {
        session: SessionView::from_session(&session),
        notices: notices.iter().map(ToString::to_string).collect(),
    }))
}

pub async fn get_analytics(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let filter = query.into_filter()?;
    let shared = session_for(&state, &user.user_id).await?;

    // 스냅샷으로 계산
    let (history, is_premium) = {
        let session = shared.lock().await;
        (session.full_history.clone(), session.is_premium)
    };

    Ok(Json(AnalyticsReport::build(&history, is_premium, filter, Utc::now())))
}

/// 서버 재시작 후에도 유효한 토큰이면 세션을 다시 연다
async fn session_for(state: &AppState, user_id: &str) -> Result<SharedSession, ApiError> {
    if let Some(shared) = state.sessions.get(user_id).await {
        return Ok(shared);
    }
    let profile = state
        .users
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(format!("Unknown user: {}", user_id)))?;
    Ok(state.sessions.login(&state.workflow, &profile).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analytics_query_parsing() {
        let query = AnalyticsQuery {
            period: Some("7d".to_string()),
            strategy: Some("Breakout, Scalp,,".to_string()),
            ticker: None,
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.period, Period::Last7Days);
        assert_eq!(filter.strategies.len(), 2);
        assert!(filter.tickers.is_empty());

        let bad = AnalyticsQuery {
            period: Some("fortnight".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.into_filter(), Err(ApiError::Validation(_))));
    }
}
