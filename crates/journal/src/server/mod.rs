pub mod auth;
pub mod error;
pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

/// 유휴 세션 정리 주기
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

use crate::blob::FsBlobStore;
use crate::config::{event_body_limit, Config, DEFAULT_CHART_MAX_BYTES};
use crate::feedback::OpenAiFeedback;
use crate::record::{SqliteJournalStore, UserStore};
use crate::session::{SessionRegistry, Workflow};
use auth::JwtKeys;

pub type AppState = Arc<AppContext>;

/// 핸들러가 공유하는 서버 상태
pub struct AppContext {
    pub users: Arc<dyn UserStore>,
    pub workflow: Workflow,
    pub sessions: SessionRegistry,
    pub jwt: JwtKeys,
    /// `/session/events` 요청 본문 한도 (base64 차트 포함)
    pub event_body_limit: usize,
}

impl AppContext {
    pub fn new(users: Arc<dyn UserStore>, workflow: Workflow, jwt: JwtKeys) -> Self {
        Self {
            users,
            workflow,
            sessions: SessionRegistry::new(),
            jwt,
            event_body_limit: event_body_limit(DEFAULT_CHART_MAX_BYTES),
        }
    }

    pub fn with_event_body_limit(mut self, limit: usize) -> Self {
        self.event_body_limit = limit;
        self
    }
}

/// 설정으로부터 저장소/협력자를 모두 연결한 상태 생성
pub async fn build_state(config: &Config) -> eyre::Result<AppState> {
    let store = Arc::new(
        SqliteJournalStore::open(&config.db_path)
            .await
            .map_err(|e| eyre::eyre!("Failed to open journal store: {}", e))?,
    );

    let blob = FsBlobStore::new(config.charts.dir.clone(), config.charts.public_base_url.clone());
    let mut workflow = Workflow::new(store.clone())
        .with_blob(Arc::new(blob))
        .with_chart_limit(config.charts.max_bytes);

    match &config.feedback {
        Some(feedback) => {
            let client = OpenAiFeedback::new(feedback)
                .map_err(|e| eyre::eyre!("Failed to build feedback client: {}", e))?;
            workflow = workflow.with_feedback(Arc::new(client), feedback.timeout);
            info!("AI feedback enabled (model: {})", feedback.model);
        }
        None => warn!("OPENAI_API_KEY not set, AI feedback disabled"),
    }

    let context = AppContext::new(
        store,
        workflow,
        JwtKeys::new(&config.jwt_secret, config.token_ttl_hours),
    )
    .with_event_body_limit(config.charts.event_body_limit());

    Ok(Arc::new(context))
}

pub fn router(state: AppState) -> Router {
    let event_body_limit = state.event_body_limit;
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/account/exchange-uid", post(handlers::submit_exchange_uid))
        .route("/session", get(handlers::get_session))
        .route(
            "/session/events",
            post(handlers::post_event).layer(DefaultBodyLimit::max(event_body_limit)),
        )
        .route("/analytics", get(handlers::get_analytics))
        .with_state(state)
}

/// 토큰 수명 동안 쓰이지 않은 세션을 주기적으로 제거
pub fn spawn_session_sweeper(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let evicted = state
                .sessions
                .evict_idle(state.jwt.ttl(), Instant::now())
                .await;
            debug!("Session sweep done, {} evicted", evicted);
        }
    })
}

pub async fn start_server(config: &Config) -> eyre::Result<()> {
    let state = build_state(config).await?;
    let _sweeper = spawn_session_sweeper(state.clone());

    let mut app = router(state);
    let charts_path = config.charts.public_base_url.trim_end_matches('/');
    if charts_path.starts_with('/') && charts_path.len() > 1 {
        tokio::fs::create_dir_all(&config.charts.dir).await?;
        app = app.nest_service(charts_path, ServeDir::new(&config.charts.dir));
    }
    let app = app.layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Journal API listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sqlite::tests::temp_store;
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let store = Arc::new(temp_store().await);
        let workflow = Workflow::new(store.clone());
        router(Arc::new(AppContext::new(store, workflow, JwtKeys::new("test-secret", 1))))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register(app: &Router, user_id: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"user_id": user_id, "password": "hunter22"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_full_trade_cycle_over_http() {
        let app = app().await;
        let token = register(&app, "alice").await;

        let (status, body) = send(&app, Method::GET, "/session", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], "PRE_TRADING");
        assert_eq!(body["plan_options"]["default_start_balance"], 0.0);
        assert_eq!(body["plan_options"]["moods"][3], "FOMO");
        assert_eq!(body["plan_options"]["result_statuses"][1], "Break-even");

        let events = [
            json!({"type": "submit_plan", "start_balance": 1000.0, "ticker": "BTCUSDT",
                   "strategy_name": "Breakout", "strategy_detail": "test", "mood": "Calm"}),
            json!({"type": "add_memo", "text": "felt good"}),
            json!({"type": "end_trade"}),
            json!({"type": "save", "final_balance": 1100.0, "review": "clean", "satisfaction": 8}),
        ];
        let mut last = Value::Null;
        for event in events {
            let (status, body) =
                send(&app, Method::POST, "/session/events", Some(token.as_str()), Some(event)).await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            last = body;
        }

        let session = &last["session"];
        assert_eq!(session["stage_label"], "POST_TRADING(feedback-ready)");
        assert_eq!(session["last_saved"]["profit"], 100.0);
        assert_eq!(session["last_saved"]["roi"], 10.0);
        assert_eq!(session["last_saved"]["result_status"], "Win");
        assert!(session["feedback"].as_str().unwrap().contains("unavailable"));

        let (status, report) =
            send(&app, Method::GET, "/analytics?period=all", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["metrics"]["trade_count"], 1);
        assert_eq!(report["metrics"]["current_balance"], 1100.0);
        assert_eq!(report["table"][0]["locked"], false);
    }

    #[tokio::test]
    async fn test_save_with_large_chart_is_not_rejected() {
        use base64::Engine;

        let app = app().await;
        let token = register(&app, "dave").await;

        let plan = json!({"type": "submit_plan", "start_balance": 1000.0, "ticker": "BTCUSDT",
                          "strategy_name": "Breakout", "strategy_detail": "test"});
        for event in [plan, json!({"type": "end_trade"})] {
            let (status, _) =
                send(&app, Method::POST, "/session/events", Some(token.as_str()), Some(event)).await;
            assert_eq!(status, StatusCode::OK);
        }

        // 3 MiB 원본 -> 4 MiB 의 base64, axum 기본 한도(2 MB) 초과
        let chart = base64::engine::general_purpose::STANDARD.encode(vec![0u8; 3 * 1024 * 1024]);
        let save = json!({"type": "save", "final_balance": 1100.0, "chart_base64": chart});
        let (status, body) =
            send(&app, Method::POST, "/session/events", Some(token.as_str()), Some(save)).await;

        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["session"]["last_saved"]["profit"], 100.0);
        assert_eq!(body["notices"].as_array().unwrap().len(), 1);

        let (_, report) = send(&app, Method::GET, "/analytics", Some(token.as_str()), None).await;
        assert_eq!(report["metrics"]["trade_count"], 1);
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let app = app().await;

        let (status, _) = send(&app, Method::GET, "/session", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, Method::GET, "/session", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = register(&app, "bob").await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"user_id": "bob", "password": "another1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");

        let (status, _) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"user_id": "bob", "password": "wrong-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            Method::POST,
            "/session/events",
            Some(token.as_str()),
            Some(json!({"type": "end_trade"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");

        let (status, body) = send(
            &app,
            Method::POST,
            "/session/events",
            Some(token.as_str()),
            Some(json!({"type": "submit_plan", "ticker": "", "strategy_name": "x", "strategy_detail": "y"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].as_str().unwrap().contains("ticker"));

        let (status, _) =
            send(&app, Method::GET, "/analytics?period=fortnight", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_logout_closes_session() {
        let store = Arc::new(temp_store().await);
        let workflow = Workflow::new(store.clone());
        let state = Arc::new(AppContext::new(store, workflow, JwtKeys::new("test-secret", 1)));
        let app = router(state.clone());
        let token = register(&app, "erin").await;
        assert_eq!(state.sessions.len().await, 1);

        let (status, body) =
            send(&app, Method::POST, "/auth/logout", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_closed"], true);
        assert_eq!(state.sessions.len().await, 0);

        // 유효한 토큰이면 다음 요청에서 새 세션이 열린다
        let (status, body) = send(&app, Method::GET, "/session", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], "PRE_TRADING");
    }

    #[tokio::test]
    async fn test_login_and_exchange_uid() {
        let app = app().await;
        register(&app, "carol").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"user_id": "carol", "password": "hunter22"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_premium"], false);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            Method::POST,
            "/account/exchange-uid",
            Some(token.as_str()),
            Some(json!({"uid": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(
            &app,
            Method::POST,
            "/account/exchange-uid",
            Some(token.as_str()),
            Some(json!({"uid": "12345678"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "submitted");
    }
}
