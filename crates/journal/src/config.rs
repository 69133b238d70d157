use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// 언어 모델 피드백 설정. API 키가 없으면 생성되지 않는다.
#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub language: String,
}

/// 차트 업로드 원본 이미지 최대 크기 기본값 (10 MiB)
pub const DEFAULT_CHART_MAX_BYTES: usize = 10 * 1024 * 1024;

/// 차트 이미지 저장 위치
#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub dir: PathBuf,
    pub public_base_url: String,
    /// 디코딩된 원본 이미지 최대 크기
    pub max_bytes: usize,
}

impl ChartConfig {
    /// base64(약 4/3 배) 로 실린 차트를 포함한 이벤트 요청 본문 한도
    pub fn event_body_limit(&self) -> usize {
        event_body_limit(self.max_bytes)
    }
}

/// 이벤트 JSON 의 나머지 필드 몫
const EVENT_BODY_SLACK: usize = 64 * 1024;

pub fn event_body_limit(chart_max_bytes: usize) -> usize {
    chart_max_bytes.div_ceil(3) * 4 + EVENT_BODY_SLACK
}

/// 로그 디렉토리. 트레이싱은 다른 설정보다 먼저 초기화되므로 따로 읽는다.
pub fn log_dir_from_env() -> PathBuf {
    PathBuf::from(env_or("LOG_DIR", "logs"))
}

/// Configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub log_dir: PathBuf,
    pub feedback: Option<FeedbackConfig>,
    pub charts: ChartConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = env_or("DB_PATH", "journal.db");
        let api_port = env_parse("JOURNAL_API_PORT", 12091);

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.trim().is_empty() => s,
            _ => {
                warn!("JWT_SECRET 미설정: 프로세스마다 임의의 키를 사용합니다 (재시작 시 토큰 무효화)");
                uuid::Uuid::new_v4().simple().to_string()
            }
        };

        let feedback = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(|api_key| FeedbackConfig {
                api_key,
                base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: env_or("OPENAI_MODEL", "gpt-4"),
                timeout: Duration::from_secs(env_parse("FEEDBACK_TIMEOUT_SECS", 8)),
                language: env_or("FEEDBACK_LANGUAGE", "Korean"),
            });

        Self {
            db_path: PathBuf::from(db_path),
            api_port,
            jwt_secret,
            token_ttl_hours: env_parse("TOKEN_TTL_HOURS", 24),
            log_dir: log_dir_from_env(),
            feedback,
            charts: ChartConfig {
                dir: PathBuf::from(env_or("CHART_DIR", "charts")),
                public_base_url: env_or("CHART_BASE_URL", "/charts"),
                max_bytes: env_parse("CHART_MAX_BYTES", DEFAULT_CHART_MAX_BYTES),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
