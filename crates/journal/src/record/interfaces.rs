use async_trait::async_trait;
use interface::{TradeRecord, UserProfile};

/// 거래 기록 저장소 인터페이스
/// 확장성을 위해 트레이트로 정의하여 나중에 다른 DB로 전환 가능
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// 거래 기록 한 건 저장.
    /// 같은 trade_key 로 다시 호출되면 아무것도 하지 않고 성공으로 취급한다.
    async fn insert(&self, record: &TradeRecord) -> Result<(), RecordError>;

    /// 사용자의 모든 거래 기록을 entry_time 오름차순으로 조회
    async fn query_all(&self, user_id: &str) -> Result<Vec<TradeRecord>, RecordError>;
}

/// 사용자 계정 저장소 인터페이스
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, RecordError>;

    /// 이미 존재하면 `RecordError::AlreadyExists`
    async fn register_user(&self, user_id: &str, password: &str)
    -> Result<UserProfile, RecordError>;

    /// 아이디/비밀번호가 맞지 않으면 `Ok(None)`
    async fn verify_user(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, RecordError>;

    /// 무료 한도를 넘긴 사용자가 거래소 UID 를 제출 (프리미엄 승인은 별도)
    async fn submit_exchange_uid(&self, user_id: &str, uid: &str) -> Result<(), RecordError>;
}

/// 기록 저장소 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Other error: {0}")]
    Other(String),
}
