use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use interface::{TradeRecord, UserProfile};
use sea_orm::sea_query::{Expr, Index, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Schema, Set,
};
use std::convert::TryFrom;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::credentials::{hash_password, new_salt, verify_password};
use super::entities::{trade, user};
use super::normalize::parse_timestamp;
use super::{RecordError, TradeStore, UserStore};

/// SQLite 기반 거래 기록 + 사용자 저장소
pub struct SqliteJournalStore {
    db: DatabaseConnection,
}

impl SqliteJournalStore {
    /// DB 파일을 열고 (없으면 생성) 테이블/인덱스를 준비
    pub async fn open(db_path: &Path) -> Result<Self, RecordError> {
        // 상대 경로인 경우 현재 디렉토리 기준
        let mut path = PathBuf::from(db_path);
        if !path.is_absolute() {
            if let Ok(current_dir) = env::current_dir() {
                path = current_dir.join(db_path);
            }
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RecordError::Other(format!("Failed to create DB directory: {}", e)))?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
        info!("Connecting to SQLite database: {}", db_url);

        let db = Database::connect(&db_url).await?;

        let backend = db.get_database_backend();
        let schema = Schema::new(backend);

        let mut create_trades = schema.create_table_from_entity(trade::Entity);
        create_trades.if_not_exists();
        db.execute(backend.build(&create_trades)).await?;

        let mut create_users = schema.create_table_from_entity(user::Entity);
        create_users.if_not_exists();
        db.execute(backend.build(&create_users)).await?;

        let mut user_idx = Index::create()
            .name("idx_trades_user_id")
            .table(trade::Entity)
            .col(trade::Column::UserId)
            .to_owned();
        user_idx.if_not_exists();

        let mut entry_time_idx = Index::create()
            .name("idx_trades_entry_time")
            .table(trade::Entity)
            .col(trade::Column::EntryTime)
            .to_owned();
        entry_time_idx.if_not_exists();

        if let Err(e) = db.execute(backend.build(&user_idx)).await {
            debug!("Index idx_trades_user_id creation skipped: {}", e);
        }
        if let Err(e) = db.execute(backend.build(&entry_time_idx)).await {
            debug!("Index idx_trades_entry_time creation skipped: {}", e);
        }

        info!("Journal tables initialized");

        Ok(Self { db })
    }
}

fn timestamp_text(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// 저장 전 검증. 누락/이상 값을 조용히 보정하지 않는다.
fn validate_for_insert(record: &TradeRecord) -> Result<(), RecordError> {
    if record.user_id.trim().is_empty() {
        return Err(RecordError::InvalidRecord("user_id is empty".to_string()));
    }
    if record.exit_time < record.entry_time {
        return Err(RecordError::InvalidRecord(
            "exit_time is before entry_time".to_string(),
        ));
    }
    if !(1..=10).contains(&record.satisfaction) {
        return Err(RecordError::InvalidRecord(format!(
            "satisfaction must be within 1-10, got {}",
            record.satisfaction
        )));
    }
    Ok(())
}

fn to_active_model(record: &TradeRecord) -> Result<trade::ActiveModel, RecordError> {
    let memos = serde_json::to_string(&record.memos)?;

    Ok(trade::ActiveModel {
        trade_key: Set(record.trade_key.to_string()),
        user_id: Set(record.user_id.trim().to_string()),
        entry_time: Set(timestamp_text(record.entry_time)),
        exit_time: Set(Some(timestamp_text(record.exit_time))),
        ticker: Set(Some(record.ticker.clone())),
        strategy_name: Set(Some(record.strategy_name.clone())),
        strategy_detail: Set(Some(record.strategy_detail.clone())),
        mood: Set(Some(record.mood.to_string())),
        start_balance: Set(record.start_balance),
        final_balance: Set(record.final_balance),
        profit: Set(Some(record.profit)),
        roi: Set(Some(record.roi)),
        result_status: Set(Some(record.result_status.to_string())),
        review: Set(Some(record.review.clone())),
        satisfaction: Set(Some(record.satisfaction as i32)),
        chart_url: Set(Some(record.chart_url.clone())),
        duration_minutes: Set(Some(record.duration_minutes)),
        memos: Set(Some(memos)),
        ..Default::default()
    })
}

fn to_profile(model: user::Model) -> UserProfile {
    let created_at = parse_timestamp(&model.created_at).unwrap_or_else(Utc::now);
    UserProfile {
        user_id: model.user_id,
        is_premium: model.is_premium,
        exchange_uid: model.exchange_uid,
        created_at,
    }
}

#[async_trait]
impl TradeStore for SqliteJournalStore {
    async fn insert(&self, record: &TradeRecord) -> Result<(), RecordError> {
        validate_for_insert(record)?;
        let model = to_active_model(record)?;

        let inserted = trade::Entity::insert(model)
            .on_conflict(
                OnConflict::column(trade::Column::TradeKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        if inserted == 0 {
            debug!(
                "trade {} already stored for {}, skipping duplicate insert",
                record.trade_key, record.user_id
            );
        }

        Ok(())
    }

    async fn query_all(&self, user_id: &str) -> Result<Vec<TradeRecord>, RecordError> {
        let models = trade::Entity::find()
            .filter(trade::Column::UserId.eq(user_id))
            .order_by_asc(trade::Column::EntryTime)
            .order_by_asc(trade::Column::Id)
            .all(&self.db)
            .await?;

        let mut records: Vec<TradeRecord> = models
            .into_iter()
            .filter_map(|m| {
                let id = m.id;
                match TradeRecord::try_from(m) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping unreadable trade row {} for {}: {}", id, user_id, e);
                        None
                    }
                }
            })
            .collect();

        // 텍스트 정렬이 어긋난 예전 포맷 대비
        records.sort_by_key(|r| r.entry_time);

        Ok(records)
    }
}

#[async_trait]
impl UserStore for SqliteJournalStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, RecordError> {
        let model = user::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?;

        Ok(model.map(to_profile))
    }

    async fn register_user(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<UserProfile, RecordError> {
        let user_id = user_id.trim();
        if user_id.is_empty() || password.trim().is_empty() {
            return Err(RecordError::InvalidRecord(
                "user_id and password are required".to_string(),
            ));
        }

        let salt = new_salt();
        let created_at = Utc::now();
        let model = user::ActiveModel {
            user_id: Set(user_id.to_string()),
            password_hash: Set(hash_password(&salt, password)),
            salt: Set(salt),
            is_premium: Set(false),
            exchange_uid: Set(None),
            created_at: Set(timestamp_text(created_at)),
        };

        let inserted = user::Entity::insert(model)
            .on_conflict(
                OnConflict::column(user::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        if inserted == 0 {
            return Err(RecordError::AlreadyExists(user_id.to_string()));
        }

        info!("Registered user {}", user_id);

        Ok(UserProfile {
            user_id: user_id.to_string(),
            is_premium: false,
            exchange_uid: None,
            created_at,
        })
    }

    async fn verify_user(
        &self,
        user_id: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, RecordError> {
        let model = user::Entity::find_by_id(user_id.trim().to_string())
            .one(&self.db)
            .await?;

        Ok(model
            .filter(|m| verify_password(&m.salt, password, &m.password_hash))
            .map(to_profile))
    }

    async fn submit_exchange_uid(&self, user_id: &str, uid: &str) -> Result<(), RecordError> {
        let uid = uid.trim();
        if uid.is_empty() {
            return Err(RecordError::InvalidRecord("exchange uid is empty".to_string()));
        }

        let result = user::Entity::update_many()
            .col_expr(user::Column::ExchangeUid, Expr::value(uid))
            .filter(user::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RecordError::NotFound(user_id.to_string()));
        }

        info!("Exchange UID submitted by {}", user_id);
        Ok(())
    }
}
