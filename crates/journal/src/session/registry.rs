use interface::UserProfile;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use super::{UserSession, Workflow, WorkflowError};

pub type SharedSession = Arc<Mutex<UserSession>>;

struct SessionEntry {
    session: SharedSession,
    last_seen: Instant,
}

/// 사용자별 세션 보관소. 같은 사용자의 전이는 세션 뮤텍스로 직렬화된다.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세션 조회, 마지막 사용 시각 갱신
    pub async fn get(&self, user_id: &str) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(user_id)?;
        entry.last_seen = Instant::now();
        Some(entry.session.clone())
    }

    /// 로그인 처리. 기존 세션이 있으면 진행 중인 단계는 유지하고 기록과 등급만 갱신한다.
    pub async fn login(
        &self,
        workflow: &Workflow,
        profile: &UserProfile,
    ) -> Result<SharedSession, WorkflowError> {
        let fresh = workflow.open_session(profile).await?;

        let existing = self.get(&profile.user_id).await;
        if let Some(existing) = existing {
            let mut session = existing.lock().await;
            session.is_premium = fresh.is_premium;
            session.full_history = fresh.full_history;
            drop(session);
            return Ok(existing);
        }

        info!(
            "Session opened: user={}, trades={}",
            profile.user_id,
            fresh.full_history.len()
        );
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(profile.user_id.clone())
            .or_insert_with(|| SessionEntry {
                session: Arc::new(Mutex::new(fresh)),
                last_seen: Instant::now(),
            });
        Ok(entry.session.clone())
    }

    /// 세션 제거. 진행 중이던 초안도 함께 버려진다.
    pub async fn logout(&self, user_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(user_id).is_some();
        if removed {
            info!("Session closed: user={}", user_id);
        }
        removed
    }

    /// `max_idle` 이상 사용되지 않은 세션 제거, 제거된 수 반환
    pub async fn evict_idle(&self, max_idle: Duration, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_seen) < max_idle);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
