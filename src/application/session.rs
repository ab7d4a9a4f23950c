use crate::domain::error::DomainError;
use crate::domain::models::PendingTransaction;
use crate::domain::repository::SessionStore;
use crate::domain::session::{FlowState, SessionRecord};
use crate::domain::user::UserProfile;
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Owns every live session and mirrors them to a [`SessionStore`].
///
/// A user has at most one session: opening a new one replaces the old.
/// Closing a session removes it from memory and from the store, after which
/// its token is rejected.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

fn session_gone() -> anyhow::Error {
    DomainError::Unauthorized("Session expired or logged out".to_string()).into()
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Loads persisted sessions. A session caught mid-settlement is reset to idle.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<usize> {
        let records = self.store.load().await?;
        let mut sessions = self.sessions.write().await;
        sessions.clear();
        for mut record in records {
            if let FlowState::Settling { .. } = record.flow {
                warn!(
                    session_id = %record.session_id,
                    "Session was interrupted while settling; resetting to idle"
                );
                record.flow = FlowState::Idle;
            }
            sessions.insert(record.session_id.clone(), record);
        }
        let count = sessions.len();
        info!(count = count, "Sessions restored");
        Ok(count)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn open(&self, user: UserProfile) -> Result<SessionRecord> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user.id != user.id);
        if sessions.len() != before {
            debug!("Replacing previous session for user");
        }

        let record = SessionRecord {
            session_id: Uuid::new_v4().to_string(),
            user,
            created_at: Utc::now(),
            flow: FlowState::Idle,
        };
        sessions.insert(record.session_id.clone(), record.clone());
        self.persist(&sessions).await?;

        info!(session_id = %record.session_id, "Session opened");
        Ok(record)
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn is_active(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn require(&self, session_id: &str) -> Result<SessionRecord> {
        self.get(session_id).await.ok_or_else(session_gone)
    }

    #[instrument(skip(self, user))]
    pub async fn refresh_user(&self, session_id: &str, user: UserProfile) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.get_mut(session_id).ok_or_else(session_gone)?;
        record.user = user;
        self.persist(&sessions).await
    }

    /// Returns whether a session was actually removed.
    #[instrument(skip(self))]
    pub async fn close(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(session_id).is_some();
        if removed {
            self.persist(&sessions).await?;
            info!("Session closed");
        }
        Ok(removed)
    }

    /// Stores a new pending transaction, replacing any earlier one.
    #[instrument(skip(self, pending))]
    pub async fn set_pending(&self, session_id: &str, pending: PendingTransaction) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.get_mut(session_id).ok_or_else(session_gone)?;
        if let FlowState::Settling { .. } = record.flow {
            return Err(DomainError::SettlementInProgress.into());
        }
        record.flow = FlowState::AwaitingConfirmation { pending };
        self.persist(&sessions).await
    }

    pub async fn pending(&self, session_id: &str) -> Result<Option<PendingTransaction>> {
        let record = self.require(session_id).await?;
        Ok(record.flow.pending().cloned())
    }

    /// Discards the pending transaction. Not allowed while settling.
    #[instrument(skip(self))]
    pub async fn clear_pending(&self, session_id: &str) -> Result<Option<PendingTransaction>> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.get_mut(session_id).ok_or_else(session_gone)?;
        let discarded = match std::mem::take(&mut record.flow) {
            FlowState::Idle => None,
            FlowState::AwaitingConfirmation { pending } => Some(pending),
            settling @ FlowState::Settling { .. } => {
                record.flow = settling;
                return Err(DomainError::SettlementInProgress.into());
            }
        };
        self.persist(&sessions).await?;
        Ok(discarded)
    }

    /// `AwaitingConfirmation -> Settling`, handing the pending transaction to the caller.
    #[instrument(skip(self))]
    pub async fn begin_settlement(&self, session_id: &str) -> Result<PendingTransaction> {
        let mut sessions = self.sessions.write().await;
        let record = sessions.get_mut(session_id).ok_or_else(session_gone)?;
        let pending = match &record.flow {
            FlowState::Idle => return Err(DomainError::NoPendingTransaction.into()),
            FlowState::Settling { .. } => return Err(DomainError::SettlementInProgress.into()),
            FlowState::AwaitingConfirmation { pending } => pending.clone(),
        };
        record.flow = FlowState::Settling {
            pending: pending.clone(),
        };
        self.persist(&sessions).await?;
        Ok(pending)
    }

    /// `Settling -> Idle`, optionally refreshing the cached user.
    #[instrument(skip(self, user))]
    pub async fn finish_settlement(
        &self,
        session_id: &str,
        user: Option<UserProfile>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let Some(record) = sessions.get_mut(session_id) else {
            // Logged out mid-settlement; nothing left to reset.
            return Ok(());
        };
        record.flow = FlowState::Idle;
        if let Some(user) = user {
            record.user = user;
        }
        self.persist(&sessions).await
    }

    async fn persist(&self, sessions: &HashMap<String, SessionRecord>) -> Result<()> {
        let snapshot: Vec<SessionRecord> = sessions.values().cloned().collect();
        self.store.persist(&snapshot).await.inspect_err(|e| {
            warn!(error = %e, "Failed to persist sessions");
        })
    }
}
