use crate::domain::models::PendingTransaction;
use crate::domain::user::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a session stands in the guarded transaction flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Idle,
    AwaitingConfirmation { pending: PendingTransaction },
    Settling { pending: PendingTransaction },
}

impl FlowState {
    pub fn pending(&self) -> Option<&PendingTransaction> {
        match self {
            FlowState::Idle => None,
            FlowState::AwaitingConfirmation { pending } | FlowState::Settling { pending } => {
                Some(pending)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user: UserProfile,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub flow: FlowState,
}
