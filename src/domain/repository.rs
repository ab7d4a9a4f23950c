use crate::domain::models::{AccountNumber, Amount, BalanceChange, Transaction};
use crate::domain::session::SessionRecord;
use crate::domain::user::User;
use anyhow::Result;
use async_trait::async_trait;

/// `Users` table of the external data service.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn save_user(&self, user: User) -> Result<()>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>>;
    async fn find_user_by_account_number(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Option<User>>;
    /// Applies the change atomically and returns the new balance.
    async fn adjust_balance(&self, id: &str, change: BalanceChange) -> Result<Amount>;
}

/// `transactions` table of the external data service.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, transaction: Transaction) -> Result<()>;
    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Transaction>>;
}

/// Local persistent storage for sessions, read at startup.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Vec<SessionRecord>>;
    async fn persist(&self, sessions: &[SessionRecord]) -> Result<()>;
}
