use crate::domain::error::DomainError;
use crate::domain::models::{AccountNumber, Amount, BalanceChange};
use crate::domain::repository::UserRepository;
use crate::domain::user::User;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace};

#[derive(Clone)]
pub struct InMemoryUserRepository {
    storage: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id, email = %user.email))]
    async fn save_user(&self, user: User) -> Result<()> {
        trace!("Acquiring write lock for user storage");
        let mut storage = self.storage.write().await;
        if storage
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(
                DomainError::Validation("User with this email already exists".to_string()).into(),
            );
        }
        let duplicate_account = storage
            .values()
            .any(|u| u.id != user.id && u.account_number == user.account_number);
        if duplicate_account {
            return Err(DomainError::Validation(format!(
                "Account number {} is already in use",
                user.account_number
            ))
            .into());
        }
        storage.insert(user.id.clone(), user.clone());
        debug!(
            user_id = %user.id,
            account_number = %user.account_number,
            "User saved to memory storage"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(email = email))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        trace!("Acquiring read lock for user storage");
        let storage = self.storage.read().await;
        let user = storage.values().find(|u| u.email == email).cloned();
        match &user {
            Some(u) => debug!(user_id = %u.id, "User found by email"),
            None => trace!(email = email, "User not found in storage"),
        }
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = id))]
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let storage = self.storage.read().await;
        Ok(storage.get(id).cloned())
    }

    #[instrument(skip(self), fields(account_number = %account_number))]
    async fn find_user_by_account_number(
        &self,
        account_number: &AccountNumber,
    ) -> Result<Option<User>> {
        let storage = self.storage.read().await;
        let user = storage
            .values()
            .find(|u| &u.account_number == account_number)
            .cloned();
        trace!(found = user.is_some(), "Account number lookup finished");
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = id))]
    async fn adjust_balance(&self, id: &str, change: BalanceChange) -> Result<Amount> {
        let mut storage = self.storage.write().await;
        let user = storage.get_mut(id).ok_or(DomainError::AccountNotFound)?;
        let new_balance = change.apply(user.balance)?;
        user.balance = new_balance;
        debug!(
            user_id = id,
            balance = new_balance.inner(),
            "Balance adjusted"
        );
        Ok(new_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, email: &str, account: &str) -> User {
        User {
            id: id.to_string(),
            name: format!("Name {}", id),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            account_number: AccountNumber::parse(account).unwrap(),
            balance: Amount::new(10_000),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_save_user_saves_user_correctly() {
        let repo = InMemoryUserRepository::new();
        let alice = user("user-1", "alice@example.com", "1000000001");

        repo.save_user(alice.clone()).await.unwrap();

        let retrieved = repo.find_user_by_id("user-1").await.unwrap().unwrap();
        assert_eq!(retrieved.email, alice.email);
        assert_eq!(retrieved.account_number, alice.account_number);
        assert_eq!(retrieved.balance, Amount::new(10_000));
    }

    #[tokio::test]
    async fn test_find_user_by_email_is_case_sensitive() {
        let repo = InMemoryUserRepository::new();
        repo.save_user(user("user-2", "Test@Example.com", "1000000002"))
            .await
            .unwrap();

        assert!(repo.find_user_by_email("Test@Example.com").await.unwrap().is_some());
        assert!(repo.find_user_by_email("test@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_user_by_account_number() {
        let repo = InMemoryUserRepository::new();
        repo.save_user(user("user-3", "bob@example.com", "1000000003"))
            .await
            .unwrap();

        let found = repo
            .find_user_by_account_number(&AccountNumber::parse("1000000003").unwrap())
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, "user-3");

        let missing = repo
            .find_user_by_account_number(&AccountNumber::parse("9999999999").unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_save_user_rejects_duplicate_account_number() {
        let repo = InMemoryUserRepository::new();
        repo.save_user(user("user-4", "a@example.com", "1000000004"))
            .await
            .unwrap();

        let result = repo
            .save_user(user("user-5", "b@example.com", "1000000004"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_save_user_rejects_duplicate_email() {
        let repo = InMemoryUserRepository::new();
        repo.save_user(user("user-8", "same@example.com", "1000000008"))
            .await
            .unwrap();

        let err = repo
            .save_user(user("user-9", "same@example.com", "1000000009"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Validation(_))
        ));

        // Re-saving the same user is an update, not a duplicate
        repo.save_user(user("user-8", "same@example.com", "1000000008"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_adjust_balance_credit_and_debit() {
        let repo = InMemoryUserRepository::new();
        repo.save_user(user("user-6", "c@example.com", "1000000006"))
            .await
            .unwrap();

        let balance = repo
            .adjust_balance("user-6", BalanceChange::Credit(Amount::new(2_500)))
            .await
            .unwrap();
        assert_eq!(balance, Amount::new(12_500));

        let balance = repo
            .adjust_balance("user-6", BalanceChange::Debit(Amount::new(12_500)))
            .await
            .unwrap();
        assert_eq!(balance, Amount::ZERO);

        let err = repo
            .adjust_balance("user-6", BalanceChange::Debit(Amount::new(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::InsufficientFunds)
        ));
    }

    #[tokio::test]
    async fn test_adjust_balance_unknown_user() {
        let repo = InMemoryUserRepository::new();
        let err = repo
            .adjust_balance("ghost", BalanceChange::Credit(Amount::new(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_credits_are_not_lost() {
        let repo = InMemoryUserRepository::new();
        repo.save_user(user("user-7", "d@example.com", "1000000007"))
            .await
            .unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let repo_clone = repo.clone();
                tokio::spawn(async move {
                    repo_clone
                        .adjust_balance("user-7", BalanceChange::Credit(Amount::new(100)))
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let stored = repo.find_user_by_id("user-7").await.unwrap().unwrap();
        assert_eq!(stored.balance, Amount::new(12_000));
    }
}
