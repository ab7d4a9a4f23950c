use crate::domain::error::DomainError;
use crate::domain::models::AccountNumber;
use crate::domain::repository::UserRepository;
use crate::domain::transfer_form::LookupOutcome;
use crate::domain::user::User;
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, instrument};

pub struct AccountLookupService<R: UserRepository> {
    user_repository: Arc<R>,
}

impl<R: UserRepository> AccountLookupService<R> {
    pub fn new(user_repository: Arc<R>) -> Self {
        Self { user_repository }
    }

    /// Finds the holder of `account_number`.
    ///
    /// Fails with [`DomainError::MalformedAccountNumber`] for input that is not
    /// ten digits and [`DomainError::RecipientNotFound`] when no account matches.
    /// Data service errors are passed through unchanged.
    pub async fn find_account(&self, account_number: &str) -> Result<User> {
        let number = AccountNumber::parse(account_number)?;
        self.find_by_number(&number).await
    }

    pub async fn find_by_number(&self, number: &AccountNumber) -> Result<User> {
        self.user_repository
            .find_user_by_account_number(number)
            .await?
            .ok_or_else(|| DomainError::RecipientNotFound.into())
    }

    #[instrument(skip(self))]
    pub async fn lookup(&self, account_number: &str) -> LookupOutcome {
        match self.find_account(account_number).await {
            Ok(user) => {
                info!(account_number = %user.account_number, "Account lookup matched");
                LookupOutcome::Found { name: user.name }
            }
            Err(e) => match e.downcast_ref::<DomainError>() {
                Some(DomainError::MalformedAccountNumber) => LookupOutcome::Malformed,
                Some(DomainError::RecipientNotFound) => LookupOutcome::NotFound,
                _ => {
                    error!(error = %e, "Account lookup failed");
                    LookupOutcome::Failed
                }
            },
        }
    }
}
