//! Withdraw / transfer / deposit with password confirmation.
//!
//! A session moves `Idle -> AwaitingConfirmation -> Settling -> Idle`.
//! [`TransactionFlow::initiate`] validates the request and parks it on the
//! session; [`TransactionFlow::confirm`] checks the account password and runs
//! the settlement steps one after another. A failed step stops the sequence
//! and earlier steps stay applied.

use crate::application::account_lookup::AccountLookupService;
use crate::application::session::SessionManager;
use crate::domain::error::DomainError;
use crate::domain::models::{
    AccountNumber, Amount, BalanceChange, InitiateTransaction, PendingTransaction, Settlement,
    Transaction, TransactionType, TransactionView,
};
use crate::domain::repository::{TransactionRepository, UserRepository};
use crate::domain::session::FlowState;
use crate::domain::user::{User, UserProfile};
use crate::infrastructure::security::verify_password;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct TransactionFlow<R: UserRepository, T: TransactionRepository> {
    user_repository: Arc<R>,
    transaction_repository: Arc<T>,
    sessions: Arc<SessionManager>,
    lookup: AccountLookupService<R>,
}

fn step_failed(step: &'static str) -> impl FnOnce(anyhow::Error) -> anyhow::Error {
    move |e| {
        error!(step = step, error = %e, "Settlement step failed");
        DomainError::Settlement {
            step,
            reason: e.to_string(),
        }
        .into()
    }
}

impl<R: UserRepository, T: TransactionRepository> TransactionFlow<R, T> {
    pub fn new(
        user_repository: Arc<R>,
        transaction_repository: Arc<T>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            lookup: AccountLookupService::new(user_repository.clone()),
            user_repository,
            transaction_repository,
            sessions,
        }
    }

    async fn current_user(&self, user_id: &str) -> Result<User> {
        self.user_repository
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound.into())
    }

    #[instrument(skip(self, req), fields(kind = %req.kind))]
    pub async fn initiate(
        &self,
        session_id: &str,
        req: InitiateTransaction,
    ) -> Result<PendingTransaction> {
        let session = self.sessions.require(session_id).await?;
        let amount = Amount::parse_positive(&req.amount)?;

        let user = self.current_user(&session.user.id).await?;
        self.sessions
            .refresh_user(session_id, UserProfile::from(&user))
            .await?;

        if req.kind.is_debit() && amount > user.balance {
            warn!(
                amount = amount.inner(),
                balance = user.balance.inner(),
                "Rejected: insufficient funds"
            );
            return Err(DomainError::InsufficientFunds.into());
        }

        let (recipient_account, recipient_name) = if req.kind == TransactionType::Transfer {
            let raw = req
                .recipient_account
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(DomainError::MissingRecipient)?;
            let number = AccountNumber::parse(raw)?;
            if number == user.account_number {
                return Err(DomainError::SelfTransfer.into());
            }
            let recipient = self.lookup.find_by_number(&number).await?;
            (Some(number), Some(recipient.name))
        } else {
            (None, None)
        };

        let description = req.description.trim();
        if description.is_empty() {
            return Err(DomainError::MissingDescription.into());
        }

        let pending = PendingTransaction {
            kind: req.kind,
            amount,
            recipient_account,
            recipient_name,
            description: description.to_string(),
            initiated_at: Utc::now(),
        };
        self.sessions.set_pending(session_id, pending.clone()).await?;

        info!(amount = amount.inner(), "Transaction awaiting password confirmation");
        Ok(pending)
    }

    pub async fn pending(&self, session_id: &str) -> Result<Option<PendingTransaction>> {
        self.sessions.pending(session_id).await
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, session_id: &str) -> Result<Option<PendingTransaction>> {
        let discarded = self.sessions.clear_pending(session_id).await?;
        debug!(discarded = discarded.is_some(), "Pending transaction cancelled");
        Ok(discarded)
    }

    /// Verifies `password` and settles the pending transaction.
    ///
    /// A wrong password, or a balance that no longer covers a debit, leaves the
    /// pending transaction in place and writes nothing.
    #[instrument(skip(self, password))]
    pub async fn confirm(&self, session_id: &str, password: &str) -> Result<Settlement> {
        let session = self.sessions.require(session_id).await?;
        let awaiting = match session.flow {
            FlowState::Idle => return Err(DomainError::NoPendingTransaction.into()),
            FlowState::Settling { .. } => return Err(DomainError::SettlementInProgress.into()),
            FlowState::AwaitingConfirmation { pending } => pending,
        };

        let user = self.current_user(&session.user.id).await?;
        let valid = verify_password(password, &user.password_hash).map_err(|e| {
            error!(error = %e, "Failed to verify password");
            DomainError::Internal(format!("Failed to verify password: {}", e))
        })?;
        if !valid {
            warn!(user_id = %user.id, "Wrong password at transaction confirmation");
            return Err(DomainError::InvalidPassword.into());
        }

        // Balance may have dropped since initiate.
        if awaiting.kind.is_debit() && awaiting.amount > user.balance {
            warn!(
                amount = awaiting.amount.inner(),
                balance = user.balance.inner(),
                "Rejected at confirmation: insufficient funds"
            );
            return Err(DomainError::InsufficientFunds.into());
        }

        let pending = self.sessions.begin_settlement(session_id).await?;
        let settled = self.settle(&user, &pending).await;

        let transaction = match settled {
            Ok(transaction) => transaction,
            Err(e) => {
                if let Err(reset) = self.sessions.finish_settlement(session_id, None).await {
                    warn!(error = %reset, "Failed to reset session after settlement error");
                }
                return Err(e);
            }
        };

        let reloaded = self.reload(&user.id).await;
        self.sessions
            .finish_settlement(session_id, reloaded.as_ref().ok().map(|(p, _)| p.clone()))
            .await?;
        let (profile, history) = reloaded?;

        info!(
            transaction_id = %transaction.id,
            balance = profile.balance.inner(),
            "Transaction settled"
        );
        Ok(Settlement {
            message: success_message(&pending),
            transaction: TransactionView::from(&transaction),
            balance: profile.balance,
            balance_display: profile.balance.to_string(),
            transactions: history,
        })
    }

    async fn settle(&self, user: &User, pending: &PendingTransaction) -> Result<Transaction> {
        let transaction = Transaction::new(
            &user.id,
            pending.kind,
            pending.amount,
            pending.recipient_account.clone(),
            pending.description.clone(),
        );
        self.transaction_repository
            .insert(transaction.clone())
            .await
            .map_err(step_failed("record transaction"))?;

        let balance = self
            .user_repository
            .adjust_balance(
                &user.id,
                BalanceChange::for_transaction(pending.kind, pending.amount),
            )
            .await
            .map_err(step_failed("update balance"))?;
        debug!(balance = balance.inner(), "Sender balance updated");

        if let (TransactionType::Transfer, Some(number)) = (pending.kind, &pending.recipient_account)
        {
            let recipient = self
                .lookup
                .find_by_number(number)
                .await
                .map_err(step_failed("resolve recipient"))?;
            self.user_repository
                .adjust_balance(&recipient.id, BalanceChange::Credit(pending.amount))
                .await
                .map_err(step_failed("credit recipient"))?;
            let mirrored = Transaction::new(
                &recipient.id,
                TransactionType::Deposit,
                pending.amount,
                None,
                format!(
                    "{} (from {})",
                    pending.description,
                    user.account_number.masked()
                ),
            );
            self.transaction_repository
                .insert(mirrored)
                .await
                .map_err(step_failed("record recipient deposit"))?;
        }

        Ok(transaction)
    }

    async fn reload(&self, user_id: &str) -> Result<(UserProfile, Vec<TransactionView>)> {
        let profile = UserProfile::from(&self.current_user(user_id).await?);
        let history = self
            .transaction_repository
            .list_for_user(user_id)
            .await?
            .iter()
            .map(TransactionView::from)
            .collect();
        Ok((profile, history))
    }
}

fn success_message(pending: &PendingTransaction) -> String {
    match (pending.kind, &pending.recipient_account) {
        (TransactionType::Transfer, Some(number)) => format!(
            "{} has been transferred to account {}.",
            pending.amount,
            number.masked()
        ),
        (TransactionType::Withdrawal, _) => {
            format!("{} has been withdrawn from your account.", pending.amount)
        }
        _ => format!("{} has been deposited to your account.", pending.amount),
    }
}
