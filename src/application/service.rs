use crate::application::account_lookup::AccountLookupService;
use crate::domain::error::DomainError;
use crate::domain::models::{
    AdminDeposit, Amount, BalanceChange, QuickStats, Transaction, TransactionType, TransactionView,
};
use crate::domain::repository::{TransactionRepository, UserRepository};
use crate::domain::user::{User, UserProfile};
use crate::infrastructure::geolocation::{GeoInfo, GeoLocator};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub user: UserProfile,
    pub balance_display: String,
    pub transactions: Vec<TransactionView>,
    pub stats: QuickStats,
    pub location: Option<GeoInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDepositReceipt {
    pub account_number: String,
    pub account_holder: String,
    pub transaction: TransactionView,
    pub message: String,
}

/// Read side of the dashboard plus the admin deposit.
pub struct BankService<R: UserRepository, T: TransactionRepository> {
    user_repository: Arc<R>,
    transaction_repository: Arc<T>,
    lookup: AccountLookupService<R>,
    geolocator: Arc<dyn GeoLocator>,
    geo_timeout: Duration,
}

impl<R: UserRepository, T: TransactionRepository> BankService<R, T> {
    pub fn new(
        user_repository: Arc<R>,
        transaction_repository: Arc<T>,
        geolocator: Arc<dyn GeoLocator>,
        geo_timeout: Duration,
    ) -> Self {
        Self {
            lookup: AccountLookupService::new(user_repository.clone()),
            user_repository,
            transaction_repository,
            geolocator,
            geo_timeout,
        }
    }

    async fn user(&self, user_id: &str) -> Result<User> {
        self.user_repository
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound.into())
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile> {
        Ok(UserProfile::from(&self.user(user_id).await?))
    }

    #[instrument(skip(self))]
    pub async fn transactions(&self, user_id: &str) -> Result<Vec<TransactionView>> {
        let rows = self.transaction_repository.list_for_user(user_id).await?;
        Ok(rows.iter().map(TransactionView::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, user_id: &str, client_ip: Option<&str>) -> Result<Dashboard> {
        let user = UserProfile::from(&self.user(user_id).await?);
        let rows = self.transaction_repository.list_for_user(user_id).await?;
        let stats = QuickStats::from_transactions(&rows);
        let location = self.locate(client_ip).await;

        debug!(transactions = rows.len(), "Dashboard assembled");
        Ok(Dashboard {
            balance_display: user.balance.to_string(),
            user,
            transactions: rows.iter().map(TransactionView::from).collect(),
            stats,
            location,
        })
    }

    /// Best effort: any failure or timeout yields `None`.
    async fn locate(&self, client_ip: Option<&str>) -> Option<GeoInfo> {
        match tokio::time::timeout(self.geo_timeout, self.geolocator.locate(client_ip)).await {
            Ok(Ok(info)) => Some(info),
            Ok(Err(e)) => {
                debug!(error = %e, "IP lookup failed; ignoring");
                None
            }
            Err(_) => {
                debug!("IP lookup timed out; ignoring");
                None
            }
        }
    }

    /// Credits any account. Only users flagged as admin may call this.
    #[instrument(skip(self, req), fields(account_number = %req.account_number))]
    pub async fn admin_deposit(&self, admin_id: &str, req: AdminDeposit) -> Result<AdminDepositReceipt> {
        let admin = self.user(admin_id).await?;
        if !admin.is_admin {
            warn!(user_id = admin_id, "Non-admin attempted an admin deposit");
            return Err(DomainError::Forbidden("Admin access required".to_string()).into());
        }

        let amount = Amount::parse_positive(&req.amount)?;
        let description = req.description.trim();
        if description.is_empty() {
            return Err(DomainError::MissingDescription.into());
        }
        let target = self
            .lookup
            .find_account(&req.account_number)
            .await
            .map_err(|e| {
                if matches!(e.downcast_ref::<DomainError>(), Some(DomainError::RecipientNotFound)) {
                    DomainError::AccountNotFound.into()
                } else {
                    e
                }
            })?;

        let transaction = Transaction::new(
            &target.id,
            TransactionType::Deposit,
            amount,
            None,
            description.to_string(),
        );
        let view = TransactionView::from(&transaction);
        self.transaction_repository.insert(transaction).await?;
        self.user_repository
            .adjust_balance(&target.id, BalanceChange::Credit(amount))
            .await?;

        info!(
            admin_id = admin_id,
            target_id = %target.id,
            amount = amount.inner(),
            "Admin deposit completed"
        );
        Ok(AdminDepositReceipt {
            message: format!(
                "{} has been deposited to account {}.",
                amount, target.account_number
            ),
            account_number: target.account_number.to_string(),
            account_holder: target.name,
            transaction: view,
        })
    }
}
