use crate::application::account_lookup::AccountLookupService;
use crate::application::auth_service::AuthService;
use crate::application::service::BankService;
use crate::application::session::SessionManager;
use crate::application::transaction_flow::TransactionFlow;
use crate::data::transaction_repository::InMemoryTransactionRepository;
use crate::data::user_repository::InMemoryUserRepository;
use crate::domain::error::DomainError;
use crate::domain::models::{AdminDeposit, ConfirmTransaction, InitiateTransaction};
use crate::domain::transfer_form::AccountLookup;
use crate::infrastructure::geolocation::GeoLocator;
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::{FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError, web};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub type Users = InMemoryUserRepository;
pub type Transactions = InMemoryTransactionRepository;

pub struct AppState {
    pub service: BankService<Users, Transactions>,
    pub flow: TransactionFlow<Users, Transactions>,
    pub lookup: AccountLookupService<Users>,
    pub auth_service: Arc<AuthService<Users>>,
}

impl AppState {
    pub fn new(
        users: Arc<Users>,
        transactions: Arc<Transactions>,
        sessions: Arc<SessionManager>,
        geolocator: Arc<dyn GeoLocator>,
        geo_timeout: Duration,
        jwt_secret: String,
    ) -> Self {
        Self {
            service: BankService::new(users.clone(), transactions.clone(), geolocator, geo_timeout),
            flow: TransactionFlow::new(users.clone(), transactions, sessions.clone()),
            lookup: AccountLookupService::new(users.clone()),
            auth_service: Arc::new(AuthService::new(users, sessions, jwt_secret)),
        }
    }
}

// Uniform error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum BankError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Transaction failed: {0}")]
    SettlementFailed(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BankError {
    fn message(&self) -> String {
        match self {
            BankError::InsufficientFunds => {
                "You don't have enough balance for this transaction.".to_string()
            }
            BankError::InvalidPassword => {
                "Please enter the correct password to proceed.".to_string()
            }
            BankError::Validation(msg)
            | BankError::NotFound(msg)
            | BankError::Unauthorized(msg)
            | BankError::Forbidden(msg)
            | BankError::Conflict(msg)
            | BankError::SettlementFailed(msg)
            | BankError::Database(msg)
            | BankError::Internal(msg) => msg.clone(),
        }
    }
}

impl ResponseError for BankError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            BankError::Validation(_) => StatusCode::BAD_REQUEST,
            BankError::NotFound(_) => StatusCode::NOT_FOUND,
            BankError::InsufficientFunds => StatusCode::BAD_REQUEST,
            BankError::InvalidPassword => StatusCode::FORBIDDEN,
            BankError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BankError::Forbidden(_) => StatusCode::FORBIDDEN,
            BankError::Conflict(_) => StatusCode::CONFLICT,
            BankError::SettlementFailed(_) => StatusCode::BAD_GATEWAY,
            BankError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BankError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_msg = self.to_string();

        // Log error based on severity
        if status.is_server_error() {
            error!(error = %error_msg, status = %status, "Request failed");
        } else {
            warn!(error = %error_msg, status = %status, "Request rejected");
        }

        let error_response = ErrorResponse {
            error: error_msg,
            details: serde_json::json!({ "message": self.message() }),
        };

        HttpResponse::build(status).json(error_response)
    }
}

impl From<anyhow::Error> for BankError {
    fn from(err: anyhow::Error) -> Self {
        let Some(domain) = err.downcast_ref::<DomainError>() else {
            return BankError::Database(err.to_string());
        };
        match domain {
            DomainError::InsufficientFunds => BankError::InsufficientFunds,
            DomainError::InvalidPassword => BankError::InvalidPassword,
            DomainError::AccountNotFound | DomainError::RecipientNotFound => {
                BankError::NotFound(domain.to_string())
            }
            DomainError::InvalidAmount(_)
            | DomainError::MissingRecipient
            | DomainError::MalformedAccountNumber
            | DomainError::SelfTransfer
            | DomainError::MissingDescription => BankError::Validation(domain.to_string()),
            DomainError::NoPendingTransaction | DomainError::SettlementInProgress => {
                BankError::Conflict(domain.to_string())
            }
            DomainError::Settlement { .. } => BankError::SettlementFailed(domain.to_string()),
            DomainError::Validation(msg) => BankError::Validation(msg.clone()),
            DomainError::NotFound(msg) => BankError::NotFound(msg.clone()),
            DomainError::Unauthorized(msg) => BankError::Unauthorized(msg.clone()),
            DomainError::Forbidden(msg) => BankError::Forbidden(msg.clone()),
            DomainError::Internal(msg) => BankError::Internal(msg.clone()),
        }
    }
}

// AuthenticatedUser extractor
impl FromRequest for AuthenticatedUser {
    type Error = BankError;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let user = req.extensions().get::<AuthenticatedUser>().cloned();
        Box::pin(async move {
            user.ok_or_else(|| BankError::Unauthorized("User not authenticated".to_string()))
        })
    }
}

fn client_ip(req: &HttpRequest) -> Option<String> {
    let info = req.connection_info();
    let raw = info.realip_remote_addr()?;
    Some(
        raw.parse::<SocketAddr>()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|_| raw.to_string()),
    )
}

// Handlers

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[instrument]
pub async fn health_check() -> HttpResponse {
    info!("Health check requested");
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };
    HttpResponse::Ok().json(response)
}

#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn me(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, BankError> {
    let profile = state.service.profile(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[instrument(skip(state, user, req), fields(user_id = %user.user_id))]
pub async fn dashboard(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: HttpRequest,
) -> Result<HttpResponse, BankError> {
    let ip = client_ip(&req);
    let dashboard = state
        .service
        .dashboard(&user.user_id, ip.as_deref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load dashboard");
            e
        })?;
    info!(
        balance = dashboard.user.balance.inner(),
        transactions = dashboard.transactions.len(),
        "Dashboard loaded"
    );
    Ok(HttpResponse::Ok().json(dashboard))
}

#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_transactions(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, BankError> {
    let transactions = state.service.transactions(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

#[instrument(skip(state, _user), fields(account_number = %*path))]
pub async fn lookup_account(
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, BankError> {
    let account_number = path.into_inner();
    let outcome = state.lookup.lookup(&account_number).await;
    Ok(HttpResponse::Ok().json(AccountLookup::new(&account_number, &outcome)))
}

#[instrument(skip(state, user, req), fields(user_id = %user.user_id, kind = %req.kind))]
pub async fn initiate_transaction(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<InitiateTransaction>,
) -> Result<HttpResponse, BankError> {
    info!(amount = %req.amount, "Initiating transaction");
    let pending = state
        .flow
        .initiate(&user.session_id, req.into_inner())
        .await
        .map_err(|e| {
            warn!(error = %e, "Transaction initiation rejected");
            e
        })?;
    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "pending": pending,
        "prompt": pending.prompt(),
    })))
}

#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn pending_transaction(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, BankError> {
    match state.flow.pending(&user.session_id).await? {
        Some(pending) => Ok(HttpResponse::Ok().json(pending)),
        None => Err(BankError::NotFound(
            "No transaction is awaiting confirmation".to_string(),
        )),
    }
}

#[instrument(skip(state, user, req), fields(user_id = %user.user_id))]
pub async fn confirm_transaction(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<ConfirmTransaction>,
) -> Result<HttpResponse, BankError> {
    let settlement = state
        .flow
        .confirm(&user.session_id, &req.password)
        .await
        .map_err(|e| {
            error!(error = %e, "Transaction confirmation failed");
            e
        })?;
    info!(
        transaction_id = %settlement.transaction.id,
        balance = settlement.balance.inner(),
        "Transaction completed successfully"
    );
    Ok(HttpResponse::Ok().json(settlement))
}

#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn cancel_transaction(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, BankError> {
    state.flow.cancel(&user.session_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[instrument(skip(state, user, req), fields(user_id = %user.user_id))]
pub async fn admin_deposit(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<AdminDeposit>,
) -> Result<HttpResponse, BankError> {
    let receipt = state
        .service
        .admin_deposit(&user.user_id, req.into_inner())
        .await?;
    info!(account_number = %receipt.account_number, "Admin deposit completed");
    Ok(HttpResponse::Created().json(receipt))
}
