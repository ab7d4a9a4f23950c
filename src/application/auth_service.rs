use crate::application::session::SessionManager;
use crate::domain::error::DomainError;
use crate::domain::models::{AccountNumber, Amount};
use crate::domain::repository::UserRepository;
use crate::domain::user::{CreateUser, LoginRequest, SeedUser, User, UserProfile};
use crate::infrastructure::security::{generate_token, hash_password, verify_password};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;
const ACCOUNT_NUMBER_ATTEMPTS: usize = 16;

/// Emails are stored and looked up trimmed and lowercased.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize)]
pub struct Authenticated {
    pub user: UserProfile,
    pub session_id: String,
    pub access_token: String,
}

pub struct AuthService<R: UserRepository> {
    user_repository: Arc<R>,
    sessions: Arc<SessionManager>,
    jwt_secret: String,
}

impl<R: UserRepository> AuthService<R> {
    pub fn new(user_repository: Arc<R>, sessions: Arc<SessionManager>, jwt_secret: String) -> Self {
        Self {
            user_repository,
            sessions,
            jwt_secret,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Creates the user and signs them in.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register_user(&self, req: CreateUser) -> Result<Authenticated> {
        trace!("Starting user registration");
        let name = req.name.trim();
        let email = normalize_email(&req.email);
        if name.is_empty() {
            return Err(DomainError::Validation("Name is required".to_string()).into());
        }
        if !email.contains('@') {
            return Err(DomainError::Validation("A valid email is required".to_string()).into());
        }
        if req.password.len() < MIN_PASSWORD_LEN {
            return Err(DomainError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            ))
            .into());
        }

        let user = self
            .create_user(name, &email, &req.password, None, Amount::ZERO, false)
            .await?;
        info!(user_id = %user.id, account_number = %user.account_number, "User registered");

        self.start_session(&user).await
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(&self, req: LoginRequest) -> Result<Authenticated> {
        trace!("Starting login");
        let invalid = || DomainError::Unauthorized("Invalid email or password".to_string());

        let user = self
            .user_repository
            .find_user_by_email(&normalize_email(&req.email))
            .await?
            .ok_or_else(|| {
                warn!("User not found during login");
                invalid()
            })?;

        let is_valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
            error!(error = %e, "Failed to verify password");
            DomainError::Internal(format!("Failed to verify password: {}", e))
        })?;
        if !is_valid {
            warn!(user_id = %user.id, "Invalid password during login");
            return Err(invalid().into());
        }

        let authenticated = self.start_session(&user).await?;
        info!(user_id = %user.id, "Login successful");
        Ok(authenticated)
    }

    #[instrument(skip(self))]
    pub async fn logout(&self, session_id: &str) -> Result<()> {
        if !self.sessions.close(session_id).await? {
            debug!("Logout for a session that was already closed");
        }
        Ok(())
    }

    /// Inserts a user from the startup seed file. Existing emails are skipped.
    #[instrument(skip(self, seed), fields(email = %seed.email))]
    pub async fn seed_user(&self, seed: SeedUser) -> Result<Option<User>> {
        let email = normalize_email(&seed.email);
        if self
            .user_repository
            .find_user_by_email(&email)
            .await?
            .is_some()
        {
            debug!("Seed user already exists");
            return Ok(None);
        }
        let balance = match seed.balance.as_deref() {
            Some(raw) => Amount::parse(raw)?,
            None => Amount::ZERO,
        };
        let user = self
            .create_user(
                &seed.name,
                &email,
                &seed.password,
                seed.account_number,
                balance,
                seed.is_admin,
            )
            .await?;
        Ok(Some(user))
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        account_number: Option<AccountNumber>,
        balance: Amount,
        is_admin: bool,
    ) -> Result<User> {
        if self
            .user_repository
            .find_user_by_email(email)
            .await?
            .is_some()
        {
            warn!(email = email, "User already exists");
            return Err(
                DomainError::Validation("User with this email already exists".to_string()).into(),
            );
        }

        let account_number = match account_number {
            Some(number) => number,
            None => self.allocate_account_number().await?,
        };

        let password_hash = hash_password(password).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            DomainError::Internal(format!("Failed to hash password: {}", e))
        })?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            account_number,
            balance,
            is_admin,
        };
        self.user_repository.save_user(user.clone()).await?;
        Ok(user)
    }

    async fn allocate_account_number(&self) -> Result<AccountNumber> {
        for _ in 0..ACCOUNT_NUMBER_ATTEMPTS {
            let candidate = AccountNumber::generate();
            if self
                .user_repository
                .find_user_by_account_number(&candidate)
                .await?
                .is_none()
            {
                return Ok(candidate);
            }
        }
        Err(DomainError::Internal("Could not allocate an account number".to_string()).into())
    }

    async fn start_session(&self, user: &User) -> Result<Authenticated> {
        let session = self.sessions.open(UserProfile::from(user)).await?;
        let access_token =
            generate_token(&user.id, &session.session_id, &self.jwt_secret).map_err(|e| {
                error!(error = %e, "Failed to generate token");
                DomainError::Internal(format!("Failed to generate token: {}", e))
            })?;

        Ok(Authenticated {
            user: session.user,
            session_id: session.session_id,
            access_token,
        })
    }
}
