use crate::application::auth_service::Authenticated;
use crate::domain::user::{CreateUser, LoginRequest, UserProfile};
use crate::presentation::handlers::{AppState, BankError};
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserProfile,
}

impl From<Authenticated> for AuthResponse {
    fn from(auth: Authenticated) -> Self {
        Self {
            access_token: auth.access_token,
            token_type: "Bearer".to_string(),
            user: auth.user,
        }
    }
}

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(
    state: web::Data<AppState>,
    req: web::Json<CreateUser>,
) -> Result<HttpResponse, BankError> {
    info!("Registration request received");

    let auth = state
        .auth_service
        .register_user(req.into_inner())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to register user");
            BankError::from(e)
        })?;

    info!(user_id = %auth.user.id, account_number = %auth.user.account_number, "User registered successfully");
    Ok(HttpResponse::Created().json(AuthResponse::from(auth)))
}

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn login(
    state: web::Data<AppState>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, BankError> {
    info!("Login request received");

    let auth = state
        .auth_service
        .login(req.into_inner())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to login");
            BankError::from(e)
        })?;

    info!(user_id = %auth.user.id, "Login successful");
    Ok(HttpResponse::Ok().json(AuthResponse::from(auth)))
}

#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn logout(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, BankError> {
    state.auth_service.logout(&user.session_id).await?;
    info!("Logout successful");
    Ok(HttpResponse::NoContent().finish())
}
