use crate::domain::models::{AccountNumber, Amount};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub account_number: AccountNumber,
    pub balance: Amount,
    #[serde(default)]
    pub is_admin: bool,
}

/// Password-free view of a user, held in sessions and returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub account_number: AccountNumber,
    pub balance: Amount,
    pub is_admin: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            account_number: user.account_number.clone(),
            balance: user.balance,
            is_admin: user.is_admin,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Entry of the optional seed file loaded at startup.
#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub account_number: Option<AccountNumber>,
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}
