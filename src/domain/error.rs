use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Account not found")]
    AccountNotFound,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Please enter a recipient account number")]
    MissingRecipient,
    #[error("Please enter a valid 10-digit account number")]
    MalformedAccountNumber,
    #[error("Account not found. Please check the account number.")]
    RecipientNotFound,
    #[error("You cannot transfer money to your own account")]
    SelfTransfer,
    #[error("Please enter a transaction description")]
    MissingDescription,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("No transaction is awaiting confirmation")]
    NoPendingTransaction,
    #[error("Transaction is already being settled")]
    SettlementInProgress,
    #[error("Settlement failed at step '{step}': {reason}")]
    Settlement { step: &'static str, reason: String },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
