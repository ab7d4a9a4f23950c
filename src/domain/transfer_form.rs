use crate::domain::models::{AccountNumber, Amount};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found { name: String },
    Malformed,
    NotFound,
    Failed,
}

impl LookupOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Found { .. })
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            LookupOutcome::Found { .. } => None,
            LookupOutcome::Malformed => Some("Please enter a valid 10-digit account number"),
            LookupOutcome::NotFound => Some("Account not found. Please check the account number."),
            LookupOutcome::Failed => Some("Unable to verify account. Please try again."),
        }
    }
}

/// Result of looking up a recipient, as returned to the transfer form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountLookup {
    pub account_number: String,
    pub success: bool,
    pub name: Option<String>,
    pub error: Option<String>,
}

impl AccountLookup {
    pub fn new(account_number: &str, outcome: &LookupOutcome) -> Self {
        let name = match outcome {
            LookupOutcome::Found { name } => Some(name.clone()),
            _ => None,
        };
        Self {
            account_number: account_number.trim().to_string(),
            success: outcome.is_found(),
            name,
            error: outcome.error_message().map(str::to_string),
        }
    }
}

/// Transfer form fields as entered, plus the last recipient lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferForm {
    pub amount: String,
    pub recipient_account: String,
    pub description: String,
    pub lookup: Option<AccountLookup>,
}

impl TransferForm {
    /// Editing the recipient invalidates any earlier lookup.
    pub fn set_recipient(&mut self, recipient_account: &str) {
        if self.recipient_account != recipient_account {
            self.lookup = None;
        }
        self.recipient_account = recipient_account.to_string();
    }

    pub fn record_lookup(&mut self, lookup: AccountLookup) {
        self.lookup = Some(lookup);
    }

    pub fn recipient_confirmed(&self, own_account: &AccountNumber) -> bool {
        match (&self.lookup, AccountNumber::parse(&self.recipient_account)) {
            (Some(lookup), Ok(recipient)) => {
                lookup.success
                    && lookup.account_number == recipient.as_str()
                    && &recipient != own_account
            }
            _ => false,
        }
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self, balance: Amount, own_account: &AccountNumber) -> bool {
        let amount_ok = Amount::parse_positive(&self.amount)
            .map(|amount| amount <= balance)
            .unwrap_or(false);
        amount_ok && !self.description.trim().is_empty() && self.recipient_confirmed(own_account)
    }
}
