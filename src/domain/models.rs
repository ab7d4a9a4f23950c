use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const ACCOUNT_NUMBER_LEN: usize = 10;

/// Money in integer cents.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(cents: u64) -> Self {
        Amount(cents)
    }

    pub fn inner(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Parses form input such as `100`, `100.5` or `2,500.75`.
    pub fn parse(input: &str) -> Result<Amount, DomainError> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(DomainError::InvalidAmount("amount is required".to_string()));
        }
        if trimmed.starts_with('-') {
            return Err(DomainError::InvalidAmount(
                "amount must be a positive number".to_string(),
            ));
        }

        let (grouped, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        let not_a_number =
            || DomainError::InvalidAmount(format!("'{}' is not a number", input.trim()));

        // Commas are only accepted as thousands separators: 2,500 or 1,000,000.
        let groups: Vec<&str> = grouped.split(',').collect();
        if groups.len() > 1
            && (!(1..=3).contains(&groups[0].len()) || groups[1..].iter().any(|g| g.len() != 3))
        {
            return Err(not_a_number());
        }
        let whole = groups.concat();

        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(&whole) || !all_digits(fraction)
        {
            return Err(not_a_number());
        }
        if fraction.len() > 2 {
            return Err(DomainError::InvalidAmount(
                "amount cannot have more than two decimal places".to_string(),
            ));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| DomainError::InvalidAmount("amount is too large".to_string()))?
        };
        let mut cents: u64 = if fraction.is_empty() { 0 } else { fraction.parse().unwrap_or(0) };
        if fraction.len() == 1 {
            cents *= 10;
        }

        whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .map(Amount)
            .ok_or_else(|| DomainError::InvalidAmount("amount is too large".to_string()))
    }

    pub fn parse_positive(input: &str) -> Result<Amount, DomainError> {
        let amount = Self::parse(input)?;
        if amount.is_zero() {
            return Err(DomainError::InvalidAmount(
                "amount must be a positive number".to_string(),
            ));
        }
        Ok(amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = (self.0 / 100).to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        write!(f, "${}.{:02}", grouped, self.0 % 100)
    }
}

impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        if trimmed.len() != ACCOUNT_NUMBER_LEN || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::MalformedAccountNumber);
        }
        Ok(AccountNumber(trimmed.to_string()))
    }

    pub fn generate() -> Self {
        AccountNumber(fastrand::u64(1_000_000_000..10_000_000_000).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        format!("****{}", &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccountNumber::parse(&value)
    }
}

impl From<AccountNumber> for String {
    fn from(value: AccountNumber) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionType {
    pub fn is_debit(&self) -> bool {
        matches!(self, TransactionType::Withdrawal | TransactionType::Transfer)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Amount,
    pub recipient_account_number: Option<AccountNumber>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: &str,
        kind: TransactionType,
        amount: Amount,
        recipient_account_number: Option<AccountNumber>,
        description: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            kind,
            amount,
            recipient_account_number,
            description,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    Credit(Amount),
    Debit(Amount),
}

impl BalanceChange {
    pub fn for_transaction(kind: TransactionType, amount: Amount) -> Self {
        if kind.is_debit() {
            BalanceChange::Debit(amount)
        } else {
            BalanceChange::Credit(amount)
        }
    }

    pub fn apply(&self, balance: Amount) -> Result<Amount, DomainError> {
        match self {
            BalanceChange::Credit(amount) => balance
                .checked_add(*amount)
                .ok_or_else(|| DomainError::Internal("balance overflow".to_string())),
            BalanceChange::Debit(amount) => balance
                .checked_sub(*amount)
                .ok_or(DomainError::InsufficientFunds),
        }
    }
}

/// A validated transaction waiting for password confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Amount,
    pub recipient_account: Option<AccountNumber>,
    pub recipient_name: Option<String>,
    pub description: String,
    pub initiated_at: DateTime<Utc>,
}

impl PendingTransaction {
    pub fn prompt(&self) -> String {
        format!(
            "Enter your password to confirm the {} of {}",
            self.kind, self.amount
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitiateTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: String,
    #[serde(default)]
    pub recipient_account: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmTransaction {
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminDeposit {
    pub account_number: String,
    pub amount: String,
    pub description: String,
}

/// Transaction row shaped for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Amount,
    pub amount_display: String,
    pub date: String,
    pub time: String,
    pub description: String,
    pub recipient_account_number: Option<AccountNumber>,
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            kind: tx.kind,
            amount: tx.amount,
            amount_display: tx.amount.to_string(),
            date: tx.created_at.format("%Y-%m-%d").to_string(),
            time: tx.created_at.format("%I:%M %p").to_string(),
            description: tx.description.clone(),
            recipient_account_number: tx.recipient_account_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QuickStats {
    pub deposit_count: usize,
    pub withdrawal_count: usize,
    pub transfer_count: usize,
    pub total_deposited: Amount,
    pub total_withdrawn: Amount,
}

impl QuickStats {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        transactions.iter().fold(QuickStats::default(), |mut stats, tx| {
            match tx.kind {
                TransactionType::Deposit => {
                    stats.deposit_count += 1;
                    stats.total_deposited =
                        Amount::new(stats.total_deposited.inner().saturating_add(tx.amount.inner()));
                }
                TransactionType::Withdrawal | TransactionType::Transfer => {
                    if tx.kind == TransactionType::Withdrawal {
                        stats.withdrawal_count += 1;
                    } else {
                        stats.transfer_count += 1;
                    }
                    stats.total_withdrawn =
                        Amount::new(stats.total_withdrawn.inner().saturating_add(tx.amount.inner()));
                }
            }
            stats
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub transaction: TransactionView,
    pub balance: Amount,
    pub balance_display: String,
    pub message: String,
    pub transactions: Vec<TransactionView>,
}
