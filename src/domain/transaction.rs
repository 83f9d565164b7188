use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AccountId, Cents};

/// Longest description a transaction may carry, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Increases the balance
    #[serde(rename = "c")]
    Credit,
    /// Decreases the balance, down to the negated credit limit
    #[serde(rename = "d")]
    Debit,
}

impl TransactionKind {
    /// Storage and wire code.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "c",
            TransactionKind::Debit => "d",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "c" | "credit" => Some(TransactionKind::Credit),
            "d" | "debit" => Some(TransactionKind::Debit),
            _ => None,
        }
    }

    /// Signed balance change for a positive magnitude.
    pub fn delta(&self, amount: Cents) -> Cents {
        match self {
            TransactionKind::Credit => amount,
            TransactionKind::Debit => -amount,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Credit => write!(f, "credit"),
            TransactionKind::Debit => write!(f, "debit"),
        }
    }
}

/// Input that failed validation. Never reaches the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be a positive number of cents, got {0}")]
    NonPositiveAmount(Cents),

    #[error("unknown transaction kind: {0:?}")]
    UnknownKind(String),

    #[error("description must be 1 to {max} characters long, got {0}", max = MAX_DESCRIPTION_CHARS)]
    DescriptionLength(usize),
}

/// A validated transaction that has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    kind: TransactionKind,
    amount: Cents,
    description: String,
}

impl NewTransaction {
    pub fn new(
        kind: TransactionKind,
        amount: Cents,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(amount));
        }

        let description = description.into();
        let length = description.chars().count();
        if length == 0 || length > MAX_DESCRIPTION_CHARS {
            return Err(ValidationError::DescriptionLength(length));
        }

        Ok(Self {
            kind,
            amount,
            description,
        })
    }

    /// Like [`NewTransaction::new`], with the kind given as text ("c", "debit", ...).
    pub fn parse(
        kind: &str,
        amount: Cents,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let kind = TransactionKind::from_str(kind)
            .ok_or_else(|| ValidationError::UnknownKind(kind.to_string()))?;
        Self::new(kind, amount, description)
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn amount(&self) -> Cents {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn delta(&self) -> Cents {
        self.kind.delta(self.amount)
    }
}

/// An accepted transaction, as stored in the append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub account_id: AccountId,
    /// Always positive; direction is given by `kind`
    pub amount: Cents,
    pub kind: TransactionKind,
    pub description: String,
    /// Assigned by the system when the transaction is stored
    pub occurred_at: DateTime<Utc>,
}
