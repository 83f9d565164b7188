use std::time::Duration;

use thiserror::Error;

use crate::domain::{AccountId, Cents, ValidationError};

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed input, rejected before any store access.
    #[error("Invalid transaction: {0}")]
    Validation(#[from] ValidationError),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// A well-formed debit that would take the balance below `-limit`.
    /// Nothing was written.
    #[error(
        "Limit exceeded on account {account_id}: balance {balance}, limit {limit}, attempted {attempted}"
    )]
    LimitExceeded {
        account_id: AccountId,
        limit: Cents,
        balance: Cents,
        attempted: Cents,
    },

    /// A credit whose resulting balance does not fit in [`Cents`].
    /// Nothing was written.
    #[error("Balance overflow on account {account_id}: balance {balance}, attempted {attempted}")]
    BalanceOverflow {
        account_id: AccountId,
        balance: Cents,
        attempted: Cents,
    },

    /// The store was unavailable, timed out or failed unexpectedly.
    #[error("Persistence error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl LedgerError {
    pub(crate) fn deadline_elapsed(operation: &str, deadline: Duration) -> Self {
        LedgerError::Persistence(anyhow::anyhow!(
            "{} did not complete within {:?}",
            operation,
            deadline
        ))
    }

    /// Expected business outcomes, as opposed to failures of the service itself.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, LedgerError::Persistence(_))
    }
}
