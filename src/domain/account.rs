use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

/// Accounts are identified by an externally assigned integer.
pub type AccountId = i64;

/// A client account. The credit limit is fixed when the account is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// How far below zero the balance may go
    pub limit: Cents,
}

/// The accounts every fresh deployment starts with, all at balance zero.
pub const STANDARD_ACCOUNTS: [Account; 5] = [
    Account { id: 1, limit: 100_000 },
    Account { id: 2, limit: 80_000 },
    Account { id: 3, limit: 1_000_000 },
    Account { id: 4, limit: 10_000_000 },
    Account { id: 5, limit: 500_000 },
];

impl Account {
    pub fn new(id: AccountId, limit: Cents) -> Self {
        assert!(limit >= 0, "Credit limit must not be negative");
        Self { id, limit }
    }

    /// Lowest balance this account may reach.
    pub fn floor(&self) -> Cents {
        -self.limit
    }

    pub fn admits(&self, balance: Cents) -> bool {
        balance >= self.floor()
    }
}

/// One entry of an account's append-only balance history.
/// The entry with the latest `recorded_at` is the current balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub account_id: AccountId,
    /// Copy of the account's limit, so a balance read needs no join
    pub limit: Cents,
    pub balance: Cents,
    pub recorded_at: DateTime<Utc>,
}

/// Limit and balance right after an accepted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub limit: Cents,
    pub balance: Cents,
}
