use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents, Transaction};

/// How many transactions a statement lists.
pub const RECENT_TRANSACTIONS_LIMIT: u32 = 10;

/// Balance, limit and most recent transactions of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub account_id: AccountId,
    pub limit: Cents,
    pub balance: Cents,
    /// When the statement was produced
    pub as_of: DateTime<Utc>,
    /// Most recent first, never more than [`RECENT_TRANSACTIONS_LIMIT`]
    pub recent_transactions: Vec<Transaction>,
}
