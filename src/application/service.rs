use std::future::Future;
use std::time::Duration;

use chrono::Utc;

use crate::config::StoreConfig;
use crate::domain::{
    Account, AccountId, BalanceUpdate, Cents, NewTransaction, RECENT_TRANSACTIONS_LIMIT,
    STANDARD_ACCOUNTS, Statement, TransactionKind,
};
use crate::storage::{AccountAudit, ApplyOutcome, Repository};

use super::LedgerError;

/// Application service providing the ledger's two operations.
/// This is the primary interface for any client (CLI, HTTP, tests).
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct LedgerService {
    repo: Repository,
    deadline: Duration,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            deadline: StoreConfig::default().deadline(),
        }
    }

    /// Bound every apply/snapshot call by `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Connect and create the schema if needed.
    pub async fn init(config: &StoreConfig) -> Result<Self, LedgerError> {
        let repo = Repository::init(config).await?;
        Ok(Self::new(repo).with_deadline(config.deadline()))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &StoreConfig) -> Result<Self, LedgerError> {
        let repo = Repository::connect(config).await?;
        Ok(Self::new(repo).with_deadline(config.deadline()))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // ========================
    // Ledger writer
    // ========================

    /// Validate and apply a credit or debit to an account.
    pub async fn apply(
        &self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Cents,
        description: &str,
    ) -> Result<BalanceUpdate, LedgerError> {
        let transaction = NewTransaction::new(kind, amount, description)?;
        self.apply_transaction(account_id, &transaction).await
    }

    /// Apply an already validated transaction.
    ///
    /// The new balance is computed from the latest committed balance and
    /// checked against the limit in one atomic store operation: concurrent
    /// calls on the same account behave as if run one after another.
    pub async fn apply_transaction(
        &self,
        account_id: AccountId,
        transaction: &NewTransaction,
    ) -> Result<BalanceUpdate, LedgerError> {
        let outcome = self
            .within_deadline(
                "apply",
                self.repo.apply_transaction(account_id, transaction),
            )
            .await
            .inspect_err(|err| tracing::error!(account_id, "apply failed: {err}"))?;

        match outcome {
            ApplyOutcome::Applied(update) => {
                tracing::debug!(
                    account_id,
                    kind = %transaction.kind(),
                    amount = transaction.amount(),
                    balance = update.balance,
                    "transaction applied"
                );
                Ok(update)
            }
            ApplyOutcome::AccountNotFound => {
                tracing::warn!(account_id, "transaction for unknown account");
                Err(LedgerError::AccountNotFound(account_id))
            }
            ApplyOutcome::LimitExceeded { limit, balance } => {
                tracing::warn!(
                    account_id,
                    limit,
                    balance,
                    attempted = transaction.delta(),
                    "transaction rejected: limit exceeded"
                );
                Err(LedgerError::LimitExceeded {
                    account_id,
                    limit,
                    balance,
                    attempted: transaction.delta(),
                })
            }
            ApplyOutcome::BalanceOverflow { balance } => {
                tracing::warn!(
                    account_id,
                    balance,
                    attempted = transaction.delta(),
                    "transaction rejected: balance overflow"
                );
                Err(LedgerError::BalanceOverflow {
                    account_id,
                    balance,
                    attempted: transaction.delta(),
                })
            }
        }
    }

    // ========================
    // Snapshot reader
    // ========================

    /// Current balance, limit and most recent transactions of an account.
    ///
    /// The balance and the transaction list are fetched concurrently; each
    /// sees only committed rows, but they need not observe the same instant
    /// relative to a concurrent `apply`.
    pub async fn snapshot(&self, account_id: AccountId) -> Result<Statement, LedgerError> {
        // Both fetches live in this future: dropping it drops both.
        let (balance, transactions) = self
            .within_deadline("snapshot", async {
                Ok::<_, LedgerError>(tokio::join!(
                    self.repo.latest_balance(account_id),
                    self.repo
                        .recent_transactions(account_id, RECENT_TRANSACTIONS_LIMIT),
                ))
            })
            .await?;

        // A missing account wins over a failed transaction fetch.
        let record = match balance {
            Ok(Some(record)) => record,
            Ok(None) => return Err(LedgerError::AccountNotFound(account_id)),
            Err(err) => {
                tracing::error!(account_id, "balance fetch failed: {err:#}");
                return Err(LedgerError::Persistence(err));
            }
        };
        let recent_transactions = transactions.map_err(|err| {
            tracing::error!(account_id, "transaction fetch failed: {err:#}");
            LedgerError::Persistence(err)
        })?;

        Ok(Statement {
            account_id,
            limit: record.limit,
            balance: record.balance,
            as_of: Utc::now(),
            recent_transactions,
        })
    }

    // ========================
    // Administration
    // ========================

    /// Seed one account with a zero balance. Returns false if it already existed.
    pub async fn seed_account(&self, account: Account) -> Result<bool, LedgerError> {
        let created = self.repo.seed_account(&account).await?;
        if created {
            tracing::info!(account_id = account.id, limit = account.limit, "account seeded");
        }
        Ok(created)
    }

    /// Seed the standard accounts, skipping those that already exist.
    pub async fn seed_standard_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut created = Vec::new();
        for account in STANDARD_ACCOUNTS {
            if self.seed_account(account).await? {
                created.push(account);
            }
        }
        Ok(created)
    }

    /// Cross-check stored balances against the transaction log.
    pub async fn check_integrity(&self) -> Result<Vec<AccountAudit>, LedgerError> {
        Ok(self.repo.audit_accounts().await?)
    }

    async fn within_deadline<T, E>(
        &self,
        operation: &str,
        future: impl Future<Output = Result<T, E>>,
    ) -> Result<T, LedgerError>
    where
        LedgerError: From<E>,
    {
        match tokio::time::timeout(self.deadline, future).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(LedgerError::deadline_elapsed(operation, self.deadline)),
        }
    }
}
