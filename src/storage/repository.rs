use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use crate::config::StoreConfig;
use crate::domain::{
    Account, AccountId, BalanceRecord, BalanceUpdate, Cents, NewTransaction, Transaction,
    TransactionKind,
};

use super::MIGRATION_001_INITIAL;

/// Appends the next balance record for an account, or nothing at all.
///
/// Reading the latest balance, adding the delta, checking it against the
/// limit and inserting the result happen in this one statement, which runs
/// under SQLite's write lock. No row comes back when the account has no
/// balance history, the new balance would fall below `-credit_limit`, or
/// the sum no longer fits in an integer (SQLite would silently store a REAL).
///
/// `recorded_at` never goes backwards for an account, so ordering by it
/// always yields the last committed balance.
const APPEND_BALANCE: &str = r#"
    INSERT INTO balance_history (account_id, credit_limit, balance, recorded_at)
    SELECT a.id, a.credit_limit, latest.balance + ?2, MAX(?3, latest.recorded_at)
    FROM accounts a
    JOIN (
        SELECT balance, recorded_at
        FROM balance_history
        WHERE account_id = ?1
        ORDER BY recorded_at DESC, id DESC
        LIMIT 1
    ) latest
    WHERE a.id = ?1
      AND typeof(latest.balance + ?2) = 'integer'
      AND latest.balance + ?2 >= -a.credit_limit
    RETURNING credit_limit, balance, recorded_at
"#;

/// Result of trying to apply a transaction to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(BalanceUpdate),
    AccountNotFound,
    /// Nothing was written; `balance` is the balance the transaction was checked against
    LimitExceeded { limit: Cents, balance: Cents },
    /// Nothing was written; `balance + delta` does not fit in [`Cents`]
    BalanceOverflow { balance: Cents },
}

/// Per-account consistency figures for the stored ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAudit {
    pub account_id: AccountId,
    pub limit: Cents,
    pub balance: Option<Cents>,
    /// Sum of all signed transaction amounts
    pub ledger_sum: Cents,
    pub transaction_count: i64,
    pub balance_record_count: i64,
    /// Balance records below the account's floor
    pub breaches: i64,
}

impl AccountAudit {
    /// Every account starts with one zero balance record, and each accepted
    /// transaction appends exactly one more.
    pub fn is_consistent(&self) -> bool {
        self.balance == Some(self.ledger_sum)
            && self.balance.is_some_and(|balance| self.account().admits(balance))
            && self.balance_record_count == self.transaction_count + 1
            && self.breaches == 0
    }

    pub fn account(&self) -> Account {
        Account {
            id: self.account_id,
            limit: self.limit,
        }
    }
}

/// Repository for the accounts, balance history and transaction log.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a connection pool as described by the config.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .with_context(|| format!("Invalid database URL: {}", config.database_url))?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(config: &StoreConfig) -> Result<Self> {
        let repo = Self::connect(config).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Wait for in-flight work and close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // Account seeding
    // ========================

    /// Create an account together with its opening zero balance.
    /// Returns false, changing nothing, when the id is already taken.
    pub async fn seed_account(&self, account: &Account) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin seeding transaction")?;

        let created = sqlx::query(
            "INSERT INTO accounts (id, credit_limit) VALUES (?, ?) ON CONFLICT (id) DO NOTHING",
        )
        .bind(account.id)
        .bind(account.limit)
        .execute(&mut *tx)
        .await
        .context("Failed to insert account")?
        .rows_affected()
            == 1;

        if created {
            sqlx::query(
                r#"
                INSERT INTO balance_history (account_id, credit_limit, balance, recorded_at)
                VALUES (?, ?, 0, ?)
                "#,
            )
            .bind(account.id)
            .bind(account.limit)
            .bind(encode_timestamp(Utc::now()))
            .execute(&mut *tx)
            .await
            .context("Failed to insert opening balance")?;
        }

        tx.commit().await.context("Failed to commit seeding")?;
        Ok(created)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, credit_limit FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    // ========================
    // Writes
    // ========================

    /// Apply a transaction: append its balance record and its log entry, or
    /// neither. Dropping the returned future before it resolves rolls back.
    pub async fn apply_transaction(
        &self,
        account_id: AccountId,
        transaction: &NewTransaction,
    ) -> Result<ApplyOutcome> {
        let now = encode_timestamp(Utc::now());

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        // Must stay the first statement of the unit: the write lock is taken
        // here, before any balance is read.
        let appended = sqlx::query(APPEND_BALANCE)
            .bind(account_id)
            .bind(transaction.delta())
            .bind(&now)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to append balance record")?;

        let Some(row) = appended else {
            let outcome = Self::classify_rejection(&mut tx, account_id, transaction.delta()).await?;
            tx.rollback()
                .await
                .context("Failed to roll back rejected transaction")?;
            return Ok(outcome);
        };

        let update = BalanceUpdate {
            limit: row.try_get("credit_limit")?,
            balance: row.try_get("balance")?,
        };
        let recorded_at: String = row.try_get("recorded_at")?;

        sqlx::query(
            r#"
            INSERT INTO transactions (account_id, amount, kind, description, occurred_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(account_id)
        .bind(transaction.amount())
        .bind(transaction.kind().as_str())
        .bind(transaction.description())
        .bind(&recorded_at)
        .execute(&mut *tx)
        .await
        .context("Failed to append transaction")?;

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(ApplyOutcome::Applied(update))
    }

    /// Tell a missing account from a limit breach, inside the rejected unit.
    async fn classify_rejection(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        account_id: AccountId,
        delta: Cents,
    ) -> Result<ApplyOutcome> {
        let row = sqlx::query(
            r#"
            SELECT
                a.credit_limit,
                (
                    SELECT balance
                    FROM balance_history
                    WHERE account_id = a.id
                    ORDER BY recorded_at DESC, id DESC
                    LIMIT 1
                ) AS balance
            FROM accounts a
            WHERE a.id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await
        .context("Failed to classify rejected transaction")?;

        let Some(row) = row else {
            return Ok(ApplyOutcome::AccountNotFound);
        };

        match row.try_get::<Option<Cents>, _>("balance")? {
            Some(balance) if balance.checked_add(delta).is_none() => {
                Ok(ApplyOutcome::BalanceOverflow { balance })
            }
            Some(balance) => Ok(ApplyOutcome::LimitExceeded {
                limit: row.try_get("credit_limit")?,
                balance,
            }),
            // An account without an opening balance was never seeded properly.
            None => Ok(ApplyOutcome::AccountNotFound),
        }
    }

    // ========================
    // Reads
    // ========================

    /// The authoritative balance record of an account.
    pub async fn latest_balance(&self, account_id: AccountId) -> Result<Option<BalanceRecord>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, credit_limit, balance, recorded_at
            FROM balance_history
            WHERE account_id = ?
            ORDER BY recorded_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest balance")?;

        row.as_ref().map(Self::row_to_balance_record).transpose()
    }

    /// The `limit` most recent transactions of an account, newest first.
    pub async fn recent_transactions(
        &self,
        account_id: AccountId,
        limit: u32,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT account_id, amount, kind, description, occurred_at
            FROM transactions
            WHERE account_id = ?
            ORDER BY occurred_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(account_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Consistency figures for every account, read in one statement.
    pub async fn audit_accounts(&self) -> Result<Vec<AccountAudit>> {
        let rows = sqlx::query(
            r#"
            SELECT
                a.id,
                a.credit_limit,
                (
                    SELECT balance FROM balance_history b
                    WHERE b.account_id = a.id
                    ORDER BY b.recorded_at DESC, b.id DESC
                    LIMIT 1
                ) AS balance,
                (
                    SELECT COALESCE(SUM(CASE t.kind WHEN 'c' THEN t.amount ELSE -t.amount END), 0)
                    FROM transactions t WHERE t.account_id = a.id
                ) AS ledger_sum,
                (SELECT COUNT(*) FROM transactions t WHERE t.account_id = a.id) AS transaction_count,
                (SELECT COUNT(*) FROM balance_history b WHERE b.account_id = a.id) AS balance_record_count,
                (
                    SELECT COUNT(*) FROM balance_history b
                    WHERE b.account_id = a.id AND b.balance < -b.credit_limit
                ) AS breaches
            FROM accounts a
            ORDER BY a.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to audit accounts")?;

        rows.iter().map(Self::row_to_audit).collect()
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        Ok(Account {
            id: row.try_get("id")?,
            limit: row.try_get("credit_limit")?,
        })
    }

    fn row_to_audit(row: &SqliteRow) -> Result<AccountAudit> {
        Ok(AccountAudit {
            account_id: row.try_get("id")?,
            limit: row.try_get("credit_limit")?,
            balance: row.try_get("balance")?,
            ledger_sum: row.try_get("ledger_sum")?,
            transaction_count: row.try_get("transaction_count")?,
            balance_record_count: row.try_get("balance_record_count")?,
            breaches: row.try_get("breaches")?,
        })
    }

    fn row_to_balance_record(row: &SqliteRow) -> Result<BalanceRecord> {
        let recorded_at: String = row.try_get("recorded_at")?;

        Ok(BalanceRecord {
            account_id: row.try_get("account_id")?,
            limit: row.try_get("credit_limit")?,
            balance: row.try_get("balance")?,
            recorded_at: decode_timestamp(&recorded_at).context("Invalid recorded_at")?,
        })
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let kind_str: String = row.try_get("kind")?;
        let occurred_at: String = row.try_get("occurred_at")?;

        Ok(Transaction {
            account_id: row.try_get("account_id")?,
            amount: row.try_get("amount")?,
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            description: row.try_get("description")?,
            occurred_at: decode_timestamp(&occurred_at).context("Invalid occurred_at")?,
        })
    }
}

/// Fixed-width RFC 3339, so text order in the database is time order.
fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_timestamps_sort_as_text() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(encode_timestamp(earlier) < encode_timestamp(later));
        assert_eq!(encode_timestamp(earlier), "2024-01-02T03:04:05.000000Z");
    }

    #[test]
    fn test_timestamp_roundtrip_keeps_microseconds() {
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(decode_timestamp(&encode_timestamp(at)).unwrap(), at);
    }

    #[test]
    fn test_audit_consistency() {
        let audit = AccountAudit {
            account_id: 1,
            limit: 100,
            balance: Some(-50),
            ledger_sum: -50,
            transaction_count: 2,
            balance_record_count: 3,
            breaches: 0,
        };
        assert!(audit.is_consistent());
        assert!(!AccountAudit {
            balance_record_count: 2,
            ..audit.clone()
        }
        .is_consistent());
        assert!(!AccountAudit {
            balance: Some(0),
            ..audit.clone()
        }
        .is_consistent());

        // Sums agree but the balance sits below the floor
        assert!(!AccountAudit {
            balance: Some(-150),
            ledger_sum: -150,
            ..audit
        }
        .is_consistent());
    }
}
