mod common;

use anyhow::Result;
use saldo::application::{LedgerError, LedgerService};
use saldo::domain::{Account, STANDARD_ACCOUNTS, TransactionKind, ValidationError};
use sqlx::SqlitePool;
use tempfile::TempDir;

use common::{service_with_account, test_config, test_service};

#[tokio::test]
async fn test_limit_boundary_scenario() -> Result<()> {
    let (service, _temp) = service_with_account(1, 100).await?;

    // Debit beyond the limit is rejected and changes nothing
    let err = service
        .apply(1, TransactionKind::Debit, 150, "too much")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::LimitExceeded {
            account_id: 1,
            limit: 100,
            balance: 0,
            attempted: -150
        }
    ));
    assert_eq!(service.snapshot(1).await?.balance, 0);

    // Debit down to exactly -limit is accepted
    let update = service
        .apply(1, TransactionKind::Debit, 100, "rent")
        .await?;
    assert_eq!(update.limit, 100);
    assert_eq!(update.balance, -100);

    let update = service
        .apply(1, TransactionKind::Credit, 50, "salary")
        .await?;
    assert_eq!(update.balance, -50);

    let statement = service.snapshot(1).await?;
    assert_eq!(statement.balance, -50);
    assert_eq!(statement.limit, 100);
    assert_eq!(statement.recent_transactions.len(), 2);

    let latest = &statement.recent_transactions[0];
    assert_eq!(latest.kind, TransactionKind::Credit);
    assert_eq!(latest.amount, 50);
    assert_eq!(latest.description, "salary");

    let earlier = &statement.recent_transactions[1];
    assert_eq!(earlier.kind, TransactionKind::Debit);
    assert_eq!(earlier.amount, 100);
    assert_eq!(earlier.description, "rent");
    assert!(earlier.occurred_at <= latest.occurred_at);

    Ok(())
}

#[tokio::test]
async fn test_unknown_account() -> Result<()> {
    let (service, _temp) = service_with_account(1, 100).await?;

    let err = service
        .apply(42, TransactionKind::Credit, 10, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(42)));

    let err = service.snapshot(42).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(42)));

    // A debit on a missing account is "not found", never "over limit"
    let err = service
        .apply(42, TransactionKind::Debit, 1_000_000, "big")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(42)));

    Ok(())
}

#[tokio::test]
async fn test_validation_happens_before_store_access() -> Result<()> {
    let (service, _temp) = service_with_account(1, 100).await?;

    // With the pool closed any store access would fail as a persistence error
    service.repository().close().await;

    let err = service
        .apply(1, TransactionKind::Credit, 10, "abcdefghijk")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::DescriptionLength(11))
    ));

    let err = service
        .apply(1, TransactionKind::Credit, 0, "zero")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::NonPositiveAmount(0))
    ));

    let err = service
        .apply(1, TransactionKind::Credit, 10, "ok")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Persistence(_)));
    assert!(!err.is_rejection());

    Ok(())
}

#[tokio::test]
async fn test_rejected_transactions_leave_no_trace() -> Result<()> {
    let (service, _temp) = service_with_account(1, 1000).await?;

    service
        .apply(1, TransactionKind::Debit, 900, "groceries")
        .await?;
    for _ in 0..3 {
        let err = service
            .apply(1, TransactionKind::Debit, 101, "more")
            .await
            .unwrap_err();
        assert!(err.is_rejection());
    }

    let statement = service.snapshot(1).await?;
    assert_eq!(statement.balance, -900);
    assert_eq!(statement.recent_transactions.len(), 1);

    let audits = service.check_integrity().await?;
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].transaction_count, 1);
    assert_eq!(audits[0].balance_record_count, 2);
    assert!(audits[0].is_consistent());

    Ok(())
}

#[tokio::test]
async fn test_statement_lists_ten_most_recent_first() -> Result<()> {
    let (service, _temp) = service_with_account(1, 0).await?;

    for i in 0..12 {
        service
            .apply(1, TransactionKind::Credit, i + 1, &format!("t{}", i))
            .await?;
    }

    let statement = service.snapshot(1).await?;
    assert_eq!(statement.balance, (1..=12).sum::<i64>());
    assert_eq!(statement.recent_transactions.len(), 10);

    let descriptions: Vec<_> = statement
        .recent_transactions
        .iter()
        .map(|t| t.description.as_str())
        .collect();
    assert_eq!(
        descriptions,
        vec!["t11", "t10", "t9", "t8", "t7", "t6", "t5", "t4", "t3", "t2"]
    );

    for pair in statement.recent_transactions.windows(2) {
        assert!(pair[0].occurred_at >= pair[1].occurred_at);
    }

    Ok(())
}

#[tokio::test]
async fn test_statement_without_transactions() -> Result<()> {
    let (service, _temp) = service_with_account(3, 1_000_000).await?;

    let statement = service.snapshot(3).await?;
    assert_eq!(statement.account_id, 3);
    assert_eq!(statement.balance, 0);
    assert_eq!(statement.limit, 1_000_000);
    assert!(statement.recent_transactions.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_repeated_snapshots_agree() -> Result<()> {
    let (service, _temp) = service_with_account(1, 500).await?;
    service.apply(1, TransactionKind::Debit, 200, "a").await?;
    service.apply(1, TransactionKind::Credit, 30, "b").await?;

    let first = service.snapshot(1).await?;
    let second = service.snapshot(1).await?;

    assert_eq!(first.balance, second.balance);
    assert_eq!(first.limit, second.limit);
    assert_eq!(first.recent_transactions, second.recent_transactions);
    assert!(first.as_of <= second.as_of);

    Ok(())
}

#[tokio::test]
async fn test_credits_are_never_limited() -> Result<()> {
    let (service, _temp) = service_with_account(1, 0).await?;

    let update = service
        .apply(1, TransactionKind::Credit, 1_000_000_000, "jackpot")
        .await?;
    assert_eq!(update.balance, 1_000_000_000);

    let err = service
        .apply(1, TransactionKind::Debit, 1_000_000_001, "all")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::LimitExceeded { limit: 0, .. }));

    Ok(())
}

#[tokio::test]
async fn test_credit_overflowing_the_balance_is_rejected() -> Result<()> {
    let (service, _temp) = service_with_account(1, 100).await?;

    let update = service
        .apply(1, TransactionKind::Credit, i64::MAX - 10, "big")
        .await?;
    assert_eq!(update.balance, i64::MAX - 10);

    let err = service
        .apply(1, TransactionKind::Credit, 100, "more")
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            LedgerError::BalanceOverflow {
                account_id: 1,
                balance,
                attempted: 100
            } if balance == i64::MAX - 10
        ),
        "{err}"
    );
    assert!(err.is_rejection());

    // Nothing was written and the account keeps working
    let statement = service.snapshot(1).await?;
    assert_eq!(statement.balance, i64::MAX - 10);
    assert_eq!(statement.recent_transactions.len(), 1);

    let update = service.apply(1, TransactionKind::Credit, 10, "fits").await?;
    assert_eq!(update.balance, i64::MAX);
    assert!(service.check_integrity().await?[0].is_consistent());

    Ok(())
}

#[tokio::test]
async fn test_snapshot_reports_missing_account_before_store_failures() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir);
    let service = LedgerService::init(&config).await?;
    service.seed_account(Account::new(1, 100)).await?;
    service.apply(1, TransactionKind::Debit, 10, "before").await?;

    // Break the transaction log behind the service's back
    let other = SqlitePool::connect(&config.database_url).await?;
    sqlx::query("ALTER TABLE transactions RENAME TO gone")
        .execute(&other)
        .await?;
    other.close().await;

    let err = service.snapshot(1).await.unwrap_err();
    assert!(matches!(err, LedgerError::Persistence(_)), "{err}");

    // An unknown account wins over the failed list fetch
    let err = service.snapshot(42).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(42)), "{err}");

    Ok(())
}

#[tokio::test]
async fn test_seeding() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let created = service.seed_standard_accounts().await?;
    assert_eq!(created, STANDARD_ACCOUNTS.to_vec());

    // Second run is a no-op
    assert!(service.seed_standard_accounts().await?.is_empty());
    assert!(!service.seed_account(Account::new(1, 5)).await?);

    // The original limit is kept
    let account = service.repository().get_account(1).await?.unwrap();
    assert_eq!(account.limit, 100_000);

    for account in STANDARD_ACCOUNTS {
        let statement = service.snapshot(account.id).await?;
        assert_eq!(statement.balance, 0);
        assert_eq!(statement.limit, account.limit);
    }

    Ok(())
}

#[tokio::test]
async fn test_unicode_description_at_limit() -> Result<()> {
    let (service, _temp) = service_with_account(1, 100).await?;

    service
        .apply(1, TransactionKind::Credit, 5, "pão de açú")
        .await?;

    let statement = service.snapshot(1).await?;
    assert_eq!(statement.recent_transactions[0].description, "pão de açú");

    Ok(())
}
