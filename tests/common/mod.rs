// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use saldo::application::LedgerService;
use saldo::config::StoreConfig;
use saldo::domain::{Account, AccountId, Cents};
use tempfile::TempDir;

/// Store config pointing at a fresh database file inside `temp_dir`
pub fn test_config(temp_dir: &TempDir) -> StoreConfig {
    let db_path = temp_dir.path().join("test.db");
    StoreConfig::new(format!("sqlite:{}?mode=rwc", db_path.display()))
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = LedgerService::init(&test_config(&temp_dir)).await?;
    Ok((service, temp_dir))
}

/// Helper to create a test service with one seeded account
pub async fn service_with_account(
    id: AccountId,
    limit: Cents,
) -> Result<(LedgerService, TempDir)> {
    let (service, temp_dir) = test_service().await?;
    service.seed_account(Account::new(id, limit)).await?;
    Ok((service, temp_dir))
}
