use std::time::Duration;

use clap::Args;

/// Store connection settings, shared by every command that touches the database.
#[derive(Args, Debug, Clone)]
pub struct StoreConfig {
    /// SQLite connection URI
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:ledger.db?mode=rwc",
        global = true
    )]
    pub database_url: String,

    /// Upper bound on pooled connections
    #[arg(long, env = "LEDGER_MAX_CONNECTIONS", default_value_t = 16, global = true)]
    pub max_connections: u32,

    /// How long a writer waits for the database write lock, in milliseconds
    #[arg(long, env = "LEDGER_BUSY_TIMEOUT_MS", default_value_t = 5_000, global = true)]
    pub busy_timeout_ms: u64,

    /// Deadline for a single apply/statement call, in milliseconds
    #[arg(long, env = "LEDGER_DEADLINE_MS", default_value_t = 10_000, global = true)]
    pub deadline_ms: u64,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:ledger.db?mode=rwc".to_string(),
            max_connections: 16,
            busy_timeout_ms: 5_000,
            deadline_ms: 10_000,
        }
    }
}
