use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::LedgerService;
use crate::config::StoreConfig;
use crate::domain::{Account, AccountId, NewTransaction, format_cents, parse_cents};
use crate::http::{self, StatementResponse};

/// Saldo - credit-limited account ledger
#[derive(Parser)]
#[command(name = "saldo")]
#[command(about = "A ledger of client accounts with credit limits and atomic balance updates")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreConfig,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema
    Init,

    /// Seed accounts (the five standard accounts unless --id is given)
    Seed {
        /// Account ID to seed
        #[arg(long, requires = "limit")]
        id: Option<AccountId>,

        /// Credit limit (e.g., "1000.00")
        #[arg(long, requires = "id")]
        limit: Option<String>,
    },

    /// Apply a credit or debit to an account
    Apply {
        /// Account ID
        account: AccountId,

        /// Transaction kind: credit (c) or debit (d)
        kind: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Description, 1 to 10 characters
        description: String,
    },

    /// Show balance, limit and the most recent transactions of an account
    Statement {
        /// Account ID
        account: AccountId,

        /// Print the HTTP JSON body instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Verify stored balances against the transaction log
    Check,

    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        crate::logging::init(self.verbose);

        match self.command {
            Commands::Init => {
                LedgerService::init(&self.store).await?;
                println!("Database initialized: {}", self.store.database_url);
            }

            Commands::Seed { id, limit } => {
                let service = LedgerService::init(&self.store).await?;
                run_seed_command(&service, id, limit).await?;
            }

            Commands::Apply {
                account,
                kind,
                amount,
                description,
            } => {
                let service = LedgerService::connect(&self.store).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let transaction = NewTransaction::parse(&kind, amount_cents, description)?;

                let update = service.apply_transaction(account, &transaction).await?;
                println!(
                    "Applied {} of {} to account {}: balance {} (limit {})",
                    transaction.kind(),
                    format_cents(transaction.amount()),
                    account,
                    format_cents(update.balance),
                    format_cents(update.limit)
                );
            }

            Commands::Statement { account, json } => {
                let service = LedgerService::connect(&self.store).await?;
                run_statement_command(&service, account, json).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.store).await?;
                run_check_command(&service).await?;
            }

            Commands::Serve { listen } => {
                let service = LedgerService::init(&self.store).await?;
                let listener = tokio::net::TcpListener::bind(&listen)
                    .await
                    .with_context(|| format!("Failed to bind {}", listen))?;
                http::serve(listener, service.clone()).await?;
                service.repository().close().await;
            }
        }

        Ok(())
    }
}

async fn run_seed_command(
    service: &LedgerService,
    id: Option<AccountId>,
    limit: Option<String>,
) -> Result<()> {
    let created = match (id, limit) {
        (Some(id), Some(limit)) => {
            let limit = parse_cents(&limit).context("Invalid limit format. Use '1000.00'")?;
            let account = Account::new(id, limit);
            if service.seed_account(account).await? {
                vec![account]
            } else {
                Vec::new()
            }
        }
        _ => service.seed_standard_accounts().await?,
    };

    if created.is_empty() {
        println!("No accounts created (already seeded).");
    } else {
        for account in created {
            println!(
                "Seeded account {} with limit {}",
                account.id,
                format_cents(account.limit)
            );
        }
    }
    Ok(())
}

async fn run_statement_command(
    service: &LedgerService,
    account: AccountId,
    json: bool,
) -> Result<()> {
    let statement = service.snapshot(account).await?;

    if json {
        let body = serde_json::to_string_pretty(&StatementResponse::from(statement))?;
        println!("{}", body);
        return Ok(());
    }

    println!("Account:  {}", statement.account_id);
    println!("Balance:  {}", format_cents(statement.balance));
    println!("Limit:    {}", format_cents(statement.limit));
    println!("As of:    {}", statement.as_of.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    if statement.recent_transactions.is_empty() {
        println!("No transactions found.");
    } else {
        println!("{:<20} {:<7} {:>12} DESCRIPTION", "DATE", "KIND", "AMOUNT");
        println!("{}", "-".repeat(54));
        for transaction in &statement.recent_transactions {
            println!(
                "{:<20} {:<7} {:>12} {}",
                transaction.occurred_at.format("%Y-%m-%d %H:%M:%S"),
                transaction.kind,
                format_cents(transaction.amount),
                transaction.description
            );
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let audits = service.check_integrity().await?;
    if audits.is_empty() {
        println!("No accounts found.");
        return Ok(());
    }

    println!(
        "{:<8} {:>14} {:>14} {:>14} {:>6}  STATUS",
        "ACCOUNT", "LIMIT", "BALANCE", "LEDGER SUM", "TXS"
    );
    println!("{}", "-".repeat(68));

    let mut problems = 0;
    for audit in &audits {
        let status = if audit.is_consistent() {
            "OK"
        } else {
            problems += 1;
            "MISMATCH"
        };
        println!(
            "{:<8} {:>14} {:>14} {:>14} {:>6}  {}",
            audit.account_id,
            format_cents(audit.limit),
            audit
                .balance
                .map(format_cents)
                .unwrap_or_else(|| "-".to_string()),
            format_cents(audit.ledger_sum),
            audit.transaction_count,
            status
        );
    }

    println!();
    if problems == 0 {
        println!("All {} accounts are consistent.", audits.len());
        Ok(())
    } else {
        anyhow::bail!("{} of {} accounts are inconsistent", problems, audits.len())
    }
}
