//! Ledger Engine CLI
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────┐    ┌────────────┐
//! │  Config  │───▶│ TransferEng. │───▶│ PgLedger │───▶│ PostgreSQL │
//! │  (YAML)  │    │ (lock order) │    │  (UoW)   │    │  (rows)    │
//! └──────────┘    └──────────────┘    └──────────┘    └────────────┘
//! ```
//!
//! Results are printed to stdout as JSON; logs go to the configured file and stderr.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde_json::json;

use ledger_engine::config::AppConfig;
use ledger_engine::currency::CurrencyConverter;
use ledger_engine::db::Database;
use ledger_engine::ledger::LedgerStore;
use ledger_engine::logging::init_logging;
use ledger_engine::transfer::{TransferEngine, TransferError, TransferRequest};

#[derive(Parser)]
#[command(name = "ledger-engine")]
#[command(about = "Atomic multi-currency funds transfers over a PostgreSQL ledger")]
struct Cli {
    /// Config environment, loads config/<env>.yaml
    #[arg(long, short, global = true, default_value = "dev")]
    env: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move funds between two accounts
    Transfer {
        #[arg(long)]
        from: i64,
        #[arg(long)]
        to: i64,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        currency: String,
        /// Client idempotency key
        #[arg(long)]
        cid: Option<String>,
    },
    /// Convert an amount with the configured rate table
    Convert {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: Decimal,
    },
    /// Show an account with its entries and transfers
    Account {
        #[arg(long)]
        id: i64,
    },
    /// Check database health
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.env) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = init_logging(&config);

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &AppConfig) -> Result<ExitCode> {
    let converter = Arc::new(
        CurrencyConverter::new(&config.currency).context("Invalid currency rate table")?,
    );

    match command {
        Commands::Convert { from, to, amount } => {
            let converted = converter.convert(&from, &to, amount)?;
            print_json(&json!({
                "from": from,
                "to": to,
                "amount": amount,
                "converted": converted,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Health => {
            let db = connect(config).await?;
            db.health_check().await.context("Health check failed")?;
            let (size, idle) = db.pool_status();
            print_json(&json!({
                "status": "ok",
                "store": "postgres",
                "base_currency": converter.base(),
                "connections": size,
                "idle": idle,
                "currencies": converter.currencies(),
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Account { id } => {
            let db = connect(config).await?;
            let ledger = db.ledger(&config.ledger);
            let Some(account) = ledger.get_account(id).await? else {
                print_json(&json!({ "error": { "code": "ACCOUNT_NOT_FOUND", "account_id": id } }))?;
                return Ok(ExitCode::from(2));
            };
            let entries = ledger.list_entries(id).await?;
            let transfers = ledger.list_transfers(id).await?;
            print_json(&json!({
                "account": account,
                "entries": entries,
                "transfers": transfers,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Transfer {
            from,
            to,
            amount,
            currency,
            cid,
        } => {
            let db = connect(config).await?;
            let store: Arc<dyn LedgerStore> = Arc::new(db.ledger(&config.ledger));
            let engine = TransferEngine::new(store, converter);

            let mut req = TransferRequest::new(from, to, amount, currency);
            req.cid = cid;

            match engine.execute(&req).await {
                Ok(result) => {
                    print_json(&result)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    print_json(&error_body(&e))?;
                    Ok(ExitCode::from(2))
                }
            }
        }
    }
}

async fn connect(config: &AppConfig) -> Result<Database> {
    let url = config
        .postgres_url
        .as_deref()
        .context("postgres_url is not configured (set it in the config file or DATABASE_URL)")?;
    Database::connect(url, &config.ledger)
        .await
        .context("Failed to connect to PostgreSQL")
}

fn error_body(e: &TransferError) -> serde_json::Value {
    json!({
        "error": {
            "code": e.code(),
            "status": e.http_status(),
            "message": e.to_string(),
            "retryable": e.is_retryable(),
        }
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
