//! # till-ops Entry Point
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Initialize Logging                                                 │
//! │     • tracing-subscriber with env filter, stderr                       │
//! │     • Default: info,till=debug,sqlx=warn (override with RUST_LOG)      │
//! │                                                                         │
//! │  2. Load Configuration                                                 │
//! │     • defaults → ledger.toml → TILL_* environment                      │
//! │                                                                         │
//! │  3. Open Database                                                      │
//! │     • SQLite with WAL mode, busy timeout                               │
//! │     • Run pending migrations (schema + append-only triggers)           │
//! │                                                                         │
//! │  4. Run Command                                                        │
//! │     • JSON result on stdout, JSON error on stderr                      │
//! │     • Notable actions appended to the event log                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cli;
mod error;

use serde::Serialize;
use std::process::ExitCode;
use till_ledger::{EventLog, IntegritySweep, InventoryLedger, LedgerConfig, LedgerStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Command, Invocation};
use error::{OpsError, OpsResult};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match cli::parse(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            report_error(&e);
            eprintln!();
            eprintln!("{}", cli::USAGE);
            return ExitCode::from(2);
        }
    };

    if invocation.command == Command::Help {
        println!("{}", cli::USAGE);
        return ExitCode::SUCCESS;
    }

    match run(invocation).await {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr so stdout stays valid JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,till=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report_error(err: &OpsError) {
    error!(code = err.code, "{}", err.message);
    match serde_json::to_string(err) {
        Ok(json) => eprintln!("{}", json),
        Err(_) => eprintln!("{}", err),
    }
}

fn print_json<T: Serialize>(value: &T) -> OpsResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(invocation: Invocation) -> OpsResult<ExitCode> {
    let config = LedgerConfig::load(invocation.config_path)?;
    info!(db_path = %config.database.path.display(), "Opening ledger");

    let store = LedgerStore::open(&config).await?;
    let events = config.audit.event_log_path.as_ref().map(EventLog::new);
    let note = |event: &str| {
        if let Some(log) = &events {
            log.note(event);
        }
    };

    let name = invocation.command.name();
    note(&format!("till-ops {} started", name));

    let db = store.db();
    let mut exit = ExitCode::SUCCESS;

    match invocation.command {
        Command::Sweep => {
            let report = sweeper(&store, &events).run_once().await?;
            if !report.is_clean() {
                exit = ExitCode::from(1);
            }
            print_json(&report)?;
        }

        Command::Watch => {
            let period = config.sweep_interval();
            if !config.integrity.enabled {
                return Err(OpsError::new(
                    "CONFIG_ERROR",
                    "integrity sweep is disabled in [integrity]",
                ));
            }

            note("integrity watch started");
            let handle = sweeper(&store, &events).spawn_periodic(period);

            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }

            info!("Ctrl-C received, stopping");
            handle.shutdown().await;
            note("integrity watch stopped");
        }

        Command::Summary { date } => {
            let summary = db.reports().daily_summary(date).await?;
            note(&format!("viewed daily summary for {}", date));
            print_json(&summary)?;
        }

        Command::Totals { from, to } => {
            print_json(&db.reports().daily_totals(from, to).await?)?;
        }

        Command::Items { from, to, limit } => {
            print_json(&db.reports().item_rollup(from, to, limit).await?)?;
        }

        Command::Cashiers { from, to } => {
            print_json(&db.reports().cashier_performance(from, to).await?)?;
        }

        Command::Corrections { from, to } => {
            let rows = db.reports().corrections_between(from, to).await?;
            note(&format!("viewed correction report {} to {}", from, to));
            print_json(&rows)?;
        }

        Command::Export { from, to, columns } => {
            let table = db.reports().export_sales(from, to, &columns).await?;
            note(&format!(
                "exported {} sale row(s) {} to {} [{}]",
                table.rows.len(),
                from,
                to,
                table.columns.join(",")
            ));
            print_json(&table)?;
        }

        Command::Stock => {
            print_json(&InventoryLedger::new(store.clone()).list_all().await?)?;
        }

        Command::Receipt { sale_id } => {
            let receipt = db
                .sales()
                .receipt(sale_id)
                .await?
                .ok_or_else(|| OpsError::not_found("Sale", sale_id))?;
            print_json(&receipt)?;
        }

        Command::History { item, limit } => {
            print_json(&db.reports().item_history(&item, limit).await?)?;
        }

        Command::Recent { limit } => {
            print_json(&db.sales().recent(limit).await?)?;
        }

        Command::Help => println!("{}", cli::USAGE),
    }

    note(&format!("till-ops {} finished", name));
    db.close().await;
    Ok(exit)
}

fn sweeper(store: &LedgerStore, events: &Option<EventLog>) -> IntegritySweep {
    let sweep = IntegritySweep::new(store.clone());
    match events {
        Some(log) => sweep.with_event_log(log.clone()),
        None => sweep,
    }
}
