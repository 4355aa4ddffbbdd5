use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use escalated_core::core::config::Config;
use escalated_core::core::database;
use escalated_core::features::tickets::events::TracingEventSink;
use escalated_core::features::tickets::services::{
    BusinessCalendar, EscalationEngine, LifecycleConfig, LifecycleService, SlaEngine,
};
use escalated_core::features::tickets::store::TicketStore;
use escalated_core::features::tickets::stores::{PgDirectory, PgStore};

/// Batch entry points for the ticketing engine, meant to be run from cron.
#[derive(Parser)]
#[command(name = "escalated", version, about = "Support ticketing engine batch commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check all open tickets for SLA breaches and send warnings.
    SweepSla {
        /// Minutes before an SLA deadline to trigger a warning.
        #[arg(long)]
        warning_threshold: Option<i64>,
    },
    /// Evaluate all active escalation rules against open tickets.
    EvaluateEscalations,
    /// Auto-close tickets that have been resolved for a number of days.
    CloseResolved {
        /// Days after resolution to auto-close (overrides config).
        #[arg(long)]
        days: Option<i64>,
        /// Show what would be closed without making changes.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the subscriber so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let pool = database::create_pool(&config.database).await?;
    let store = Arc::new(PgStore::new(pool.clone()));
    let directory = Arc::new(PgDirectory::new(pool));
    let events = Arc::new(TracingEventSink);
    let calendar = BusinessCalendar::from_config(&config.sla);

    match cli.command {
        Command::SweepSla { warning_threshold } => {
            let threshold = warning_threshold.unwrap_or(config.sla.warning_threshold_minutes);
            let engine = SlaEngine::new(store, events, calendar);

            println!("Checking SLA deadlines for all open tickets...");
            let outcome = engine.sweep_all(threshold).await?;
            println!(
                "SLA check complete: {} breaches detected, {} warnings sent.",
                outcome.breached, outcome.warned
            );
        }
        Command::EvaluateEscalations => {
            let engine = EscalationEngine::new(store, directory, events);

            println!("Evaluating escalation rules...");
            let actions_taken = engine.evaluate_all().await?;
            println!(
                "Escalation evaluation complete: {} actions taken.",
                actions_taken
            );
        }
        Command::CloseResolved { days, dry_run } => {
            let lifecycle_config = LifecycleConfig::from_config(&config.tickets);
            let days = days.unwrap_or(lifecycle_config.auto_close_resolved_after_days);

            if dry_run {
                let threshold = Utc::now() - Duration::days(days);
                let stale = store.list_resolved_before(threshold).await?;
                println!(
                    "[DRY RUN] Would close {} tickets resolved more than {} days ago.",
                    stale.len(),
                    days
                );
                for ticket in stale.iter().take(20) {
                    println!("  - {}: {}", ticket.reference, ticket.subject);
                }
                return Ok(());
            }

            let service = LifecycleService::new(store, events, lifecycle_config, calendar);
            let closed = service.close_resolved(days).await?;
            if closed == 0 {
                println!("No resolved tickets to auto-close.");
            } else {
                println!(
                    "Auto-closed {} tickets that were resolved more than {} days ago.",
                    closed, days
                );
            }
        }
    }

    Ok(())
}
