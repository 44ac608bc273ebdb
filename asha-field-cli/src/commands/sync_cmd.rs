//! Sync CLI commands for uploading records to the server.

use asha_field_core::sync::{RecordOutcome, SyncReport};
use asha_field_core::{summarize, RecordStore, RemoteError, Scope, SyncEngine};
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};

use crate::config::Config;
use crate::db::SqliteStore;
use crate::sync::SyncClient;

/// Upload pending records to the server
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration, server status and queue sizes
    Status,
}

impl SyncCommand {
    pub async fn run(
        &self,
        store: &RecordStore<SqliteStore>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None => self.sync(store, config).await,
            Some(SyncSubcommand::Status) => self.status(store, config).await,
        }
    }

    async fn sync(
        &self,
        store: &RecordStore<SqliteStore>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let client = SyncClient::from_config(&config.sync)?;
        if !client.is_configured() {
            return Err(asha_field_core::Error::from(RemoteError::NotConfigured).into());
        }

        // A previous process may have exited mid-pass.
        let recovered = store.recover_orphans().await?;
        if recovered > 0 {
            println!("Recovered {} record(s) from an interrupted sync", recovered);
        }

        println!("Syncing with server...");
        println!();

        let engine = SyncEngine::new(store.clone(), client, config.sync.settings());
        let report = engine.run_pass().await?;
        print_report(&report, config.sync.retry_budget.max(1));

        println!();
        println!("{}", report);
        if report.failed() > 0 {
            println!("Use 'asha record reset <module> --all' to retry failed records.");
        }

        Ok(())
    }

    async fn status(
        &self,
        store: &RecordStore<SqliteStore>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        let summary = summarize(
            &store.snapshot().await?,
            &Scope::Device,
            Utc::now(),
            Duration::zero(),
        );
        println!("Pending:   {}", summary.totals.pending + summary.totals.syncing);
        println!("Synced:    {}", summary.totals.synced);
        println!("Failed:    {}", summary.totals.failed);
        println!();

        if !config.sync.is_configured() {
            println!("Status: Not configured");
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  sync:");
            println!("    base_url: \"http://10.10.100.167:8080/healthapp/api\"");
            println!();
            println!("Or set environment variable:");
            println!("  ASHA_SYNC_URL");
            return Ok(());
        }

        let client = SyncClient::from_config(&config.sync)?;
        if let SyncClient::Http(remote) = &client {
            println!("Server:    {}", remote.base_url());
        }
        println!(
            "Auto-sync: {}",
            if config.sync.auto_sync {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!("Retries:   {}", config.sync.retry_budget);
        println!();

        print!("Server status: ");
        if client.check_health().await {
            println!("✓ connected");
        } else {
            println!("✗ unreachable");
        }

        Ok(())
    }
}

fn print_report(report: &SyncReport, budget: u32) {
    for (module, error) in &report.module_errors {
        println!("  ✗ {} - {}", module, error);
    }
    for record in &report.records {
        match &record.outcome {
            RecordOutcome::Synced { server_id } => {
                println!("  ✓ {} {} -> {}", record.module, record.client_id, server_id)
            }
            RecordOutcome::Retrying { attempts, reason } => println!(
                "  ↻ {} {} - will retry ({}/{}): {}",
                record.module, record.client_id, attempts, budget, reason
            ),
            RecordOutcome::Failed { attempts, reason } => println!(
                "  ✗ {} {} - failed after {} attempts: {}",
                record.module, record.client_id, attempts, reason
            ),
            RecordOutcome::Abandoned => println!(
                "  - {} {} - deleted during sync",
                record.module, record.client_id
            ),
            RecordOutcome::Error(e) => {
                println!("  ! {} {} - {}", record.module, record.client_id, e)
            }
        }
    }
}
