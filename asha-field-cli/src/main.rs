use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use asha_field_core::{ProfileRegistry, RecordStore};

mod commands;
mod config;
mod db;
mod sync;

use commands::{
    ConfigCommand, DashboardCommand, ProfileCommand, RecordCommand, RecordSubcommand,
    RegisterCommand, RosterCommand, SyncCommand,
};
use config::Config;
use db::SqliteStore;
use sync::try_auto_sync;

#[derive(Parser)]
#[command(name = "asha")]
#[command(version)]
#[command(about = "Offline-first field records for ASHA workers", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register this device for an ASHA worker or PHC staff member
    Register(RegisterCommand),

    /// Show or edit the registered profile
    Profile(ProfileCommand),

    /// Manage the PHC roster of ASHA workers
    Roster(RosterCommand),

    /// Capture and manage field records
    Record(RecordCommand),

    /// Upload pending records to the server
    Sync(SyncCommand),

    /// Show record counts and recent activity
    Dashboard(DashboardCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "asha=warn,asha_field_core=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        match e.downcast_ref::<asha_field_core::Error>() {
            Some(core) => {
                tracing::debug!(error = %core, "command failed");
                eprintln!("Error: {}", core.user_message());
            }
            None => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Save config path for init command
    let cli_config_path = cli.config.clone();

    let config = Config::load(cli.config)?;

    // Config commands must work even when the database cannot be opened
    if let Some(Commands::Config(cmd)) = &cli.command {
        return cmd.run(&config, cli_config_path);
    }

    let kv = Arc::new(SqliteStore::open(&config.database_path.value).await?);
    let store = RecordStore::new(Arc::clone(&kv));
    let registry = ProfileRegistry::new(kv);

    let result = execute_command(&cli.command, &store, &registry, &config).await;

    // Auto-sync AFTER write commands (only if command succeeded)
    if result.is_ok() && is_write_command(&cli.command) {
        try_auto_sync(&config, &store).await;
    }

    result
}

async fn execute_command(
    command: &Option<Commands>,
    store: &RecordStore<SqliteStore>,
    registry: &ProfileRegistry<SqliteStore>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Some(Commands::Register(cmd)) => cmd.run(registry, config).await,
        Some(Commands::Profile(cmd)) => cmd.run(registry, config).await,
        Some(Commands::Roster(cmd)) => cmd.run(registry).await,
        Some(Commands::Record(cmd)) => cmd.run(store, registry).await,
        Some(Commands::Sync(cmd)) => cmd.run(store, config).await,
        Some(Commands::Dashboard(cmd)) => cmd.run(store, registry, config).await,
        Some(Commands::Config(cmd)) => cmd.run(config, None),
        None => {
            println!("Use --help to see available commands");
            Ok(())
        }
    }
}

/// Returns true if the command queues records that should sync after execution.
fn is_write_command(cmd: &Option<Commands>) -> bool {
    matches!(
        cmd,
        Some(Commands::Record(r)) if matches!(r.command,
            RecordSubcommand::Add { .. } | RecordSubcommand::Reset { .. })
    )
}
