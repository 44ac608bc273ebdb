use asha_field_core::{phc_rollup, summarize, ProfileRegistry, RecordStore, Role, Scope};
use chrono::Utc;
use clap::{Args, Subcommand};

use super::{require_profile, OutputFormat};
use crate::config::Config;
use crate::db::SqliteStore;

#[derive(Args)]
pub struct DashboardCommand {
    #[command(subcommand)]
    pub command: DashboardSubcommand,
}

#[derive(Subcommand)]
pub enum DashboardSubcommand {
    /// ASHA worker dashboard: record counts for this device
    Asha {
        /// Only count records created by this device's ASHA ID
        #[arg(long)]
        mine: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// PHC dashboard: per-worker counts for the roster
    Phc {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl DashboardCommand {
    pub async fn run(
        &self,
        store: &RecordStore<SqliteStore>,
        registry: &ProfileRegistry<SqliteStore>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let now = Utc::now();
        let window = config.recent_window();

        match &self.command {
            DashboardSubcommand::Asha { mine, format } => {
                let profile = require_profile(registry, Role::Asha).await?;
                let scope = if *mine {
                    Scope::Owner(profile.worker_id.clone())
                } else {
                    Scope::Device
                };
                let summary = summarize(&store.snapshot().await?, &scope, now, window);

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&summary)?);
                    }
                    OutputFormat::Text => {
                        println!("Welcome, {}", profile.display_name());
                        println!("{}", "=".repeat(40));
                        println!();
                        print!("{}", summary);
                        println!();
                        println!("Recent = created in the last {} days", window.num_days());
                    }
                }
                Ok(())
            }

            DashboardSubcommand::Phc { format } => {
                let profile = require_profile(registry, Role::Phc).await?;
                let roster = registry.roster().await?;
                let rollup = phc_rollup(&store.snapshot().await?, &roster, now, window);

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&rollup)?);
                    }
                    OutputFormat::Text => {
                        println!("Welcome, {}", profile.display_name());
                        println!("{}", "=".repeat(40));
                        println!();
                        print!("{}", rollup);
                        if roster.is_empty() {
                            println!();
                            println!("Add ASHA workers with 'asha roster add <ASHA_ID> --name <NAME>'.");
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
