use asha_field_core::{ProfileRegistry, RosterMember};
use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::db::SqliteStore;

#[derive(Args)]
pub struct RosterCommand {
    #[command(subcommand)]
    pub command: RosterSubcommand,
}

#[derive(Subcommand)]
pub enum RosterSubcommand {
    /// Add an ASHA worker to the roster (replaces an entry with the same ID)
    Add {
        /// ASHA ID
        asha_id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        village: Option<String>,
    },

    /// List ASHA workers on the roster
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Remove an ASHA worker from the roster
    Remove {
        /// ASHA ID
        asha_id: String,
    },
}

impl RosterCommand {
    pub async fn run(
        &self,
        registry: &ProfileRegistry<SqliteStore>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            RosterSubcommand::Add {
                asha_id,
                name,
                village,
            } => {
                let mut member = RosterMember::new(asha_id.trim(), name.trim());
                if let Some(v) = village {
                    member = member.with_village(v.trim());
                }
                registry.enroll(member).await?;
                println!("Added {} ({}) to the roster", name.trim(), asha_id.trim());
                Ok(())
            }

            RosterSubcommand::List { format } => {
                let roster = registry.roster().await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&roster)?);
                    }
                    OutputFormat::Text => {
                        if roster.is_empty() {
                            println!("No ASHA workers on the roster.");
                            return Ok(());
                        }
                        println!("{:<12} {:<24} VILLAGE", "ASHA ID", "NAME");
                        println!("{}", "-".repeat(50));
                        for member in &roster {
                            println!(
                                "{:<12} {:<24} {}",
                                member.asha_id,
                                member.name,
                                member.village.as_deref().unwrap_or("-")
                            );
                        }
                    }
                }
                Ok(())
            }

            RosterSubcommand::Remove { asha_id } => {
                if registry.unenroll(asha_id).await? {
                    println!("Removed {} from the roster", asha_id);
                } else {
                    println!("{} is not on the roster", asha_id);
                }
                Ok(())
            }
        }
    }
}
