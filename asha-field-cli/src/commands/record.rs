use asha_field_core::{ModuleKey, ProfileRegistry, Record, RecordStore, Role, SyncStatus};
use clap::{Args, Subcommand};

use super::{parse_fields, require_profile, OutputFormat};
use crate::db::SqliteStore;

#[derive(Args)]
pub struct RecordCommand {
    #[command(subcommand)]
    pub command: RecordSubcommand,
}

#[derive(Subcommand)]
pub enum RecordSubcommand {
    /// Capture a new record
    Add {
        /// Module (pregnancy, child-health, family-planning, disease-surveillance, referrals, health-awareness)
        module: ModuleKey,

        /// Record field (can be repeated), e.g. --field name="Sita Devi"
        #[arg(long = "field", short = 'f', value_name = "KEY=VALUE")]
        fields: Vec<String>,

        /// Owner ID (defaults to this device's ASHA ID)
        #[arg(long)]
        owner: Option<String>,
    },

    /// List records of a module
    List {
        module: ModuleKey,

        /// Filter by status (pending, syncing, synced, failed)
        #[arg(long, short)]
        status: Option<SyncStatus>,

        /// Output format
        #[arg(long, short = 'o', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one record
    Show {
        module: ModuleKey,

        /// Client ID (e.g. P00001)
        client_id: String,

        /// Output format
        #[arg(long, short = 'o', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a record
    Delete {
        module: ModuleKey,

        /// Client ID (e.g. P00001)
        client_id: String,
    },

    /// Queue FAILED records for another sync attempt
    Reset {
        module: ModuleKey,

        /// Client ID; omit with --all to reset every failed record of the module
        client_id: Option<String>,

        #[arg(long, conflicts_with = "client_id")]
        all: bool,
    },
}

impl RecordCommand {
    pub async fn run(
        &self,
        store: &RecordStore<SqliteStore>,
        registry: &ProfileRegistry<SqliteStore>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            RecordSubcommand::Add {
                module,
                fields,
                owner,
            } => {
                let owner_id = match owner {
                    Some(id) => id.clone(),
                    None => require_profile(registry, Role::Asha).await?.worker_id,
                };
                let payload = parse_fields(fields)?;
                let record = store.create(*module, payload, owner_id).await?;

                println!("Saved {} record {}", module.title(), record.client_id);
                println!();
                print_record_details(&record);
                Ok(())
            }

            RecordSubcommand::List {
                module,
                status,
                format,
            } => {
                let records: Vec<Record> = store
                    .list(*module)
                    .await?
                    .into_iter()
                    .filter(|r| status.map_or(true, |s| r.status == s))
                    .collect();

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    }
                    OutputFormat::Text => {
                        if records.is_empty() {
                            println!("No {} records found.", module.title());
                            return Ok(());
                        }
                        println!(
                            "{:<10} {:<24} {:<16} {:<8} CREATED",
                            "ID", "NAME", "VILLAGE", "STATUS"
                        );
                        println!("{}", "-".repeat(72));
                        for record in &records {
                            println!(
                                "{:<10} {:<24} {:<16} {:<8} {}",
                                record.client_id,
                                truncate(&record.display_name(), 24),
                                truncate(&record.field("village").unwrap_or_default(), 16),
                                record.status,
                                record
                                    .created_at
                                    .map(|at| at.format("%Y-%m-%d").to_string())
                                    .unwrap_or_else(|| "-".to_string())
                            );
                        }
                        println!();
                        println!("{} record(s)", records.len());
                    }
                }
                Ok(())
            }

            RecordSubcommand::Show {
                module,
                client_id,
                format,
            } => {
                let record = store
                    .get(*module, client_id)
                    .await?
                    .ok_or_else(|| format!("Record not found: {}", client_id))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&record)?);
                    }
                    OutputFormat::Text => print_record_details(&record),
                }
                Ok(())
            }

            RecordSubcommand::Delete { module, client_id } => {
                if store.remove(*module, client_id).await? {
                    println!("Deleted {}", client_id);
                } else {
                    println!("{} does not exist; nothing deleted", client_id);
                }
                Ok(())
            }

            RecordSubcommand::Reset {
                module,
                client_id,
                all,
            } => match (client_id, all) {
                (Some(id), _) => {
                    let record = store.reset_failed(*module, id).await?;
                    println!("{} queued for sync", record.client_id);
                    Ok(())
                }
                (None, true) => {
                    let count = store.reset_all_failed(*module).await?;
                    println!("{} failed record(s) queued for sync", count);
                    Ok(())
                }
                (None, false) => Err("Specify a client ID or --all".into()),
            },
        }
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn print_record_details(record: &Record) {
    print!("{}", record);
    if let Some(at) = record.created_at {
        println!("Created: {}", at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(at) = record.synced_at {
        println!("Synced:  {}", at.format("%Y-%m-%d %H:%M"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Sita", 10), "Sita");
        assert_eq!(truncate("Kamla Devi Sharma", 8), "Kamla D…");
    }
}
