use asha_field_core::{ProfileRegistry, RegistrationOutcome, Role};
use clap::{Args, Subcommand};

use super::{parse_fields, require_profile, OutputFormat};
use crate::config::Config;
use crate::db::SqliteStore;
use crate::sync::SyncClient;

#[derive(Args)]
pub struct ProfileCommand {
    #[command(subcommand)]
    pub command: ProfileSubcommand,
}

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    /// Show the registered profile
    Show {
        /// Role (asha, phc)
        role: Role,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Edit profile attributes
    Edit {
        /// Role (asha, phc)
        role: Role,

        /// Attribute to set (can be repeated)
        #[arg(long = "set", value_name = "KEY=VALUE", required = true)]
        changes: Vec<String>,
    },

    /// Register a locally saved profile with the server
    Sync {
        /// Role (asha, phc)
        role: Role,
    },
}

impl ProfileCommand {
    pub async fn run(
        &self,
        registry: &ProfileRegistry<SqliteStore>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ProfileSubcommand::Show { role, format } => {
                let profile = require_profile(registry, *role).await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&profile)?);
                    }
                    OutputFormat::Text => {
                        print!("{}", profile);
                        if let Some(at) = profile.registered_at {
                            println!("Registered: {}", at.format("%Y-%m-%d %H:%M"));
                        }
                    }
                }
                Ok(())
            }

            ProfileSubcommand::Edit { role, changes } => {
                require_profile(registry, *role).await?;
                let changes = parse_fields(changes)?;
                let updated = registry.update(*role, changes).await?;
                println!("Updated profile for {}", updated.display_name());
                Ok(())
            }

            ProfileSubcommand::Sync { role } => {
                require_profile(registry, *role).await?;
                let client = SyncClient::from_config(&config.sync)?;
                if !client.is_configured() {
                    return Err(asha_field_core::Error::from(
                        asha_field_core::RemoteError::NotConfigured,
                    )
                    .into());
                }

                match registry.complete_registration(*role, &client).await? {
                    RegistrationOutcome::Registered(profile) => {
                        println!(
                            "{} is registered with the server (Server ID: {})",
                            profile.display_name(),
                            profile.server_id.as_deref().unwrap_or("-")
                        );
                    }
                    RegistrationOutcome::Deferred { reason, .. } => {
                        println!("Server registration still pending: {}", reason);
                    }
                }
                Ok(())
            }
        }
    }
}
