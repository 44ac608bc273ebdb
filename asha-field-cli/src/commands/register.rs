use asha_field_core::{Profile, ProfileRegistry, RegistrationOutcome, Role};
use clap::{Args, Subcommand};

use super::parse_fields;
use crate::config::Config;
use crate::db::SqliteStore;
use crate::sync::SyncClient;

#[derive(Args)]
pub struct RegisterCommand {
    #[command(subcommand)]
    pub command: RegisterSubcommand,
}

#[derive(Subcommand)]
pub enum RegisterSubcommand {
    /// Register this device for an ASHA worker
    Asha {
        /// ASHA ID
        #[arg(long = "id", value_name = "ASHA_ID")]
        asha_id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        age: String,

        #[arg(long)]
        phone: String,

        #[arg(long)]
        village: String,

        /// Extra attribute (can be repeated)
        #[arg(long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,
    },

    /// Register this device for a PHC officer
    Phc {
        /// PHC ID
        #[arg(long = "id", value_name = "PHC_ID")]
        phc_id: String,

        #[arg(long)]
        full_name: String,

        #[arg(long)]
        designation: String,

        #[arg(long)]
        phone: String,

        /// Villages or block covered by the PHC
        #[arg(long)]
        area_covered: String,

        /// Extra attribute (can be repeated)
        #[arg(long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,
    },
}

impl RegisterCommand {
    pub async fn run(
        &self,
        registry: &ProfileRegistry<SqliteStore>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let profile = self.profile()?;
        let role = profile.role;

        if registry.get(role).await?.is_some() {
            return Err(format!(
                "This device is already registered for {}. Use 'asha profile edit {}' to change details.",
                role.to_string().to_uppercase(),
                role
            )
            .into());
        }

        let client = SyncClient::from_config(&config.sync)?;
        let outcome = registry.register(role, profile, &client).await?;

        match &outcome {
            RegistrationOutcome::Registered(profile) => {
                println!("Registered {} ({})", profile.display_name(), profile.worker_id);
                if let Some(id) = &profile.server_id {
                    println!("Server ID: {}", id);
                }
            }
            RegistrationOutcome::Deferred { profile, reason } => {
                println!(
                    "Saved {} ({}) on this device.",
                    profile.display_name(),
                    profile.worker_id
                );
                if client.is_configured() {
                    println!("Server registration deferred: {}", reason);
                    println!("Run 'asha profile sync {}' when online.", role);
                }
            }
        }

        Ok(())
    }

    fn profile(&self) -> Result<Profile, String> {
        let profile = match &self.command {
            RegisterSubcommand::Asha {
                asha_id,
                name,
                age,
                phone,
                village,
                attrs,
            } => Profile::new(Role::Asha, asha_id.trim())
                .with_attributes(parse_fields(attrs)?)
                .with_attribute("name", name.trim())
                .with_attribute("age", age.trim())
                .with_attribute("phone", phone.trim())
                .with_attribute("village", village.trim()),
            RegisterSubcommand::Phc {
                phc_id,
                full_name,
                designation,
                phone,
                area_covered,
                attrs,
            } => Profile::new(Role::Phc, phc_id.trim())
                .with_attributes(parse_fields(attrs)?)
                .with_attribute("fullName", full_name.trim())
                .with_attribute("designation", designation.trim())
                .with_attribute("phone", phone.trim())
                .with_attribute("areaCovered", area_covered.trim()),
        };
        Ok(profile)
    }
}
