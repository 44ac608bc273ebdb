mod config_cmd;
mod dashboard;
mod profile;
mod record;
mod register;
mod roster;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use dashboard::DashboardCommand;
pub use profile::ProfileCommand;
pub use record::{RecordCommand, RecordSubcommand};
pub use register::RegisterCommand;
pub use roster::RosterCommand;
pub use sync_cmd::SyncCommand;

use asha_field_core::{EntryPoint, KeyValueStore, Payload, Profile, ProfileRegistry, Role};
use clap::ValueEnum;
use serde_json::Value;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Parse `KEY=VALUE` arguments into a payload.
///
/// Values are kept as text; an empty value is allowed and later rejected by
/// required-field validation.
pub fn parse_fields(args: &[String]) -> Result<Payload, String> {
    let mut payload = Payload::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("Invalid field '{}'. Use KEY=VALUE.", arg))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid field '{}'. Key must not be empty.", arg));
        }
        payload.insert(key.to_string(), Value::String(value.trim().to_string()));
    }
    Ok(payload)
}

/// Loads the profile for `role`, or explains how to register.
pub async fn require_profile<S: KeyValueStore>(
    registry: &ProfileRegistry<S>,
    role: Role,
) -> Result<Profile, Box<dyn std::error::Error>> {
    if registry.entry_point(role).await? == EntryPoint::Registration {
        return Err(format!(
            "This device has no {} profile. Register first with 'asha register {}'.",
            role.to_string().to_uppercase(),
            role
        )
        .into());
    }
    registry
        .get(role)
        .await?
        .ok_or_else(|| format!("{} profile not found", role).into())
}
