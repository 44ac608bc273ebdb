use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::record::Payload;

/// The role a device is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Asha,
    Phc,
}

impl Role {
    /// Storage key of the role's profile.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Role::Asha => "ashaProfile",
            Role::Phc => "phcProfile",
        }
    }

    /// Attributes that must be present and non-blank at registration.
    pub fn required_attributes(&self) -> &'static [&'static str] {
        match self {
            Role::Asha => &["name", "age", "phone", "village"],
            Role::Phc => &["fullName", "designation", "phone", "areaCovered"],
        }
    }

    /// Label of the worker id as entered on the registration form.
    pub fn id_label(&self) -> &'static str {
        match self {
            Role::Asha => "ASHA ID",
            Role::Phc => "PHC ID",
        }
    }

    /// Path segment of the registration endpoint.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Role::Asha => "asha",
            Role::Phc => "phc",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Asha => write!(f, "asha"),
            Role::Phc => write!(f, "phc"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asha" => Ok(Role::Asha),
            "phc" => Ok(Role::Phc),
            _ => Err(format!("Invalid role '{}'. Valid options: asha, phc", s)),
        }
    }
}

/// The registered identity of this device for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub role: Role,
    /// ASHA ID or PHC ID; stamped as `ownerId` on records.
    pub worker_id: String,
    /// Stable identifier assigned by the server once registered there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default)]
    pub attributes: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn new(role: Role, worker_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            role,
            worker_id: worker_id.into(),
            server_id: None,
            attributes: Payload::new(),
            registered_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), Value::String(value.into()));
        self
    }

    pub fn with_attributes(mut self, attributes: Payload) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Returns a non-blank attribute as text.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Required attributes of the role that are absent or blank.
    pub fn missing_attributes(&self) -> Vec<&'static str> {
        let mut missing: Vec<&'static str> = self
            .role
            .required_attributes()
            .iter()
            .copied()
            .filter(|key| match self.attributes.get(*key) {
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(Value::Number(_)) => false,
                _ => true,
            })
            .collect();
        if self.worker_id.trim().is_empty() {
            missing.insert(0, self.role.id_label());
        }
        missing
    }

    /// Display name for dashboards.
    pub fn display_name(&self) -> &str {
        self.attribute("name")
            .or_else(|| self.attribute("fullName"))
            .unwrap_or(&self.worker_id)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} profile: {}", self.role.to_string().to_uppercase(), self.display_name())?;
        writeln!(f, "{}", "=".repeat(30))?;
        writeln!(f, "{}: {}", self.role.id_label(), self.worker_id)?;
        match &self.server_id {
            Some(id) => writeln!(f, "Server ID: {}", id)?,
            None => writeln!(f, "Server ID: (not registered with server)")?,
        }
        for (key, value) in &self.attributes {
            match value {
                Value::String(s) => writeln!(f, "  {}: {}", key, s)?,
                other => writeln!(f, "  {}: {}", key, other)?,
            }
        }
        Ok(())
    }
}

/// An ASHA worker supervised by this PHC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterMember {
    pub asha_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village: Option<String>,
}

impl RosterMember {
    pub fn new(asha_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            asha_id: asha_id.into(),
            name: name.into(),
            village: None,
        }
    }

    pub fn with_village(mut self, village: impl Into<String>) -> Self {
        self.village = Some(village.into());
        self
    }
}
