use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::module_key::ModuleKey;
use super::status::SyncStatus;
use crate::error::Error;

/// Free-form, module specific record fields.
pub type Payload = Map<String, Value>;

/// One entry of a module, e.g. a registered pregnancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub client_id: String,
    pub module_key: ModuleKey,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub status: SyncStatus,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(
        module_key: ModuleKey,
        client_id: impl Into<String>,
        payload: Payload,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            module_key,
            payload,
            status: SyncStatus::Pending,
            owner_id: owner_id.into(),
            server_id: None,
            attempts: 0,
            last_error: None,
            created_at: Some(Utc::now()),
            synced_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Moves the record to `next`, rejecting edges outside the transition table.
    pub fn transition(&mut self, next: SyncStatus) -> Result<(), Error> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                client_id: self.client_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Returns the string value of a payload field, if present and non-blank.
    ///
    /// Numbers and booleans are rendered as text.
    pub fn field(&self, name: &str) -> Option<String> {
        field_text(&self.payload, name)
    }

    /// Required fields of the record's module that are absent or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        missing_fields(self.module_key, &self.payload)
    }

    /// Best-effort display name across module schemas.
    pub fn display_name(&self) -> String {
        ["name", "childName", "coupleName", "patientName", "topic"]
            .iter()
            .find_map(|key| self.field(key))
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Required fields of `module` that are absent or blank in `payload`.
pub fn missing_fields(module: ModuleKey, payload: &Payload) -> Vec<&'static str> {
    module
        .required_fields()
        .iter()
        .copied()
        .filter(|field| field_text(payload, field).is_none())
        .collect()
}

fn field_text(payload: &Payload, name: &str) -> Option<String> {
    match payload.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.display_name(), self.client_id)?;
        writeln!(f, "{}", "=".repeat(30))?;
        writeln!(f, "Module:  {}", self.module_key.title())?;
        writeln!(f, "Status:  {}", self.status)?;
        writeln!(f, "Owner:   {}", self.owner_id)?;

        if let Some(server_id) = &self.server_id {
            writeln!(f, "Server:  {}", server_id)?;
        }
        if self.attempts > 0 {
            writeln!(f, "Failed attempts: {}", self.attempts)?;
        }
        if let Some(err) = &self.last_error {
            writeln!(f, "Last error: {}", err)?;
        }

        if !self.payload.is_empty() {
            writeln!(f, "\nFields:")?;
            for (key, value) in &self.payload {
                match value {
                    Value::String(s) => writeln!(f, "  {}: {}", key, s)?,
                    other => writeln!(f, "  {}: {}", key, other)?,
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn pregnancy() -> Record {
        Record::new(
            ModuleKey::Pregnancy,
            "P00001",
            payload(json!({
                "name": "Sita",
                "age": "24",
                "bloodGroup": "B+",
                "edd": "12/03/2026",
                "phone": "9876543210",
                "village": "Rampur"
            })),
            "ASHA-17",
        )
    }

    #[test]
    fn test_record_new_is_pending() {
        let record = pregnancy();
        assert_eq!(record.status, SyncStatus::Pending);
        assert_eq!(record.attempts, 0);
        assert!(record.server_id.is_none());
        assert!(record.created_at.is_some());
        assert!(record.missing_fields().is_empty());
    }

    #[test]
    fn test_missing_fields_treats_blank_as_missing() {
        let mut record = pregnancy();
        record.payload.insert("phone".into(), json!("   "));
        record.payload.remove("edd");
        record.payload.insert("village".into(), Value::Null);

        assert_eq!(record.missing_fields(), vec!["edd", "phone", "village"]);
    }

    #[test]
    fn test_numeric_fields_count_as_present() {
        let mut record = pregnancy();
        record.payload.insert("age".into(), json!(24));
        assert_eq!(record.field("age"), Some("24".to_string()));
        assert!(record.missing_fields().is_empty());
    }

    #[test]
    fn test_transition_rejects_invalid_edge() {
        let mut record = pregnancy();
        let err = record.transition(SyncStatus::Synced).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(record.status, SyncStatus::Pending);

        record.transition(SyncStatus::Syncing).unwrap();
        record.transition(SyncStatus::Synced).unwrap();
        assert_eq!(record.status, SyncStatus::Synced);
    }

    #[test]
    fn test_display_name_falls_back_across_schemas() {
        let child = Record::new(
            ModuleKey::ChildHealth,
            "CH00001",
            payload(json!({ "childName": "Ravi" })),
            "ASHA-17",
        );
        assert_eq!(child.display_name(), "Ravi");

        let empty = Record::new(ModuleKey::Referrals, "R00001", Payload::new(), "ASHA-17");
        assert_eq!(empty.display_name(), "Unknown");
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let record = pregnancy();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["clientId"], "P00001");
        assert_eq!(json["moduleKey"], "pregnancy");
        assert_eq!(json["ownerId"], "ASHA-17");
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("serverId").is_none());
    }

    #[test]
    fn test_partial_record_loads_with_defaults() {
        let json = r#"{"clientId": "HA00003", "moduleKey": "healthAwareness"}"#;
        let record: Record = serde_json::from_str(json).unwrap();

        assert_eq!(record.status, SyncStatus::Pending);
        assert!(record.payload.is_empty());
        assert!(record.created_at.is_none());
        assert_eq!(record.owner_id, "");
    }

    #[test]
    fn test_record_display() {
        let output = format!("{}", pregnancy());
        assert!(output.contains("Sita (P00001)"));
        assert!(output.contains("PENDING"));
        assert!(output.contains("village: Rampur"));
    }
}
