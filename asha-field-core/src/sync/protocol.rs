//! Wire types for the remote sync endpoint.
//!
//! Field names use camelCase to match the server's JSON contract:
//!
//! ```text
//! POST /records            {moduleKey, payload, ownerId, clientId}
//! POST /asha/register      {role, workerId, attributes, ...}
//! POST /phc/register       {role, workerId, attributes, ...}
//!                       -> {success, serverId?, message?}
//! ```

use serde::{Deserialize, Serialize};

use super::error::RemoteError;
use crate::models::{ModuleKey, Payload, Record};

/// One record submitted for synchronization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub module_key: ModuleKey,
    pub payload: Payload,
    pub owner_id: String,
    pub client_id: String,
}

impl From<&Record> for Submission {
    fn from(record: &Record) -> Self {
        Self {
            module_key: record.module_key,
            payload: record.payload.clone(),
            owner_id: record.owner_id.clone(),
            client_id: record.client_id.clone(),
        }
    }
}

/// Server acknowledgement of a submission or registration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    pub fn accepted(server_id: impl Into<String>) -> Self {
        Self {
            success: true,
            server_id: Some(server_id.into()),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            server_id: None,
            message: Some(message.into()),
        }
    }

    /// Returns the durable server id, or why the ack does not count as success.
    pub fn into_server_id(self) -> Result<String, RemoteError> {
        if !self.success {
            let reason = self.message.unwrap_or_else(|| "no reason given".to_string());
            return Err(RemoteError::Rejected(reason));
        }
        match self.server_id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(RemoteError::MissingServerId),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submission_wire_format() {
        let payload = json!({ "topic": "Handwashing" }).as_object().cloned().unwrap();
        let record = Record::new(ModuleKey::HealthAwareness, "HA00001", payload, "ASHA-3");

        let json = serde_json::to_value(Submission::from(&record)).unwrap();
        assert_eq!(
            json,
            json!({
                "moduleKey": "healthAwareness",
                "payload": { "topic": "Handwashing" },
                "ownerId": "ASHA-3",
                "clientId": "HA00001"
            })
        );
    }

    #[test]
    fn test_ack_parses_minimal_response() {
        let ack: Ack = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!ack.success);
        assert!(ack.server_id.is_none());
        assert!(ack.message.is_none());
    }

    #[test]
    fn test_into_server_id() {
        assert_eq!(Ack::accepted("srv-9").into_server_id().unwrap(), "srv-9");

        let err = Ack::rejected("duplicate").into_server_id().unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(ref m) if m == "duplicate"));

        let no_id = Ack {
            success: true,
            server_id: Some(" ".to_string()),
            message: None,
        };
        assert!(matches!(
            no_id.into_server_id(),
            Err(RemoteError::MissingServerId)
        ));
    }
}
