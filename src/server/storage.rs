//! Server-side storage of accepted records and worker registrations.
//!
//! One JSON file per module and per role:
//! ```text
//! <DATA_DIR>/
//!   records/
//!     pregnancy.json
//!     childHealth.json
//!     ...
//!   registrations/
//!     asha.json
//!     phc.json
//! ```
//!
//! Server ids are assigned once per `(moduleKey, ownerId, clientId)` and per
//! `(role, workerId)`, so a retried submission gets the id it was first given.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use asha_field_core::models::missing_fields;
use asha_field_core::sync::Submission;
use asha_field_core::{ModuleKey, Payload, Profile, Role};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record accepted from a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub server_id: String,
    pub module_key: ModuleKey,
    pub owner_id: String,
    pub client_id: String,
    pub payload: Payload,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A registered worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRegistration {
    pub server_id: String,
    pub role: Role,
    pub worker_id: String,
    pub attributes: Payload,
    pub registered_at: DateTime<Utc>,
}

/// Result of storing a submission or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub server_id: String,
    /// False when the same submission had been accepted before.
    pub created: bool,
}

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum ServerStorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// A stored file could not be parsed.
    CorruptFile(PathBuf, serde_json::Error),
    /// The submission is not acceptable.
    Invalid(String),
}

impl std::fmt::Display for ServerStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            ServerStorageError::CorruptFile(path, e) => {
                write!(f, "Failed to parse {}: {}", path.display(), e)
            }
            ServerStorageError::Invalid(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for ServerStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerStorageError::IoError(_, e) => Some(e),
            ServerStorageError::CorruptFile(_, e) => Some(e),
            ServerStorageError::Invalid(_) => None,
        }
    }
}

/// File-backed store for the reference sync endpoint.
///
/// Read-modify-write cycles are serialized by one lock; the server handles
/// few devices and every write touches a single small file.
#[derive(Debug)]
pub struct ServerStorage {
    data_dir: PathBuf,
    lock: Mutex<()>,
}

impl ServerStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn records_path(&self, module: ModuleKey) -> PathBuf {
        self.data_dir
            .join("records")
            .join(format!("{}.json", module.as_str()))
    }

    fn registrations_path(&self, role: Role) -> PathBuf {
        self.data_dir
            .join("registrations")
            .join(format!("{}.json", role))
    }

    /// Stores a submitted record and returns its server id.
    ///
    /// A resubmission of the same `(moduleKey, ownerId, clientId)` updates the
    /// payload and keeps the original server id.
    pub fn accept_record(&self, submission: &Submission) -> Result<Accepted, ServerStorageError> {
        if submission.client_id.trim().is_empty() {
            return Err(ServerStorageError::Invalid("clientId is required".into()));
        }
        if submission.owner_id.trim().is_empty() {
            return Err(ServerStorageError::Invalid("ownerId is required".into()));
        }
        let missing = missing_fields(submission.module_key, &submission.payload);
        if !missing.is_empty() {
            return Err(ServerStorageError::Invalid(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.records_path(submission.module_key);
        let mut records: Vec<StoredRecord> = read_json(&path)?;
        let now = Utc::now();

        if let Some(existing) = records
            .iter_mut()
            .find(|r| r.owner_id == submission.owner_id && r.client_id == submission.client_id)
        {
            existing.payload = submission.payload.clone();
            existing.updated_at = now;
            let server_id = existing.server_id.clone();
            write_json(&path, &records)?;
            return Ok(Accepted {
                server_id,
                created: false,
            });
        }

        let server_id = format!("srv-{}", Uuid::new_v4());
        records.push(StoredRecord {
            server_id: server_id.clone(),
            module_key: submission.module_key,
            owner_id: submission.owner_id.clone(),
            client_id: submission.client_id.clone(),
            payload: submission.payload.clone(),
            received_at: now,
            updated_at: now,
        });
        write_json(&path, &records)?;

        Ok(Accepted {
            server_id,
            created: true,
        })
    }

    /// Records accepted for one module, in arrival order.
    pub fn records(&self, module: ModuleKey) -> Result<Vec<StoredRecord>, ServerStorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        read_json(&self.records_path(module))
    }

    /// Registers a worker, or refreshes the attributes of a known one.
    pub fn register(&self, role: Role, profile: &Profile) -> Result<Accepted, ServerStorageError> {
        if profile.role != role {
            return Err(ServerStorageError::Invalid(format!(
                "profile is for role {}, not {}",
                profile.role, role
            )));
        }
        let missing = profile.missing_attributes();
        if !missing.is_empty() {
            return Err(ServerStorageError::Invalid(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.registrations_path(role);
        let mut registrations: Vec<StoredRegistration> = read_json(&path)?;

        if let Some(existing) = registrations
            .iter_mut()
            .find(|r| r.worker_id == profile.worker_id)
        {
            existing.attributes = profile.attributes.clone();
            let server_id = existing.server_id.clone();
            write_json(&path, &registrations)?;
            return Ok(Accepted {
                server_id,
                created: false,
            });
        }

        let server_id = format!("{}-{}", role, Uuid::new_v4());
        registrations.push(StoredRegistration {
            server_id: server_id.clone(),
            role,
            worker_id: profile.worker_id.clone(),
            attributes: profile.attributes.clone(),
            registered_at: Utc::now(),
        });
        write_json(&path, &registrations)?;

        Ok(Accepted {
            server_id,
            created: true,
        })
    }

    pub fn registrations(&self, role: Role) -> Result<Vec<StoredRegistration>, ServerStorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        read_json(&self.registrations_path(role))
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ServerStorageError> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| ServerStorageError::CorruptFile(path.to_path_buf(), e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(ServerStorageError::IoError(path.to_path_buf(), e)),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ServerStorageError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| ServerStorageError::IoError(dir.to_path_buf(), e))?;
    }

    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| ServerStorageError::CorruptFile(path.to_path_buf(), e))?;

    // Write atomically using temp file + rename
    let temp_path = path.with_extension("json.tmp");
    let mut file =
        fs::File::create(&temp_path).map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;
    file.write_all(&bytes)
        .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;
    file.sync_all()
        .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;

    fs::rename(&temp_path, path).map_err(|e| ServerStorageError::IoError(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (ServerStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = ServerStorage::new(temp_dir.path());
        (storage, temp_dir)
    }

    fn submission(owner: &str, client_id: &str) -> Submission {
        Submission {
            module_key: ModuleKey::Referrals,
            payload: json!({
                "patientName": "Ramesh",
                "reason": "High fever",
                "referredTo": "PHC Rampur",
                "village": "Rampur"
            })
            .as_object()
            .cloned()
            .unwrap(),
            owner_id: owner.to_string(),
            client_id: client_id.to_string(),
        }
    }

    #[test]
    fn test_resubmission_keeps_server_id() {
        let (storage, _temp) = setup();

        let first = storage.accept_record(&submission("ASHA-1", "R00001")).unwrap();
        let second = storage.accept_record(&submission("ASHA-1", "R00001")).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.server_id, second.server_id);
        assert_eq!(storage.records(ModuleKey::Referrals).unwrap().len(), 1);
    }

    #[test]
    fn test_same_client_id_from_different_owners_is_distinct() {
        let (storage, _temp) = setup();

        let a = storage.accept_record(&submission("ASHA-1", "R00001")).unwrap();
        let b = storage.accept_record(&submission("ASHA-2", "R00001")).unwrap();

        assert_ne!(a.server_id, b.server_id);
        assert_eq!(storage.records(ModuleKey::Referrals).unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_incomplete_payload() {
        let (storage, _temp) = setup();
        let mut incomplete = submission("ASHA-1", "R00001");
        incomplete.payload.remove("reason");

        let err = storage.accept_record(&incomplete).unwrap_err();

        assert_eq!(err.to_string(), "missing required fields: reason");
        assert!(storage.records(ModuleKey::Referrals).unwrap().is_empty());
    }

    #[test]
    fn test_records_persist_across_instances() {
        let temp = TempDir::new().unwrap();
        let id = ServerStorage::new(temp.path())
            .accept_record(&submission("ASHA-1", "R00001"))
            .unwrap()
            .server_id;

        let reopened = ServerStorage::new(temp.path());
        let records = reopened.records(ModuleKey::Referrals).unwrap();
        assert_eq!(records[0].server_id, id);
        assert!(temp.path().join("records").join("referrals.json").exists());
    }

    #[test]
    fn test_register_is_idempotent_per_worker() {
        let (storage, _temp) = setup();
        let profile = Profile::new(Role::Phc, "PHC-1")
            .with_attribute("fullName", "Dr. Rao")
            .with_attribute("designation", "Medical Officer")
            .with_attribute("phone", "9876500000")
            .with_attribute("areaCovered", "Rampur block");

        let first = storage.register(Role::Phc, &profile).unwrap();
        let second = storage.register(Role::Phc, &profile).unwrap();

        assert!(first.server_id.starts_with("phc-"));
        assert_eq!(first.server_id, second.server_id);
        assert_eq!(storage.registrations(Role::Phc).unwrap().len(), 1);
        assert!(storage.registrations(Role::Asha).unwrap().is_empty());
    }

    #[test]
    fn test_register_rejects_incomplete_profile() {
        let (storage, _temp) = setup();
        let profile = Profile::new(Role::Asha, "ASHA-1").with_attribute("name", "Meena");
        assert!(storage.register(Role::Asha, &profile).is_err());
    }
}
