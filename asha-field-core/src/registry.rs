//! Device profiles (one per role) and the PHC's roster of ASHA workers.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::models::{Payload, Profile, Role, RosterMember};
use crate::storage::{load_json, save_json, KeyValueStore};
use crate::sync::{RemoteEndpoint, RemoteError};

/// Storage key of the roster.
pub const ROSTER_KEY: &str = "ashaList";

/// Where the front end should send a user of a given role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// No profile stored yet.
    Registration,
    Dashboard,
}

/// Result of [`ProfileRegistry::register`].
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    /// The server accepted the profile and assigned a server id.
    Registered(Profile),
    /// The server could not be reached; the profile was saved locally only.
    Deferred { profile: Profile, reason: String },
}

impl RegistrationOutcome {
    pub fn profile(&self) -> &Profile {
        match self {
            RegistrationOutcome::Registered(profile) => profile,
            RegistrationOutcome::Deferred { profile, .. } => profile,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, RegistrationOutcome::Deferred { .. })
    }
}

pub struct ProfileRegistry<S> {
    kv: Arc<S>,
    // Serializes roster read-modify-write cycles.
    roster_lock: Arc<Mutex<()>>,
}

impl<S> Clone for ProfileRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            roster_lock: Arc::clone(&self.roster_lock),
        }
    }
}

impl<S: KeyValueStore> ProfileRegistry<S> {
    pub fn new(kv: Arc<S>) -> Self {
        Self {
            kv,
            roster_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The stored profile for `role`, if registered.
    pub async fn get(&self, role: Role) -> Result<Option<Profile>, Error> {
        Ok(load_json(self.kv.as_ref(), role.storage_key()).await?)
    }

    /// Stores `profile` as the device's profile for `role`, replacing any
    /// previous one.
    pub async fn save(&self, role: Role, profile: &Profile) -> Result<(), Error> {
        Self::validate(role, profile)?;
        save_json(self.kv.as_ref(), role.storage_key(), profile).await?;
        tracing::debug!(role = %role, worker_id = %profile.worker_id, "profile saved");
        Ok(())
    }

    pub async fn entry_point(&self, role: Role) -> Result<EntryPoint, Error> {
        Ok(match self.get(role).await? {
            Some(_) => EntryPoint::Dashboard,
            None => EntryPoint::Registration,
        })
    }

    /// Registers `profile` with the server and stores it.
    ///
    /// When the server is unreachable the profile is still stored (without a
    /// server id) and the outcome is [`RegistrationOutcome::Deferred`]. An
    /// explicit rejection stores nothing.
    pub async fn register<R: RemoteEndpoint>(
        &self,
        role: Role,
        mut profile: Profile,
        remote: &R,
    ) -> Result<RegistrationOutcome, Error> {
        Self::validate(role, &profile)?;

        let result = remote
            .register(role, &profile)
            .await
            .and_then(|ack| ack.into_server_id());

        match result {
            Ok(server_id) => {
                profile.server_id = Some(server_id);
                self.save(role, &profile).await?;
                tracing::info!(role = %role, worker_id = %profile.worker_id, "registered with server");
                Ok(RegistrationOutcome::Registered(profile))
            }
            Err(RemoteError::Rejected(message)) => {
                tracing::warn!(role = %role, message = %message, "registration rejected");
                Err(RemoteError::Rejected(message).into())
            }
            Err(err) => {
                profile.server_id = None;
                self.save(role, &profile).await?;
                tracing::warn!(role = %role, error = %err, "registration deferred, saved locally");
                Ok(RegistrationOutcome::Deferred {
                    profile,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Retries server registration of a profile saved while offline.
    ///
    /// Profiles that already have a server id are returned unchanged.
    pub async fn complete_registration<R: RemoteEndpoint>(
        &self,
        role: Role,
        remote: &R,
    ) -> Result<RegistrationOutcome, Error> {
        let profile = self
            .get(role)
            .await?
            .ok_or_else(|| Self::profile_not_found(role))?;
        if profile.server_id.is_some() {
            return Ok(RegistrationOutcome::Registered(profile));
        }
        self.register(role, profile, remote).await
    }

    /// Merges `changes` into the stored profile's attributes.
    ///
    /// The worker id and server id are not editable. A change that blanks a
    /// required attribute is rejected and nothing is written.
    pub async fn update(&self, role: Role, changes: Payload) -> Result<Profile, Error> {
        let mut profile = self
            .get(role)
            .await?
            .ok_or_else(|| Self::profile_not_found(role))?;

        profile.attributes.extend(changes);
        profile.updated_at = Some(Utc::now());
        self.save(role, &profile).await?;
        Ok(profile)
    }

    fn validate(role: Role, profile: &Profile) -> Result<(), Error> {
        let label = format!("{} profile", role);
        if profile.role != role {
            return Err(Error::validation(
                label,
                format!("profile is for role {}, not {}", profile.role, role),
            ));
        }
        let missing = profile.missing_attributes();
        if !missing.is_empty() {
            return Err(Error::validation(
                label,
                format!("missing required fields: {}", missing.join(", ")),
            ));
        }
        Ok(())
    }

    fn profile_not_found(role: Role) -> Error {
        Error::NotFound {
            module: "profiles".to_string(),
            client_id: role.storage_key().to_string(),
        }
    }

    /// ASHA workers supervised by this PHC, in enrollment order.
    pub async fn roster(&self) -> Result<Vec<RosterMember>, Error> {
        Ok(load_json(self.kv.as_ref(), ROSTER_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Adds `member` to the roster, replacing an entry with the same ASHA ID.
    pub async fn enroll(&self, member: RosterMember) -> Result<(), Error> {
        if member.asha_id.trim().is_empty() {
            return Err(Error::validation("roster", "ASHA ID is required"));
        }

        let _guard = self.roster_lock.lock().await;
        let mut roster = self.roster().await?;
        match roster.iter_mut().find(|m| m.asha_id == member.asha_id) {
            Some(existing) => *existing = member,
            None => roster.push(member),
        }
        save_json(self.kv.as_ref(), ROSTER_KEY, &roster).await?;
        Ok(())
    }

    /// Removes an ASHA worker from the roster. Returns false if absent.
    pub async fn unenroll(&self, asha_id: &str) -> Result<bool, Error> {
        let _guard = self.roster_lock.lock().await;
        let mut roster = self.roster().await?;
        let before = roster.len();
        roster.retain(|m| m.asha_id != asha_id);
        if roster.len() == before {
            return Ok(false);
        }
        save_json(self.kv.as_ref(), ROSTER_KEY, &roster).await?;
        Ok(true)
    }
}
