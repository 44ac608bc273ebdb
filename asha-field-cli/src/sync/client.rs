//! Remote endpoint selection for the CLI.
//!
//! Wraps the core HTTP client so commands work the same way whether or not
//! a server is configured: without one, submissions fail with
//! `NotConfigured` and registrations are saved locally only.

use asha_field_core::sync::{Ack, HttpRemote, RemoteEndpoint, RemoteError, Submission};
use asha_field_core::{Profile, Role};

use crate::config::SyncConfig;

#[derive(Debug, Clone)]
pub enum SyncClient {
    Http(HttpRemote),
    Unconfigured,
}

impl SyncClient {
    /// Creates a client from config.
    pub fn from_config(config: &SyncConfig) -> Result<Self, RemoteError> {
        let url = match config.base_url.as_deref() {
            Some(url) if config.is_configured() => url,
            _ => return Ok(SyncClient::Unconfigured),
        };

        let mut remote = HttpRemote::new(url, config.timeout())?;
        if let Some(key) = &config.api_key {
            remote = remote.with_api_key(key);
        }
        Ok(SyncClient::Http(remote))
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, SyncClient::Http(_))
    }

    /// Returns true if the server answers its health check.
    pub async fn check_health(&self) -> bool {
        match self {
            SyncClient::Http(remote) => remote.check_health().await,
            SyncClient::Unconfigured => false,
        }
    }
}

impl RemoteEndpoint for SyncClient {
    async fn submit(&self, submission: &Submission) -> Result<Ack, RemoteError> {
        match self {
            SyncClient::Http(remote) => remote.submit(submission).await,
            SyncClient::Unconfigured => Err(RemoteError::NotConfigured),
        }
    }

    async fn register(&self, role: Role, profile: &Profile) -> Result<Ack, RemoteError> {
        match self {
            SyncClient::Http(remote) => remote.register(role, profile).await,
            SyncClient::Unconfigured => Err(RemoteError::NotConfigured),
        }
    }
}
