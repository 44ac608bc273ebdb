//! HTTP client for the remote sync endpoint.

use std::future::Future;
use std::time::Duration;

use super::error::RemoteError;
use super::protocol::{Ack, Submission};
use crate::models::{Profile, Role};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for the reachability probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// The remote system records are reconciled with.
pub trait RemoteEndpoint: Send + Sync {
    /// Submits one record. A returned `Ack` may still be a rejection.
    fn submit(
        &self,
        submission: &Submission,
    ) -> impl Future<Output = Result<Ack, RemoteError>> + Send;

    /// Registers a worker profile with the server.
    fn register(
        &self,
        _role: Role,
        _profile: &Profile,
    ) -> impl Future<Output = Result<Ack, RemoteError>> + Send {
        async { Err(RemoteError::NotConfigured) }
    }
}

/// JSON-over-HTTP implementation of [`RemoteEndpoint`].
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpRemote {
    /// Creates a client for `base_url` (e.g. `http://10.0.0.5:8080/healthapp/api`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            api_key: None,
            timeout,
            client,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns true if `GET /health` answers with a success status.
    pub async fn check_health(&self) -> bool {
        let request = self
            .client
            .get(self.build_url("/health"))
            .timeout(HEALTH_TIMEOUT);
        matches!(request.send().await, Ok(r) if r.status().is_success())
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Ack, RemoteError> {
        let mut request = self.client.post(self.build_url(path)).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout(self.timeout)
            } else {
                RemoteError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Ack>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    /// Builds an absolute URL for `path`, defaulting to `http://` when the
    /// configured base has no scheme.
    fn build_url(&self, path: &str) -> String {
        let base = if self.base_url.starts_with("http://") || self.base_url.starts_with("https://")
        {
            self.base_url.clone()
        } else {
            format!("http://{}", self.base_url)
        };
        format!("{}{}", base.trim_end_matches('/'), path)
    }
}

impl RemoteEndpoint for HttpRemote {
    async fn submit(&self, submission: &Submission) -> Result<Ack, RemoteError> {
        self.post_json("/records", submission).await
    }

    async fn register(&self, role: Role, profile: &Profile) -> Result<Ack, RemoteError> {
        let path = format!("/{}/register", role.endpoint());
        self.post_json(&path, profile).await
    }
}
