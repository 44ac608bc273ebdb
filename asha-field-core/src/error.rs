//! Error types shared by the record store, profile registry and sync engine.

use thiserror::Error;

use crate::models::{ModuleKey, SyncStatus};
use crate::storage::StorageError;
use crate::sync::RemoteError;

/// Errors returned by core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected at write time; the caller should correct it.
    #[error("invalid {module} record: {reason}")]
    Validation { module: String, reason: String },

    /// The target record (or profile) no longer exists.
    #[error("{client_id} not found in {module}")]
    NotFound { module: String, client_id: String },

    /// A status change outside the transition table.
    #[error("{client_id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        client_id: String,
        from: SyncStatus,
        to: SyncStatus,
    },

    /// Durable storage failed; nothing was written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The remote system could not be reached or refused the request.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    pub(crate) fn validation(module: impl ToString, reason: impl Into<String>) -> Self {
        Error::Validation {
            module: module.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(module: ModuleKey, client_id: impl Into<String>) -> Self {
        Error::NotFound {
            module: module.to_string(),
            client_id: client_id.into(),
        }
    }

    /// Message suitable for showing to a health worker.
    ///
    /// Validation problems are actionable and shown as-is; everything else
    /// collapses to "failed, try again".
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { reason, .. } => reason.clone(),
            Error::NotFound { client_id, .. } => format!("{} no longer exists.", client_id),
            Error::Remote(RemoteError::NotConfigured) => {
                "Sync is not configured. Set sync.base_url in the config file.".to_string()
            }
            Error::Remote(RemoteError::Rejected(message)) => {
                format!("The server rejected the request: {}", message)
            }
            Error::Remote(_) => "Could not reach the server. Please try again.".to_string(),
            Error::InvalidTransition { .. } | Error::Storage(_) => {
                "The operation failed. Please try again.".to_string()
            }
        }
    }

    /// True for errors that mean the target record vanished.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
