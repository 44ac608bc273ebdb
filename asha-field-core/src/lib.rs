//! Asha Field Core Library
//!
//! Offline-first record keeping for community health workers: module
//! partitions with a durable id allocator, profiles, background upload to a
//! remote endpoint and dashboard aggregation.

pub mod aggregate;
pub mod error;
pub mod models;
pub mod registry;
pub mod storage;
pub mod store;
pub mod sync;

pub use aggregate::{phc_rollup, summarize, DashboardSummary, PhcRollup, Scope, StatusCounts};
pub use error::Error;
pub use models::{ModuleKey, Payload, Profile, Record, Role, RosterMember, SyncStatus};
pub use registry::{EntryPoint, ProfileRegistry, RegistrationOutcome};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use store::{RecordStore, Snapshot};
pub use sync::{
    Ack, HttpRemote, RemoteEndpoint, RemoteError, SyncEngine, SyncReport, SyncSettings,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
