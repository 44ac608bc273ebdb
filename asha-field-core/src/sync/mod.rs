//! Upload of locally captured records to the remote endpoint.
//!
//! ## Protocol
//!
//! Each record is submitted on its own:
//! 1. `POST {base_url}/records` with `{moduleKey, payload, ownerId, clientId}`
//! 2. The server answers `{success, serverId?, message?}`
//! 3. Only `success: true` with a non-blank `serverId` confirms the record
//!
//! Profiles are registered through `POST {base_url}/{asha|phc}/register`.

mod client;
mod engine;
mod error;
mod protocol;

pub use client::{HttpRemote, RemoteEndpoint, DEFAULT_TIMEOUT};
pub use engine::{
    RecordOutcome, RecordReport, SyncEngine, SyncReport, SyncSettings, DEFAULT_RETRY_BUDGET,
};
pub use error::RemoteError;
pub use protocol::{Ack, Submission};
