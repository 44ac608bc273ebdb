//! Upload of local records to the configured server.

pub mod auto_sync;
pub mod client;

pub use auto_sync::try_auto_sync;
pub use client::SyncClient;
