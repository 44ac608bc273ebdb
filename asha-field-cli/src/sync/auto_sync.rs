//! Auto-sync functionality for CLI commands.
//!
//! Uploads pending records after write operations when `auto_sync` is
//! enabled in the configuration.

use asha_field_core::{RecordStore, SyncEngine};

use super::SyncClient;
use crate::config::Config;
use crate::db::SqliteStore;

/// Performs auto-sync if enabled and server is reachable.
///
/// This function:
/// 1. Checks if auto_sync is enabled in config
/// 2. Checks if sync is configured (base_url present)
/// 3. Checks if the server is reachable
/// 4. Runs one sync pass
///
/// Failures are reported on stderr but never fail the command; the CLI must
/// keep working offline.
pub async fn try_auto_sync(config: &Config, store: &RecordStore<SqliteStore>) {
    if !config.sync.auto_sync || !config.sync.is_configured() {
        return;
    }

    let client = match SyncClient::from_config(&config.sync) {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!(error = %e, "auto-sync: could not build client");
            return;
        }
    };

    // Check server reachability first (fast fail)
    if !client.check_health().await {
        eprintln!("Auto-sync: server unreachable, skipping");
        return;
    }

    let engine = SyncEngine::new(store.clone(), client, config.sync.settings());
    match engine.run_pass().await {
        Ok(report) if report.failed() + report.retrying() + report.errors() > 0 => {
            eprintln!("Auto-sync: {}", report);
        }
        Ok(_) => {}
        Err(e) => eprintln!("Auto-sync: {}", e.user_message()),
    }
}
