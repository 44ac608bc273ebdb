//! Sync engine: pushes PENDING records to the remote endpoint and reconciles
//! local status with the outcome.
//!
//! A pass claims every PENDING record (PENDING -> SYNCING), then submits them
//! one at a time. Each record is an independent unit of work:
//!
//! - acknowledged with a server id: SYNCING -> SYNCED
//! - failed, budget left: SYNCING -> PENDING, `attempts += 1`
//! - failed, budget exhausted: SYNCING -> FAILED (manual reset required)
//! - deleted while in flight: abandoned, never resurrected
//!
//! Only one pass runs at a time; a second call while one is in progress
//! returns a skipped report immediately.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::timeout;

use super::client::{RemoteEndpoint, DEFAULT_TIMEOUT};
use super::error::RemoteError;
use super::protocol::Submission;
use crate::error::Error;
use crate::models::{ModuleKey, Record, SyncStatus};
use crate::storage::KeyValueStore;
use crate::store::RecordStore;

/// Failed attempts after which a record is marked FAILED.
pub const DEFAULT_RETRY_BUDGET: u32 = 5;

/// Tunables for a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Consecutive failed attempts before a record is marked FAILED.
    pub retry_budget: u32,
    /// Upper bound on one record's network call.
    pub request_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// What happened to one record during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Synced { server_id: String },
    Retrying { attempts: u32, reason: String },
    Failed { attempts: u32, reason: String },
    /// Deleted locally while its submission was in flight.
    Abandoned,
    /// Local storage failed while recording the outcome.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    pub module: ModuleKey,
    pub client_id: String,
    pub outcome: RecordOutcome,
}

/// Summary of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Another pass was already running; nothing was done.
    pub skipped: bool,
    pub records: Vec<RecordReport>,
    /// Modules whose pending records could not be claimed.
    pub module_errors: Vec<(ModuleKey, String)>,
}

impl SyncReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    fn count(&self, pred: impl Fn(&RecordOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn attempted(&self) -> usize {
        self.records.len()
    }

    pub fn synced(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Synced { .. }))
    }

    pub fn retrying(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Retrying { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Failed { .. }))
    }

    pub fn abandoned(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Abandoned))
    }

    pub fn errors(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Error(_))) + self.module_errors.len()
    }

    /// Outcome for one record, if it took part in the pass.
    pub fn outcome(&self, client_id: &str) -> Option<&RecordOutcome> {
        self.records
            .iter()
            .find(|r| r.client_id == client_id)
            .map(|r| &r.outcome)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return write!(f, "Sync already in progress.");
        }
        if self.records.is_empty() && self.module_errors.is_empty() {
            return write!(f, "Nothing to sync.");
        }
        write!(
            f,
            "{} attempted: {} synced, {} will retry, {} failed",
            self.attempted(),
            self.synced(),
            self.retrying(),
            self.failed()
        )?;
        if self.abandoned() > 0 {
            write!(f, ", {} deleted during sync", self.abandoned())?;
        }
        if self.errors() > 0 {
            write!(f, ", {} errors", self.errors())?;
        }
        Ok(())
    }
}

/// Clears the in-progress flag when the pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine<S, R> {
    store: RecordStore<S>,
    remote: R,
    settings: SyncSettings,
    in_progress: AtomicBool,
}

impl<S: KeyValueStore, R: RemoteEndpoint> SyncEngine<S, R> {
    pub fn new(store: RecordStore<S>, remote: R, settings: SyncSettings) -> Self {
        Self {
            store,
            remote,
            settings,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &RecordStore<S> {
        &self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// Returns true while a pass is running.
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Runs one sync pass over every module.
    ///
    /// Per-record failures are reported in the returned [`SyncReport`], not
    /// as an `Err`.
    pub async fn run_pass(&self) -> Result<SyncReport, Error> {
        let Some(_guard) = PassGuard::acquire(&self.in_progress) else {
            tracing::debug!("sync pass already running, skipping");
            return Ok(SyncReport::skipped());
        };

        let mut report = SyncReport::default();
        let mut claimed = Vec::new();

        // Holding the flag means no other pass owns a SYNCING record, so any
        // found now was left behind by a pass that never finished.
        for module in ModuleKey::ALL {
            match self.store.claim_pending(module, true).await {
                Ok(records) => claimed.extend(records),
                Err(e) => {
                    tracing::error!(module = %module, error = %e, "failed to claim pending records");
                    report.module_errors.push((module, e.to_string()));
                }
            }
        }

        if claimed.is_empty() {
            tracing::debug!("no pending records");
            return Ok(report);
        }

        tracing::info!(count = claimed.len(), "sync pass started");

        for record in &claimed {
            // Records deleted since the claim are never uploaded.
            let outcome = match self.store.get(record.module_key, &record.client_id).await {
                Ok(Some(current)) => self.sync_record(&current).await,
                Ok(None) => {
                    tracing::debug!(client_id = %record.client_id, "record deleted before upload, abandoning");
                    RecordOutcome::Abandoned
                }
                Err(e) => self.storage_outcome(record, e),
            };
            report.records.push(RecordReport {
                module: record.module_key,
                client_id: record.client_id.clone(),
                outcome,
            });
        }

        tracing::info!(
            attempted = report.attempted(),
            synced = report.synced(),
            retrying = report.retrying(),
            failed = report.failed(),
            abandoned = report.abandoned(),
            "sync pass finished"
        );
        Ok(report)
    }

    async fn sync_record(&self, record: &Record) -> RecordOutcome {
        let submission = Submission::from(record);
        let limit = self.settings.request_timeout;

        let result = match timeout(limit, self.remote.submit(&submission)).await {
            Ok(response) => response.and_then(|ack| ack.into_server_id()),
            Err(_) => Err(RemoteError::Timeout(limit)),
        };

        match result {
            Ok(server_id) => self.confirm(record, server_id).await,
            Err(err) => self.record_failure(record, err).await,
        }
    }

    async fn confirm(&self, record: &Record, server_id: String) -> RecordOutcome {
        match self
            .store
            .mark_synced(record.module_key, &record.client_id, server_id.clone())
            .await
        {
            Ok(_) => {
                tracing::debug!(client_id = %record.client_id, server_id = %server_id, "record synced");
                RecordOutcome::Synced { server_id }
            }
            Err(e) => self.storage_outcome(record, e),
        }
    }

    async fn record_failure(&self, record: &Record, err: RemoteError) -> RecordOutcome {
        let budget = self.settings.retry_budget.max(1);
        let reason = err.to_string();

        let result = self
            .store
            .replace(record.module_key, &record.client_id, |r| {
                r.attempts += 1;
                r.last_error = Some(reason.clone());
                if r.attempts >= budget {
                    r.transition(SyncStatus::Failed)
                } else {
                    r.transition(SyncStatus::Pending)
                }
            })
            .await;

        match result {
            Ok(updated) if updated.status == SyncStatus::Failed => {
                tracing::warn!(
                    client_id = %record.client_id,
                    attempts = updated.attempts,
                    error = %reason,
                    "sync failed, retry budget exhausted"
                );
                RecordOutcome::Failed {
                    attempts: updated.attempts,
                    reason,
                }
            }
            Ok(updated) => {
                tracing::warn!(
                    client_id = %record.client_id,
                    attempts = updated.attempts,
                    error = %reason,
                    "sync attempt failed, will retry"
                );
                RecordOutcome::Retrying {
                    attempts: updated.attempts,
                    reason,
                }
            }
            Err(e) => self.storage_outcome(record, e),
        }
    }

    fn storage_outcome(&self, record: &Record, err: Error) -> RecordOutcome {
        if err.is_not_found() {
            tracing::debug!(client_id = %record.client_id, "record deleted during sync, abandoning");
            RecordOutcome::Abandoned
        } else {
            tracing::error!(client_id = %record.client_id, error = %err, "failed to record sync outcome");
            RecordOutcome::Error(err.to_string())
        }
    }
}
