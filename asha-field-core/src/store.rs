//! Record store: per-module partitions of records over a [`KeyValueStore`].
//!
//! Each partition is read and written as a whole. Mutations of one partition
//! are serialized through a per-module async mutex shared by every clone of
//! the store, so two interleaved read-modify-write cycles cannot drop each
//! other's changes.
//!
//! The store also owns the id allocator: a persisted counter per module that
//! only ever moves forward.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::Error;
use crate::models::{ModuleKey, Payload, Record, SyncStatus};
use crate::storage::{load_json, save_json, KeyValueStore};

/// All partitions at one point in time, keyed by module.
pub type Snapshot = BTreeMap<ModuleKey, Vec<Record>>;

pub struct RecordStore<S> {
    kv: Arc<S>,
    locks: Arc<[Mutex<()>; ModuleKey::COUNT]>,
}

impl<S> Clone for RecordStore<S> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: KeyValueStore> RecordStore<S> {
    pub fn new(kv: Arc<S>) -> Self {
        Self {
            kv,
            locks: Arc::new(std::array::from_fn(|_| Mutex::new(()))),
        }
    }

    /// The underlying key-value store.
    pub fn kv(&self) -> &Arc<S> {
        &self.kv
    }

    async fn lock(&self, module: ModuleKey) -> MutexGuard<'_, ()> {
        self.locks[module as usize].lock().await
    }

    async fn load(&self, module: ModuleKey) -> Result<Vec<Record>, Error> {
        Ok(load_json(self.kv.as_ref(), module.as_str())
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, module: ModuleKey, records: &[Record]) -> Result<(), Error> {
        save_json(self.kv.as_ref(), module.as_str(), records).await?;
        Ok(())
    }

    /// Returns the partition in insertion order; empty if it does not exist yet.
    pub async fn list(&self, module: ModuleKey) -> Result<Vec<Record>, Error> {
        self.load(module).await
    }

    /// Looks up one record by client id.
    pub async fn get(&self, module: ModuleKey, client_id: &str) -> Result<Option<Record>, Error> {
        Ok(self
            .load(module)
            .await?
            .into_iter()
            .find(|r| r.client_id == client_id))
    }

    /// Reads every partition.
    pub async fn snapshot(&self) -> Result<Snapshot, Error> {
        let mut snapshot = Snapshot::new();
        for module in ModuleKey::ALL {
            snapshot.insert(module, self.load(module).await?);
        }
        Ok(snapshot)
    }

    /// Allocates the next client id for `module`.
    ///
    /// The allocation is persisted before it is returned, so an id handed out
    /// once is never handed out again, whether or not a record is created
    /// with it and whether or not that record is later deleted.
    pub async fn next_id(&self, module: ModuleKey) -> Result<String, Error> {
        let _guard = self.lock(module).await;
        let records = self.load(module).await?;
        self.allocate(module, &records).await
    }

    /// Caller must hold the partition lock.
    async fn allocate(&self, module: ModuleKey, records: &[Record]) -> Result<String, Error> {
        let next = self.current_seq(module, records).await? + 1;
        save_json(self.kv.as_ref(), &module.counter_key(), &next).await?;
        let id = module.format_id(next);
        tracing::debug!(module = %module, client_id = %id, "allocated client id");
        Ok(id)
    }

    /// Highest sequence number ever used in `module`.
    ///
    /// Partitions written before the counter existed (or whose counter write
    /// was lost) are covered by also looking at the ids already stored.
    async fn current_seq(&self, module: ModuleKey, records: &[Record]) -> Result<u64, Error> {
        let counter: u64 = load_json(self.kv.as_ref(), &module.counter_key())
            .await?
            .unwrap_or(0);
        let highest_stored = records
            .iter()
            .filter_map(|r| module.parse_seq(&r.client_id))
            .max()
            .unwrap_or(0);
        Ok(counter.max(highest_stored).max(records.len() as u64))
    }

    /// Adds a record to the partition.
    ///
    /// Fails with [`Error::Validation`] when a required field is missing, the
    /// client id does not belong to `module`, or the id is already taken.
    pub async fn append(&self, module: ModuleKey, record: Record) -> Result<(), Error> {
        let _guard = self.lock(module).await;
        let mut records = self.load(module).await?;

        let seq = Self::validate(module, &record, &records)?;
        let counter = self.current_seq(module, &records).await?;

        // Counter first: if the partition write then fails, the id is burnt
        // rather than stored without its counter.
        if seq > counter {
            save_json(self.kv.as_ref(), &module.counter_key(), &seq).await?;
        }

        tracing::debug!(module = %module, client_id = %record.client_id, "appending record");
        records.push(record);
        self.save(module, &records).await?;
        Ok(())
    }

    /// Allocates an id and appends a new PENDING record in one step.
    pub async fn create(
        &self,
        module: ModuleKey,
        payload: Payload,
        owner_id: impl Into<String>,
    ) -> Result<Record, Error> {
        let owner_id = owner_id.into();
        if owner_id.trim().is_empty() {
            return Err(Error::validation(module, "owner id is required"));
        }
        let missing = crate::models::missing_fields(module, &payload);
        if !missing.is_empty() {
            return Err(Error::validation(
                module,
                format!("missing required fields: {}", missing.join(", ")),
            ));
        }

        let _guard = self.lock(module).await;
        let mut records = self.load(module).await?;
        let client_id = self.allocate(module, &records).await?;

        let record = Record::new(module, client_id, payload, owner_id);
        Self::validate(module, &record, &records)?;

        records.push(record.clone());
        self.save(module, &records).await?;
        tracing::info!(module = %module, client_id = %record.client_id, "record created");
        Ok(record)
    }

    /// Returns the id's sequence number when `record` may be appended.
    fn validate(module: ModuleKey, record: &Record, existing: &[Record]) -> Result<u64, Error> {
        if record.module_key != module {
            return Err(Error::validation(
                module,
                format!(
                    "record {} belongs to {}, not {}",
                    record.client_id, record.module_key, module
                ),
            ));
        }
        let seq = module.parse_seq(&record.client_id).ok_or_else(|| {
            Error::validation(
                module,
                format!(
                    "client id '{}' must be '{}' followed by digits",
                    record.client_id,
                    module.prefix()
                ),
            )
        })?;
        let missing = record.missing_fields();
        if !missing.is_empty() {
            return Err(Error::validation(
                module,
                format!("missing required fields: {}", missing.join(", ")),
            ));
        }
        if existing.iter().any(|r| r.client_id == record.client_id) {
            return Err(Error::validation(
                module,
                format!("client id {} already exists", record.client_id),
            ));
        }
        Ok(seq)
    }

    /// Deletes a record. Absent ids are not an error.
    ///
    /// Returns whether a record was removed.
    pub async fn remove(&self, module: ModuleKey, client_id: &str) -> Result<bool, Error> {
        let _guard = self.lock(module).await;
        let mut records = self.load(module).await?;

        let before = records.len();
        records.retain(|r| r.client_id != client_id);
        if records.len() == before {
            tracing::debug!(module = %module, client_id, "remove: no such record");
            return Ok(false);
        }

        self.save(module, &records).await?;
        tracing::info!(module = %module, client_id, "record removed");
        Ok(true)
    }

    /// Applies `updater` to one record and writes the partition back.
    ///
    /// Fails with [`Error::NotFound`] if the record no longer exists. If the
    /// updater returns an error nothing is written. The updater may not
    /// change the record's identity (client id, module or owner).
    pub async fn replace<F>(
        &self,
        module: ModuleKey,
        client_id: &str,
        updater: F,
    ) -> Result<Record, Error>
    where
        F: FnOnce(&mut Record) -> Result<(), Error>,
    {
        let _guard = self.lock(module).await;
        let mut records = self.load(module).await?;

        let record = records
            .iter_mut()
            .find(|r| r.client_id == client_id)
            .ok_or_else(|| Error::not_found(module, client_id))?;

        let mut updated = record.clone();
        updater(&mut updated)?;
        if updated.client_id != record.client_id
            || updated.module_key != record.module_key
            || updated.owner_id != record.owner_id
        {
            return Err(Error::validation(
                module,
                format!("update of {} may not change its identity", client_id),
            ));
        }

        *record = updated.clone();
        self.save(module, &records).await?;
        Ok(updated)
    }

    /// Puts a FAILED record back in the sync queue with a fresh retry budget.
    pub async fn reset_failed(&self, module: ModuleKey, client_id: &str) -> Result<Record, Error> {
        self.replace(module, client_id, |record| {
            record.transition(SyncStatus::Pending)?;
            record.attempts = 0;
            record.last_error = None;
            Ok(())
        })
        .await
    }

    /// Resets every FAILED record in `module`; returns how many were reset.
    pub async fn reset_all_failed(&self, module: ModuleKey) -> Result<usize, Error> {
        let _guard = self.lock(module).await;
        let mut records = self.load(module).await?;

        let mut count = 0;
        for record in records
            .iter_mut()
            .filter(|r| r.status == SyncStatus::Failed)
        {
            record.transition(SyncStatus::Pending)?;
            record.attempts = 0;
            record.last_error = None;
            count += 1;
        }

        if count > 0 {
            self.save(module, &records).await?;
        }
        Ok(count)
    }

    /// Returns records left in SYNCING by an interrupted pass to PENDING.
    ///
    /// The attempt count is not charged: the outcome of the interrupted
    /// attempt is unknown.
    pub async fn recover_orphans(&self) -> Result<usize, Error> {
        let mut recovered = 0;
        for module in ModuleKey::ALL {
            let _guard = self.lock(module).await;
            let mut records = self.load(module).await?;

            let mut changed = false;
            for record in records
                .iter_mut()
                .filter(|r| r.status == SyncStatus::Syncing)
            {
                record.transition(SyncStatus::Pending)?;
                changed = true;
                recovered += 1;
            }

            if changed {
                self.save(module, &records).await?;
            }
        }

        if recovered > 0 {
            tracing::warn!(recovered, "recovered records left in SYNCING");
        }
        Ok(recovered)
    }

    /// Moves every PENDING record of `module` to SYNCING in one write and
    /// returns the claimed records.
    ///
    /// With `adopt_orphans`, records already in SYNCING are claimed as well;
    /// the caller asserts that no other pass can own them.
    pub(crate) async fn claim_pending(
        &self,
        module: ModuleKey,
        adopt_orphans: bool,
    ) -> Result<Vec<Record>, Error> {
        let _guard = self.lock(module).await;
        let mut records = self.load(module).await?;

        let mut claimed = Vec::new();
        for record in records.iter_mut() {
            if adopt_orphans && record.status == SyncStatus::Syncing {
                tracing::debug!(client_id = %record.client_id, "adopting orphaned record");
                record.transition(SyncStatus::Pending)?;
            }
            if !record.status.is_syncable() {
                continue;
            }
            record.transition(SyncStatus::Syncing)?;
            claimed.push(record.clone());
        }

        if !claimed.is_empty() {
            self.save(module, &records).await?;
        }
        Ok(claimed)
    }

    /// Marks a claimed record as confirmed by the server.
    pub(crate) async fn mark_synced(
        &self,
        module: ModuleKey,
        client_id: &str,
        server_id: String,
    ) -> Result<Record, Error> {
        self.replace(module, client_id, |record| {
            record.transition(SyncStatus::Synced)?;
            record.server_id = Some(server_id);
            record.attempts = 0;
            record.last_error = None;
            record.synced_at = Some(Utc::now());
            Ok(())
        })
        .await
    }
}
