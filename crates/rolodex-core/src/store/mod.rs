//! Record store: pluggable persistence plus the in-memory façade
//!
//! All record mutation goes through [`RecordStore`] so that `LocalState`
//! transitions are enforced in one place. The durable backend is abstracted
//! behind [`LocalStore`]; two implementations ship with the crate
//! ([`MemoryStore`] and [`SqliteStore`]).

mod memory;
mod migrations;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::BTreeMap;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::models::{
    ContactFields, ContactRecord, LocalId, LocalState, RemoteId, VersionMarker,
};
use crate::search;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Operations the façade needs from a durable keyed store
pub trait LocalStore: Send {
    /// Fetch a persisted record by local id
    fn get_by_id(&self, id: &LocalId) -> Result<Option<ContactRecord>>;

    /// List every persisted record
    fn list_all(&self) -> Result<Vec<ContactRecord>>;

    /// Insert or replace a record keyed by local id
    fn upsert(&mut self, record: &ContactRecord) -> Result<()>;

    /// Remove a record; removing an absent id is not an error
    fn delete_by_id(&mut self, id: &LocalId) -> Result<()>;

    /// Mint a fresh local id
    fn new_local_id(&mut self) -> LocalId;
}

/// Change notification emitted after every mutating store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A record was added to the cache
    Created(LocalId),
    /// A record's fields or state changed
    Updated(LocalId),
    /// A record was removed
    Removed(LocalId),
    /// Every record was removed
    Cleared,
    /// The cache was rebuilt from the backend
    Refreshed,
}

/// Per-state record counts, for "show info" style displays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub clean: usize,
    pub locally_created: usize,
    pub locally_updated: usize,
    pub locally_deleted: usize,
}

/// Façade over the record collection and its local-mutation flags.
///
/// Reads are served from an in-memory cache ordered by `LocalId` (creation
/// order); mutations serialize on the backend and update the cache only
/// after the backend write succeeds.
pub struct RecordStore {
    backend: Mutex<Box<dyn LocalStore>>,
    cache: RwLock<BTreeMap<LocalId, ContactRecord>>,
    events: broadcast::Sender<StoreEvent>,
}

impl RecordStore {
    /// Open the store, loading previously persisted records into the cache
    pub fn open(backend: Box<dyn LocalStore>) -> Result<Self> {
        let records = backend.list_all()?;
        let cache: BTreeMap<LocalId, ContactRecord> =
            records.into_iter().map(|r| (r.local_id, r)).collect();
        tracing::debug!("record store opened with {} records", cache.len());

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            backend: Mutex::new(backend),
            cache: RwLock::new(cache),
            events,
        })
    }

    /// Subscribe to change notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine; events are best-effort notifications.
        let _ = self.events.send(event);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetch a record by local id
    pub fn get(&self, id: &LocalId) -> Result<ContactRecord> {
        self.cache
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// List all records in creation order
    #[must_use]
    pub fn list(&self) -> Vec<ContactRecord> {
        self.cache.read().values().cloned().collect()
    }

    /// Find the record mirroring a given remote id
    #[must_use]
    pub fn find_by_remote_id(&self, id: &RemoteId) -> Option<ContactRecord> {
        self.cache
            .read()
            .values()
            .find(|r| r.remote_id.as_ref() == Some(id))
            .cloned()
    }

    /// Records with unsynced local changes, in ascending local-id order
    #[must_use]
    pub fn dirty_records(&self) -> Vec<ContactRecord> {
        self.cache
            .read()
            .values()
            .filter(|r| r.is_dirty())
            .cloned()
            .collect()
    }

    /// Records matching a search term, in creation order
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<ContactRecord> {
        self.cache
            .read()
            .values()
            .filter(|r| search::matches(r, term))
            .cloned()
            .collect()
    }

    /// Record counts per local state
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let cache = self.cache.read();
        let mut stats = StoreStats {
            total: cache.len(),
            ..StoreStats::default()
        };
        for record in cache.values() {
            match record.local_state {
                LocalState::Clean => stats.clean += 1,
                LocalState::LocallyCreated => stats.locally_created += 1,
                LocalState::LocallyUpdated => stats.locally_updated += 1,
                LocalState::LocallyDeleted => stats.locally_deleted += 1,
            }
        }
        stats
    }

    // -----------------------------------------------------------------------
    // Caller-facing mutations
    // -----------------------------------------------------------------------

    /// Create a record locally; it stays `LocallyCreated` until uploaded
    pub fn create(&self, fields: ContactFields) -> Result<ContactRecord> {
        let mut backend = self.backend.lock();
        let local_id = backend.new_local_id();
        let record = ContactRecord::new_local(local_id, fields);
        debug_assert!(record.remote_id_invariant_holds());

        backend.upsert(&record)?;
        self.cache.write().insert(local_id, record.clone());
        self.emit(StoreEvent::Created(local_id));
        Ok(record)
    }

    /// Replace a record's fields.
    ///
    /// `Clean` records transition to `LocallyUpdated`; already-dirty records
    /// keep their state. Updating a `LocallyDeleted` record is rejected.
    pub fn update(&self, id: &LocalId, fields: ContactFields) -> Result<ContactRecord> {
        let mut backend = self.backend.lock();
        let mut record = self.get(id)?;

        match record.local_state {
            LocalState::LocallyDeleted => {
                return Err(Error::InvalidState(format!(
                    "cannot update deleted record {id}"
                )));
            }
            LocalState::Clean => record.local_state = LocalState::LocallyUpdated,
            LocalState::LocallyCreated | LocalState::LocallyUpdated => {}
        }
        record.fields = fields;
        record.touch();
        debug_assert!(record.remote_id_invariant_holds());

        backend.upsert(&record)?;
        self.cache.write().insert(*id, record.clone());
        self.emit(StoreEvent::Updated(*id));
        Ok(record)
    }

    /// Mark a record deleted locally.
    ///
    /// A never-uploaded (`LocallyCreated`) record is purged outright; there
    /// is nothing to reconcile remotely. Everything else keeps its fields and
    /// remote id as a tombstone until the deletion is uploaded. Deleting an
    /// already-deleted record is a no-op.
    pub fn soft_delete(&self, id: &LocalId) -> Result<ContactRecord> {
        let mut backend = self.backend.lock();
        let mut record = self.get(id)?;

        match record.local_state {
            LocalState::LocallyCreated => {
                backend.delete_by_id(id)?;
                self.cache.write().remove(id);
                self.emit(StoreEvent::Removed(*id));
                tracing::debug!("purged never-uploaded record {id} on delete");
                Ok(record)
            }
            LocalState::LocallyDeleted => Ok(record),
            LocalState::Clean | LocalState::LocallyUpdated => {
                record.local_state = LocalState::LocallyDeleted;
                record.touch();
                backend.upsert(&record)?;
                self.cache.write().insert(*id, record.clone());
                self.emit(StoreEvent::Updated(*id));
                Ok(record)
            }
        }
    }

    /// Restore a locally deleted record.
    ///
    /// The record becomes `LocallyUpdated`: the earlier deletion mark still
    /// has to be reconciled as an update on the next sync-up.
    pub fn undelete(&self, id: &LocalId) -> Result<ContactRecord> {
        let mut backend = self.backend.lock();
        let mut record = self.get(id)?;

        if record.local_state != LocalState::LocallyDeleted {
            return Err(Error::InvalidState(format!(
                "record {id} is not deleted"
            )));
        }
        if record.remote_id.is_none() {
            return Err(Error::InvalidState(format!(
                "record {id} was never uploaded; nothing to restore"
            )));
        }

        record.local_state = LocalState::LocallyUpdated;
        record.touch();
        backend.upsert(&record)?;
        self.cache.write().insert(*id, record.clone());
        self.emit(StoreEvent::Updated(*id));
        Ok(record)
    }

    /// Unconditionally remove a record; absent ids are ignored
    pub fn purge(&self, id: &LocalId) -> Result<()> {
        let mut backend = self.backend.lock();
        backend.delete_by_id(id)?;
        if self.cache.write().remove(id).is_some() {
            self.emit(StoreEvent::Removed(*id));
        }
        Ok(())
    }

    /// Remove every record from the cache and the backend
    pub fn clear_all(&self) -> Result<()> {
        let mut backend = self.backend.lock();
        let ids: Vec<LocalId> = self.cache.read().keys().copied().collect();
        for id in &ids {
            backend.delete_by_id(id)?;
        }
        self.cache.write().clear();
        self.emit(StoreEvent::Cleared);
        tracing::info!("cleared {} local records", ids.len());
        Ok(())
    }

    /// Rebuild the cache from the backend
    pub fn refresh(&self) -> Result<()> {
        let backend = self.backend.lock();
        let records = backend.list_all()?;
        let mut cache = self.cache.write();
        cache.clear();
        for record in records {
            cache.insert(record.local_id, record);
        }
        drop(cache);
        self.emit(StoreEvent::Refreshed);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sync-side transitions (driven by the sync manager)
    // -----------------------------------------------------------------------

    /// Record that a `LocallyCreated` record was uploaded
    pub(crate) fn confirm_created(
        &self,
        id: &LocalId,
        remote_id: RemoteId,
        version: VersionMarker,
    ) -> Result<ContactRecord> {
        let mut backend = self.backend.lock();
        let mut record = self.get(id)?;

        if record.local_state != LocalState::LocallyCreated {
            return Err(Error::InvalidState(format!(
                "record {id} is not pending creation"
            )));
        }

        record.remote_id = Some(remote_id);
        record.remote_version = Some(version);
        record.local_state = LocalState::Clean;
        record.touch();
        debug_assert!(record.remote_id_invariant_holds());

        backend.upsert(&record)?;
        self.cache.write().insert(*id, record.clone());
        self.emit(StoreEvent::Updated(*id));
        Ok(record)
    }

    /// Record that a `LocallyUpdated` record's fields were uploaded
    pub(crate) fn confirm_updated(
        &self,
        id: &LocalId,
        version: VersionMarker,
    ) -> Result<ContactRecord> {
        let mut backend = self.backend.lock();
        let mut record = self.get(id)?;

        if record.local_state != LocalState::LocallyUpdated {
            return Err(Error::InvalidState(format!(
                "record {id} has no pending update"
            )));
        }

        record.remote_version = Some(version);
        record.local_state = LocalState::Clean;
        record.touch();
        backend.upsert(&record)?;
        self.cache.write().insert(*id, record.clone());
        self.emit(StoreEvent::Updated(*id));
        Ok(record)
    }

    /// Adopt a remote snapshot: create a `Clean` record, or overwrite the
    /// existing `Clean` mirror. Dirty records are never overwritten here;
    /// the resolver keeps them local until uploaded.
    pub(crate) fn adopt_remote(
        &self,
        remote_id: &RemoteId,
        fields: ContactFields,
        version: VersionMarker,
    ) -> Result<ContactRecord> {
        let mut backend = self.backend.lock();

        match self.find_by_remote_id(remote_id) {
            Some(mut record) => {
                if record.is_dirty() {
                    return Err(Error::InvalidState(format!(
                        "record {} has unsynced changes",
                        record.local_id
                    )));
                }
                record.fields = fields;
                record.remote_version = Some(version);
                record.touch();
                backend.upsert(&record)?;
                let id = record.local_id;
                self.cache.write().insert(id, record.clone());
                self.emit(StoreEvent::Updated(id));
                Ok(record)
            }
            None => {
                let local_id = backend.new_local_id();
                let record =
                    ContactRecord::from_remote(local_id, remote_id.clone(), fields, version);
                debug_assert!(record.remote_id_invariant_holds());
                backend.upsert(&record)?;
                self.cache.write().insert(local_id, record.clone());
                self.emit(StoreEvent::Created(local_id));
                Ok(record)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContactField;

    fn store() -> RecordStore {
        RecordStore::open(Box::new(MemoryStore::new())).unwrap()
    }

    fn fields(first: &str, last: &str) -> ContactFields {
        ContactFields::new()
            .with(ContactField::FirstName, first)
            .with(ContactField::LastName, last)
    }

    #[test]
    fn create_and_get() {
        let store = store();
        let record = store.create(fields("Amy", "Lee")).unwrap();

        assert_eq!(record.local_state, LocalState::LocallyCreated);
        assert!(record.remote_id.is_none());
        assert!(record.remote_id_invariant_holds());

        let fetched = store.get(&record.local_id).unwrap();
        assert_eq!(fetched, record);
    }

    #[test]
    fn get_missing_record_is_not_found() {
        let store = store();
        let err = store.get(&LocalId::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn list_keeps_creation_order() {
        let store = store();
        let a = store.create(fields("A", "One")).unwrap();
        let b = store.create(fields("B", "Two")).unwrap();
        let c = store.create(fields("C", "Three")).unwrap();

        let ids: Vec<LocalId> = store.list().iter().map(|r| r.local_id).collect();
        assert_eq!(ids, vec![a.local_id, b.local_id, c.local_id]);
    }

    #[test]
    fn update_transitions_clean_to_locally_updated() {
        let store = store();
        let created = store.create(fields("Amy", "Lee")).unwrap();
        let clean = store
            .confirm_created(
                &created.local_id,
                RemoteId::new("7"),
                VersionMarker::new("v1"),
            )
            .unwrap();
        assert_eq!(clean.local_state, LocalState::Clean);

        let updated = store
            .update(&created.local_id, fields("Amy", "Lewis"))
            .unwrap();
        assert_eq!(updated.local_state, LocalState::LocallyUpdated);
        assert_eq!(updated.remote_id, Some(RemoteId::new("7")));
        assert!(updated.remote_id_invariant_holds());
    }

    #[test]
    fn update_keeps_locally_created_state() {
        let store = store();
        let record = store.create(fields("Amy", "Lee")).unwrap();
        let updated = store.update(&record.local_id, fields("Amy", "Lewis")).unwrap();
        assert_eq!(updated.local_state, LocalState::LocallyCreated);
    }

    #[test]
    fn update_rejects_deleted_record() {
        let store = store();
        let created = store.create(fields("Amy", "Lee")).unwrap();
        store
            .confirm_created(
                &created.local_id,
                RemoteId::new("7"),
                VersionMarker::new("v1"),
            )
            .unwrap();
        store.soft_delete(&created.local_id).unwrap();

        let err = store
            .update(&created.local_id, fields("Amy", "Lewis"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn soft_delete_purges_never_uploaded_record() {
        let store = store();
        let record = store.create(fields("Amy", "Lee")).unwrap();

        store.soft_delete(&record.local_id).unwrap();
        assert!(matches!(
            store.get(&record.local_id),
            Err(Error::NotFound(_))
        ));

        // Undelete afterwards has nothing to restore
        let err = store.undelete(&record.local_id).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn soft_delete_then_undelete_round_trip() {
        let store = store();
        let created = store.create(fields("Amy", "Lee")).unwrap();
        store
            .confirm_created(
                &created.local_id,
                RemoteId::new("7"),
                VersionMarker::new("v1"),
            )
            .unwrap();

        let deleted = store.soft_delete(&created.local_id).unwrap();
        assert_eq!(deleted.local_state, LocalState::LocallyDeleted);
        assert_eq!(deleted.remote_id, Some(RemoteId::new("7")));

        let restored = store.undelete(&created.local_id).unwrap();
        assert_eq!(restored.local_state, LocalState::LocallyUpdated);
        assert_eq!(restored.remote_id, Some(RemoteId::new("7")));
    }

    #[test]
    fn undelete_rejects_non_deleted_record() {
        let store = store();
        let record = store.create(fields("Amy", "Lee")).unwrap();
        let err = store.undelete(&record.local_id).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn purge_is_idempotent() {
        let store = store();
        let record = store.create(fields("Amy", "Lee")).unwrap();
        store.purge(&record.local_id).unwrap();
        store.purge(&record.local_id).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn dirty_records_in_ascending_id_order() {
        let store = store();
        let a = store.create(fields("A", "One")).unwrap();
        let b = store.create(fields("B", "Two")).unwrap();
        store
            .confirm_created(&b.local_id, RemoteId::new("2"), VersionMarker::new("v1"))
            .unwrap();
        let c = store.create(fields("C", "Three")).unwrap();

        let dirty: Vec<LocalId> = store.dirty_records().iter().map(|r| r.local_id).collect();
        assert_eq!(dirty, vec![a.local_id, c.local_id]);
    }

    #[test]
    fn adopt_remote_creates_clean_record() {
        let store = store();
        let adopted = store
            .adopt_remote(
                &RemoteId::new("9"),
                fields("New", "Person"),
                VersionMarker::new("v3"),
            )
            .unwrap();
        assert_eq!(adopted.local_state, LocalState::Clean);
        assert_eq!(
            store.find_by_remote_id(&RemoteId::new("9")).unwrap(),
            adopted
        );
    }

    #[test]
    fn adopt_remote_refuses_to_overwrite_dirty_record() {
        let store = store();
        let created = store.create(fields("Amy", "Lee")).unwrap();
        store
            .confirm_created(
                &created.local_id,
                RemoteId::new("7"),
                VersionMarker::new("v1"),
            )
            .unwrap();
        store
            .update(&created.local_id, fields("Amy", "Local"))
            .unwrap();

        let err = store
            .adopt_remote(
                &RemoteId::new("7"),
                fields("Amy", "Remote"),
                VersionMarker::new("v2"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        let record = store.get(&created.local_id).unwrap();
        assert_eq!(record.fields.get(ContactField::LastName), Some("Local"));
    }

    #[test]
    fn clear_all_and_refresh() {
        let store = store();
        store.create(fields("A", "One")).unwrap();
        store.create(fields("B", "Two")).unwrap();

        store.clear_all().unwrap();
        assert!(store.list().is_empty());

        // Refresh reloads whatever the backend still has (nothing)
        store.refresh().unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn stats_count_per_state() {
        let store = store();
        let a = store.create(fields("A", "One")).unwrap();
        store
            .confirm_created(&a.local_id, RemoteId::new("1"), VersionMarker::new("v1"))
            .unwrap();
        store.create(fields("B", "Two")).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.clean, 1);
        assert_eq!(stats.locally_created, 1);
        assert_eq!(stats.locally_updated, 0);
    }

    #[test]
    fn mutations_emit_events() {
        let store = store();
        let mut events = store.subscribe();

        let record = store.create(fields("Amy", "Lee")).unwrap();
        store.soft_delete(&record.local_id).unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::Created(record.local_id)
        );
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::Removed(record.local_id)
        );
    }

    #[test]
    fn search_filters_by_display_fields() {
        let store = store();
        store.create(fields("Amy", "Lee")).unwrap();
        store.create(fields("Jane", "Smith")).unwrap();

        assert_eq!(store.search("").len(), 2);
        let hits = store.search("SMITH");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fields.get(ContactField::LastName), Some("Smith"));
    }
}
