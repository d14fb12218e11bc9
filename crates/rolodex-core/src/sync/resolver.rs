//! Conflict and ghost resolution
//!
//! Pure decision functions applied per record during sync passes. Policy:
//! local-wins for dirty records (no field-level merge), last-pull-wins for
//! clean ones, and a clean record whose remote counterpart is gone is a
//! ghost and gets purged.

use crate::models::ContactRecord;

/// Decision for one record during a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No local counterpart; materialize the remote record as `Clean`
    CreateClean,
    /// Overwrite the clean local mirror with the remote version
    AdoptRemote,
    /// Local record has unsynced changes; leave it untouched
    KeepLocal,
    /// Remote record is gone and the local mirror is clean; purge it
    Purge,
    /// Nothing to do
    Ignore,
}

/// Resolve a remote create/update against the matching local record, if any
#[must_use]
pub fn resolve_remote_upsert(local: Option<&ContactRecord>) -> Resolution {
    match local {
        None => Resolution::CreateClean,
        Some(record) if record.is_dirty() => Resolution::KeepLocal,
        Some(_) => Resolution::AdoptRemote,
    }
}

/// Resolve a remote deletion (or confirmed remote absence) against the
/// matching local record, if any.
///
/// Dirty records are preserved: their local intent is reconciled, or fails
/// informatively, on the next sync-up.
#[must_use]
pub fn resolve_remote_absent(local: Option<&ContactRecord>) -> Resolution {
    match local {
        None => Resolution::Ignore,
        Some(record) if record.is_dirty() => Resolution::KeepLocal,
        Some(_) => Resolution::Purge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactField, ContactFields, LocalId, LocalState, RemoteId, VersionMarker};

    fn clean_record() -> ContactRecord {
        ContactRecord::from_remote(
            LocalId::new(),
            RemoteId::new("7"),
            ContactFields::new().with(ContactField::LastName, "Lee"),
            VersionMarker::new("v1"),
        )
    }

    fn dirty_record(state: LocalState) -> ContactRecord {
        let mut record = clean_record();
        record.local_state = state;
        record
    }

    #[test]
    fn missing_local_record_is_created_clean() {
        assert_eq!(resolve_remote_upsert(None), Resolution::CreateClean);
    }

    #[test]
    fn clean_local_record_adopts_remote() {
        assert_eq!(
            resolve_remote_upsert(Some(&clean_record())),
            Resolution::AdoptRemote
        );
    }

    #[test]
    fn dirty_local_record_is_never_overwritten() {
        for state in [LocalState::LocallyUpdated, LocalState::LocallyDeleted] {
            assert_eq!(
                resolve_remote_upsert(Some(&dirty_record(state))),
                Resolution::KeepLocal
            );
        }
    }

    #[test]
    fn clean_ghost_is_purged() {
        assert_eq!(
            resolve_remote_absent(Some(&clean_record())),
            Resolution::Purge
        );
    }

    #[test]
    fn dirty_ghost_is_preserved() {
        for state in [LocalState::LocallyUpdated, LocalState::LocallyDeleted] {
            assert_eq!(
                resolve_remote_absent(Some(&dirty_record(state))),
                Resolution::KeepLocal
            );
        }
    }

    #[test]
    fn unknown_remote_deletion_is_ignored() {
        assert_eq!(resolve_remote_absent(None), Resolution::Ignore);
    }
}
