//! In-memory local store

use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{ContactRecord, LocalId};

use super::LocalStore;

/// Non-durable [`LocalStore`] used by tests and no-persistence setups
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<LocalId, ContactRecord>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get_by_id(&self, id: &LocalId) -> Result<Option<ContactRecord>> {
        Ok(self.records.get(id).cloned())
    }

    fn list_all(&self) -> Result<Vec<ContactRecord>> {
        Ok(self.records.values().cloned().collect())
    }

    fn upsert(&mut self, record: &ContactRecord) -> Result<()> {
        self.records.insert(record.local_id, record.clone());
        Ok(())
    }

    fn delete_by_id(&mut self, id: &LocalId) -> Result<()> {
        self.records.remove(id);
        Ok(())
    }

    fn new_local_id(&mut self) -> LocalId {
        LocalId::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactField, ContactFields};

    #[test]
    fn upsert_get_delete_round_trip() {
        let mut store = MemoryStore::new();
        let id = store.new_local_id();
        let record = ContactRecord::new_local(
            id,
            ContactFields::new().with(ContactField::LastName, "Lee"),
        );

        store.upsert(&record).unwrap();
        assert_eq!(store.get_by_id(&id).unwrap(), Some(record.clone()));
        assert_eq!(store.list_all().unwrap(), vec![record]);

        store.delete_by_id(&id).unwrap();
        assert_eq!(store.get_by_id(&id).unwrap(), None);
        // Deleting again is fine
        store.delete_by_id(&id).unwrap();
    }
}
