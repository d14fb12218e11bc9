//! `SQLite`-backed local store

use std::path::Path;

use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{ContactRecord, LocalId, LocalState, RemoteId, VersionMarker};

use super::{migrations, LocalStore};

/// Durable [`LocalStore`] backed by a `SQLite` file
///
/// Record fields are stored as a JSON column; everything the sync engine
/// filters on (state, remote id) gets its own column.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a store at the given path, creating the file and schema if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| Error::Store(error.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        Self::configure(&conn);
        migrations::run(&mut conn)?;
        Ok(Self { conn })
    }

    /// Configure `SQLite` for local-cache workloads
    fn configure(conn: &Connection) {
        // WAL is unavailable for in-memory databases; ignore pragma failures
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON").ok();
    }

    /// Parse a record from a database row
    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactRecord> {
        let local_id: String = row.get(0)?;
        let local_id = local_id.parse::<LocalId>().map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(error),
            )
        })?;

        let fields_json: String = row.get(2)?;
        let fields = serde_json::from_str(&fields_json).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(error),
            )
        })?;

        let state: String = row.get(3)?;
        let local_state = LocalState::parse(&state).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown local state: {state}").into(),
            )
        })?;

        Ok(ContactRecord {
            local_id,
            remote_id: row.get::<_, Option<String>>(1)?.map(RemoteId::new),
            fields,
            local_state,
            remote_version: row.get::<_, Option<String>>(4)?.map(VersionMarker::new),
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl LocalStore for SqliteStore {
    fn get_by_id(&self, id: &LocalId) -> Result<Option<ContactRecord>> {
        let result = self.conn.query_row(
            "SELECT local_id, remote_id, fields, local_state, remote_version, created_at, updated_at
             FROM contacts WHERE local_id = ?",
            params![id.as_str()],
            Self::parse_record,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_all(&self) -> Result<Vec<ContactRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT local_id, remote_id, fields, local_state, remote_version, created_at, updated_at
             FROM contacts
             ORDER BY local_id ASC",
        )?;

        let records = stmt
            .query_map([], Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn upsert(&mut self, record: &ContactRecord) -> Result<()> {
        let fields_json = serde_json::to_string(&record.fields)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO contacts
                (local_id, remote_id, fields, local_state, remote_version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                record.local_id.as_str(),
                record.remote_id.as_ref().map(RemoteId::as_str),
                fields_json,
                record.local_state.as_str(),
                record.remote_version.as_ref().map(VersionMarker::as_str),
                record.created_at,
                record.updated_at,
            ],
        )?;

        Ok(())
    }

    fn delete_by_id(&mut self, id: &LocalId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM contacts WHERE local_id = ?",
            params![id.as_str()],
        )?;
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
    use pretty_assertions::assert_eq;

    fn sample(last: &str) -> ContactRecord {
        ContactRecord::new_local(
            LocalId::new(),
            ContactFields::new()
                .with(ContactField::FirstName, "Amy")
                .with(ContactField::LastName, last),
        )
    }

    #[test]
    fn upsert_and_get_round_trip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut record = sample("Lee");
        record.remote_id = Some(RemoteId::new("7"));
        record.local_state = LocalState::Clean;
        record.remote_version = Some(VersionMarker::new("v1"));

        store.upsert(&record).unwrap();
        let fetched = store.get_by_id(&record.local_id).unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[test]
    fn get_missing_returns_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_by_id(&LocalId::new()).unwrap(), None);
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut record = sample("Lee");
        store.upsert(&record).unwrap();

        record.fields.set(
            ContactField::LastName,
            Some("Lewis".to_string()),
        );
        record.local_state = LocalState::LocallyUpdated;
        store.upsert(&record).unwrap();

        let fetched = store.get_by_id(&record.local_id).unwrap().unwrap();
        assert_eq!(fetched.fields.get(ContactField::LastName), Some("Lewis"));
        assert_eq!(fetched.local_state, LocalState::LocallyUpdated);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn list_all_orders_by_local_id() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = sample("One");
        let second = sample("Two");
        // Insert out of order; listing must come back sorted
        store.upsert(&second).unwrap();
        store.upsert(&first).unwrap();

        let ids: Vec<LocalId> = store
            .list_all()
            .unwrap()
            .iter()
            .map(|r| r.local_id)
            .collect();
        assert_eq!(ids, vec![first.local_id, second.local_id]);
    }

    #[test]
    fn delete_is_idempotent() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let record = sample("Lee");
        store.upsert(&record).unwrap();

        store.delete_by_id(&record.local_id).unwrap();
        store.delete_by_id(&record.local_id).unwrap();
        assert_eq!(store.get_by_id(&record.local_id).unwrap(), None);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rolodex.db");

        let record = sample("Lee");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.upsert(&record).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_by_id(&record.local_id).unwrap(), Some(record));
    }
}
