//! Contact record model and local mutation state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::contact::ContactFields;

/// A unique local identifier for a record, using UUID v7 (time-sortable)
///
/// Ascending `LocalId` order matches creation order, which gives both the
/// stable listing order and the deterministic sync-up order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Create a new unique local ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        // `now_v7` uses uuid's process-wide shared v7 context, so ids generated
        // within the same millisecond still sort in generation order.
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier assigned by the remote directory service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(String);

impl RemoteId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token for the last known remote version of a record or change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarker(String);

impl VersionMarker {
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self(marker.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local mutation state of a record
///
/// Exactly one state holds at a time. `LocallyDeleted` records keep their
/// fields and remote id until the deletion is uploaded or the record is
/// purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalState {
    /// Mirrors the last known remote version
    Clean,
    /// Created locally, never uploaded
    LocallyCreated,
    /// Edited locally since the last sync
    LocallyUpdated,
    /// Deleted locally, deletion not yet uploaded
    LocallyDeleted,
}

impl LocalState {
    /// True unless the record mirrors the remote version
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        !matches!(self, Self::Clean)
    }

    /// Stable string form used by the sqlite store
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::LocallyCreated => "locally_created",
            Self::LocallyUpdated => "locally_updated",
            Self::LocallyDeleted => "locally_deleted",
        }
    }

    /// Parse the string form written by [`LocalState::as_str`]
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "clean" => Some(Self::Clean),
            "locally_created" => Some(Self::LocallyCreated),
            "locally_updated" => Some(Self::LocallyUpdated),
            "locally_deleted" => Some(Self::LocallyDeleted),
            _ => None,
        }
    }
}

/// A contact record in the local cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Stable local identifier, assigned on first local materialization
    pub local_id: LocalId,
    /// Remote identifier; absent until the record is first uploaded
    pub remote_id: Option<RemoteId>,
    /// Attribute values
    pub fields: ContactFields,
    /// Local mutation state
    pub local_state: LocalState,
    /// Last known remote version of this record
    pub remote_version: Option<VersionMarker>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last local update timestamp (Unix ms)
    pub updated_at: i64,
}

impl ContactRecord {
    /// Materialize a record created locally; it has no remote counterpart yet
    #[must_use]
    pub fn new_local(local_id: LocalId, fields: ContactFields) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            local_id,
            remote_id: None,
            fields,
            local_state: LocalState::LocallyCreated,
            remote_version: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Materialize a clean record adopted from a remote snapshot
    #[must_use]
    pub fn from_remote(
        local_id: LocalId,
        remote_id: RemoteId,
        fields: ContactFields,
        remote_version: VersionMarker,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            local_id,
            remote_id: Some(remote_id),
            fields,
            local_state: LocalState::Clean,
            remote_version: Some(remote_version),
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the record has unsynced local changes
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.local_state.is_dirty()
    }

    /// Refresh the local update timestamp
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    /// Invariant: the remote id is absent iff the record is `LocallyCreated`
    /// and has never been uploaded.
    #[must_use]
    pub const fn remote_id_invariant_holds(&self) -> bool {
        match self.local_state {
            LocalState::LocallyCreated => self.remote_id.is_none(),
            LocalState::Clean | LocalState::LocallyUpdated | LocalState::LocallyDeleted => {
                self.remote_id.is_some()
            }
        }
    }
}
