//! Remote directory service client abstraction
//!
//! The core is transport-agnostic: it drives the remote service only through
//! the [`RemoteClient`] trait. Implementations map their own transport
//! failures onto `RemoteUnavailable`, `Unauthorized`, and `NotFound`.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ContactFields, RemoteId, VersionMarker};

/// A record as known by the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    /// Remote identifier
    pub id: RemoteId,
    /// Attribute values
    pub fields: ContactFields,
    /// Version of this snapshot
    pub version: VersionMarker,
}

/// Remote changes since a marker, as returned by [`RemoteClient::list_changed_since`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChanges {
    /// Records created or updated since the marker
    pub records: Vec<RemoteRecord>,
    /// Ids of records deleted since the marker
    pub deleted_ids: Vec<RemoteId>,
    /// Marker to pass on the next call
    pub next_marker: VersionMarker,
}

/// Client for the remote authoritative directory service
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch a single record; `None` when the remote no longer has it
    async fn fetch_by_id(&self, id: &RemoteId) -> Result<Option<RemoteRecord>>;

    /// Create a record remotely, returning the stored snapshot with its new id
    async fn create(&self, fields: &ContactFields) -> Result<RemoteRecord>;

    /// Replace a record's fields remotely, returning the new version
    async fn update(&self, id: &RemoteId, fields: &ContactFields) -> Result<VersionMarker>;

    /// Delete a record remotely
    async fn delete(&self, id: &RemoteId) -> Result<()>;

    /// List records changed or deleted since `marker` (`None` = everything)
    async fn list_changed_since(&self, marker: Option<&VersionMarker>) -> Result<RemoteChanges>;
}
