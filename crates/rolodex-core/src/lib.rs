//! rolodex-core - Core library for Rolodex
//!
//! An offline-first contact cache that mirrors a remote directory service.
//! The crate keeps a persistent local store of contact records, tracks which
//! records carry unsynced local changes, and reconciles local and remote
//! state through explicit sync-down and sync-up passes. UI front-ends consume
//! this crate through [`store::RecordStore`] and [`sync::SyncManager`].

pub mod error;
pub mod models;
pub mod remote;
pub mod search;
pub mod status;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
pub use models::{ContactField, ContactFields, ContactRecord, LocalId, LocalState, RemoteId};
pub use store::RecordStore;
pub use sync::SyncManager;
