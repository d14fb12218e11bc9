//! Data models for Rolodex

mod alert;
mod contact;
mod record;

pub use alert::SyncAlert;
pub use contact::{ContactField, ContactFields};
pub use record::{ContactRecord, LocalId, LocalState, RemoteId, VersionMarker};
