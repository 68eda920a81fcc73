//! # Snapshot module
//!
//! Module dedicated to the pre-warmed startup snapshot: a serialized
//! capture of folder records and listing orders persisted by the
//! application at shutdown and fed back at startup, so the first
//! paint happens before any round trip.

use serde::{Deserialize, Serialize};

use crate::{folder::FolderId, transport::RemoteFolder};

/// One captured children listing.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SnapshotListing {
    pub parent: FolderId,
    pub all: bool,
    pub ids: Vec<FolderId>,
}

/// The pre-warmed startup snapshot.
///
/// Folder records are merged into the entity store immediately on
/// [`prime`](crate::pool::Pool::prime); listings are consumed exactly
/// once by the next matching list call, then re-fetched as usual.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    #[serde(default)]
    pub folders: Vec<RemoteFolder>,
    #[serde(default)]
    pub listings: Vec<SnapshotListing>,
}
