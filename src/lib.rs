//! # Folder pool
//!
//! Client-side folder metadata cache and synchronization engine:
//! entity and listing stores, live count aggregation, virtual folder
//! registry, fetch orchestration and optimistic mutations, all
//! behind one cheap-to-clone [`Pool`] handle.

pub mod debounce;
pub mod event;
pub mod folder;
pub mod job;
pub mod pool;
pub mod snapshot;
pub mod transport;

#[doc(inline)]
pub use self::{
    event::PoolEvent,
    folder::{Folder, FolderId, FolderKind, FolderModule, FolderRole},
    pool::{Pool, PoolBuilder},
    snapshot::PoolSnapshot,
    transport::{ErrorCode, FolderTransport, RemoteFolder, TransportError},
};
