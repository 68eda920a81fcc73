//! # Event module
//!
//! Module dedicated to the pool event bus. Every state change is
//! broadcast as a [`PoolEvent`] to any number of asynchronous
//! handlers, fire-and-forget: handler failures are logged, never
//! propagated. Handlers filter by id themselves.

use std::{fmt, future::Future, pin::Pin, sync::Arc};

use tracing::{debug, trace};

use crate::{
    folder::{Folder, FolderId, FolderModule},
    pool::listing::ListingKey,
    transport::ErrorCode,
};

/// The result type returned by event handlers.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// The pool asynchronous event handler.
pub type PoolEventHandler =
    dyn Fn(PoolEvent) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> + Send + Sync;

/// The pool event.
///
/// Represents everything that can happen to the folder cache:
/// entity lifecycle, counter changes, mutations and their failures,
/// flat cache lifecycle and remote errors.
#[derive(Clone, Debug)]
pub enum PoolEvent {
    /// A folder entity entered the store.
    Added(FolderId),

    /// A folder entity changed.
    Updated { id: FolderId, module: FolderModule },

    /// An optimistic update was rejected by the remote service and
    /// rolled back by re-fetching ground truth.
    UpdateFailed(FolderId),

    TotalChanged { id: FolderId, total: i64 },
    UnreadChanged { id: FolderId, unread: u64 },
    SubtotalChanged { id: FolderId, subtotal: u64 },

    /// The server answered an update with a different id.
    Renamed { old_id: FolderId, new_id: FolderId },

    /// A folder was created; consumers usually select it once.
    Created(FolderId),

    BeforeMove {
        id: FolderId,
        from: Option<FolderId>,
        to: FolderId,
    },
    Moved {
        id: FolderId,
        from: Option<FolderId>,
        to: FolderId,
    },

    BeforeRemove(FolderId),

    /// A folder entity left the store, with its last known
    /// snapshot.
    Removed {
        id: FolderId,
        module: FolderModule,
        last: Box<Folder>,
    },

    Restored(FolderId),

    /// A flat folder entered or left the hidden section.
    Hidden(FolderId),
    Shown(FolderId),

    PermissionsChanged(FolderId),
    SubscriptionChanged(FolderId),

    /// A remote failure, tagged with its normalized code.
    Error { code: ErrorCode, message: String },

    BeforeFlat(FolderModule),
    FlatCached(FolderModule),
    AfterFlat(FolderModule),

    /// A listing was destroyed.
    ListingRemoved(ListingKey),
}

impl PoolEvent {
    /// Emit the event to every handler, awaiting each one. Handler
    /// failures are logged and never block the remaining handlers.
    pub(crate) async fn emit(&self, handlers: &[Arc<PoolEventHandler>]) {
        for handler in handlers {
            if let Err(err) = handler(self.clone()).await {
                debug!("error while emitting pool event: {err}");
                trace!("{err:?}");
            } else {
                trace!("emitted pool event {self:?}");
            }
        }
    }
}

impl fmt::Display for PoolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added(id) => write!(f, "Added folder {id}"),
            Self::Updated { id, module } => write!(f, "Updated {module} folder {id}"),
            Self::UpdateFailed(id) => write!(f, "Failed to update folder {id}"),
            Self::TotalChanged { id, total } => {
                write!(f, "Changed total of folder {id} to {total}")
            }
            Self::UnreadChanged { id, unread } => {
                write!(f, "Changed unread of folder {id} to {unread}")
            }
            Self::SubtotalChanged { id, subtotal } => {
                write!(f, "Changed subtotal of folder {id} to {subtotal}")
            }
            Self::Renamed { old_id, new_id } => {
                write!(f, "Renamed folder {old_id} to {new_id}")
            }
            Self::Created(id) => write!(f, "Created folder {id}"),
            Self::BeforeMove { id, to, .. } => write!(f, "Moving folder {id} to {to}"),
            Self::Moved { id, to, .. } => write!(f, "Moved folder {id} to {to}"),
            Self::BeforeRemove(id) => write!(f, "Removing folder {id}"),
            Self::Removed { id, .. } => write!(f, "Removed folder {id}"),
            Self::Restored(id) => write!(f, "Restored folder {id}"),
            Self::Hidden(id) => write!(f, "Hid folder {id}"),
            Self::Shown(id) => write!(f, "Showed folder {id}"),
            Self::PermissionsChanged(id) => {
                write!(f, "Changed permissions of folder {id}")
            }
            Self::SubscriptionChanged(id) => {
                write!(f, "Changed subscription of folder {id}")
            }
            Self::Error { code, message } => write!(f, "Remote error {code}: {message}"),
            Self::BeforeFlat(module) => write!(f, "Fetching flat {module} folders"),
            Self::FlatCached(module) => write!(f, "Cached flat {module} folders"),
            Self::AfterFlat(module) => write!(f, "Fetched flat {module} folders"),
            Self::ListingRemoved(key) => write!(f, "Removed listing {key}"),
        }
    }
}
