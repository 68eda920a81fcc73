//! Module dedicated to the virtual folder registry.
//!
//! A virtual folder has no server-side storage representation: its
//! children are computed on demand by a user-supplied asynchronous
//! getter (e.g. "Unread" across all mail accounts). Virtual listings
//! always merge in the *live* cached attributes of real entities, so
//! they never show stale counters captured at getter-construction
//! time.

use std::{future::Future, pin::Pin, sync::Arc};

use futures::future::join_all;
use tracing::{debug, trace};

use crate::{
    folder::{Folder, FolderId, FolderKind},
    transport::RemoteFolder,
};

use super::{count, fetch::collect_listing, listing::ListingKey, Error, Pool, Result};

/// The error type returned by virtual folder getters.
pub type VirtualGetterError = Box<dyn std::error::Error + Send + Sync>;

/// The user-supplied asynchronous getter producing a virtual
/// folder's children on demand.
pub type VirtualGetter = dyn Fn() -> Pin<
        Box<dyn Future<Output = std::result::Result<Vec<RemoteFolder>, VirtualGetterError>> + Send>,
    > + Send
    + Sync;

impl Pool {
    /// Register a virtual folder getter.
    ///
    /// The corresponding entity is immediately marked as having
    /// subfolders so expand affordances render before the first
    /// fetch.
    pub async fn register_virtual<F>(
        &self,
        id: impl ToString,
        getter: impl Fn() -> F + Send + Sync + 'static,
    ) where
        F: Future<Output = std::result::Result<Vec<RemoteFolder>, VirtualGetterError>>
            + Send
            + 'static,
    {
        let id = id.to_string();
        debug!("registering virtual folder {id}");

        self.virtuals()
            .lock()
            .await
            .insert(id.clone(), Arc::new(move || Box::pin(getter())));

        let mut state = self.lock_state().await;
        let folder = state.entities.get_or_create_stub(&id);
        folder.kind = FolderKind::Virtual;
        folder.has_subfolders = true;
    }

    /// List the computed children of a virtual folder.
    ///
    /// Fails fast with a distinct error when the id was never
    /// registered, since that indicates a programming error in a
    /// collaborator.
    pub async fn list_virtual(&self, id: &str) -> Result<Vec<Folder>> {
        let getter = self
            .virtuals()
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ListUnregisteredVirtualFolderError(id.to_owned()))?;

        let remotes = getter()
            .await
            .map_err(|err| Error::ListVirtualFolderError(err, id.to_owned()))?;

        let key = ListingKey::r#virtual(id);
        let mut events = Vec::default();
        let folders = {
            let mut guard = self.lock_state().await;
            let state = &mut *guard;

            let mut ids = Vec::with_capacity(remotes.len());
            for (index, remote) in remotes.iter().enumerate() {
                if state.pending_deletions.contains(&remote.id) {
                    continue;
                }
                // a duplicated id keeps its first position
                if ids.contains(&remote.id) {
                    continue;
                }

                // live cached attributes win over the getter's copy:
                // only unknown entities are populated from the
                // delivered records
                let known = state
                    .entities
                    .get(&remote.id)
                    .map(|folder| !folder.is_stub())
                    .unwrap_or_default();
                if !known {
                    state.apply_remote(self.config(), remote, &mut events);
                }

                let folder = state.entities.get_or_create_stub(&remote.id);
                folder.sort_keys.insert(key.clone(), index as u64);
                folder.virtual_parents.insert(id.to_owned());
                ids.push(remote.id.clone());
            }

            state.listings.set(&key, ids, true);
            state.listings.sort(&key, &state.entities);

            let len = state
                .listings
                .get(&key)
                .map(|listing| listing.len())
                .unwrap_or_default();
            state.entities.get_or_create_stub(id).has_subfolders = len > 0;

            // refresh the virtual folder's own subtotal from its
            // computed listing
            let subtotal = count::sum_listing(
                &state.entities,
                &self.config().exclusion,
                state
                    .listings
                    .get(&key)
                    .map(|listing| listing.ids())
                    .unwrap_or_default(),
            );
            let folder = state.entities.get_or_create_stub(id);
            if folder.subtotal != subtotal {
                folder.subtotal = subtotal;
                events.push(crate::event::PoolEvent::SubtotalChanged {
                    id: id.to_owned(),
                    subtotal,
                });
            }

            collect_listing(state, &key)
        };
        self.emit_all(events).await;

        Ok(folders)
    }

    /// Re-list every registered virtual folder, best effort: one
    /// failing getter never blocks the others.
    pub async fn refresh_virtual(&self) {
        let ids: Vec<FolderId> = self.virtuals().lock().await.keys().cloned().collect();

        let tasks = ids.into_iter().map(|id| {
            let pool = self.clone();
            async move {
                let result = pool.list_virtual(&id).await;
                (id, result)
            }
        });

        for (id, result) in join_all(tasks).await {
            if let Err(err) = result {
                debug!("cannot refresh virtual folder {id}: {err}");
                trace!("{err:?}");
            }
        }
    }
}
