//! Module dedicated to the fetch orchestrator.
//!
//! Decides whether a folder or a listing can be served from cache,
//! from a pre-warmed snapshot, or must be fetched remotely, and
//! post-processes remote listings (block-list filtering, custom
//! ordering injection, index tagging) before caching them.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::folder::{Folder, FolderModule};

use super::{
    count,
    listing::ListingKey,
    Error, Pool, PoolState, Result,
};

/// Options of a single-folder fetch.
#[derive(Clone, Copy, Debug)]
pub struct FetchOptions {
    /// Serve a full (non-stub) cached record without a round trip.
    pub cache: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { cache: true }
    }
}

/// Options of a children listing fetch.
#[derive(Clone, Copy, Debug)]
pub struct ListOptions {
    /// List all children instead of the subscribed-only subset.
    pub all: bool,

    /// Serve a still-valid cached listing without a round trip.
    pub cache: bool,

    /// Skip the cache and the pre-warmed snapshot entirely.
    pub force: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            all: true,
            cache: true,
            force: false,
        }
    }
}

/// Collect the entities of a listing in display order.
pub(crate) fn collect_listing(state: &PoolState, key: &ListingKey) -> Vec<Folder> {
    state
        .listings
        .get(key)
        .map(|listing| {
            listing
                .ids()
                .iter()
                .filter_map(|id| state.entities.get(id))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

impl Pool {
    /// Fetch one folder, from cache when possible.
    pub async fn get(&self, id: &str, opts: FetchOptions) -> Result<Folder> {
        if opts.cache {
            let state = self.lock_state().await;
            if let Some(folder) = state.entities.get(id) {
                if !folder.is_stub() {
                    trace!("serving folder {id} from cache");
                    return Ok(folder.clone());
                }
            }
        }

        let remote = match self.transport().get_folder(id).await {
            Ok(remote) => remote,
            Err(err) => {
                self.report_remote_error(id, &err).await;
                return Err(Error::GetFolderError(err, id.to_owned()));
            }
        };

        let mut events = Vec::default();
        let folder = {
            let mut state = self.lock_state().await;

            // a late fetch result must not resurrect an entity whose
            // deletion is in flight
            if state.pending_deletions.contains(&remote.id) {
                return Err(Error::GetFolderError(
                    crate::transport::TransportError::not_found(format!(
                        "folder {id} is being deleted"
                    )),
                    id.to_owned(),
                ));
            }

            state.apply_remote(self.config(), &remote, &mut events);
            state.entities.get_or_create_stub(&remote.id).clone()
        };
        self.emit_all(events).await;

        Ok(folder)
    }

    /// List the children of a folder.
    ///
    /// Resolution order: still-valid cached listing, one-shot
    /// pre-warmed snapshot, flat-root delegation, virtual-folder
    /// delegation, remote call.
    pub async fn list(&self, parent: &str, opts: ListOptions) -> Result<Vec<Folder>> {
        let key = ListingKey::children(parent, opts.all);

        if opts.cache && !opts.force {
            let state = self.lock_state().await;
            if let Some(listing) = state.listings.get(&key) {
                if listing.is_valid() {
                    trace!("serving listing {key} from cache");
                    return Ok(collect_listing(&state, &key));
                }
            }
        }

        if !opts.force {
            let mut events = Vec::default();
            let warmed = {
                let mut guard = self.lock_state().await;
                let state = &mut *guard;
                match state.prewarmed.remove(&key) {
                    Some(ids) => {
                        trace!("serving listing {key} from pre-warmed snapshot");
                        for (index, id) in ids.iter().enumerate() {
                            let folder = state.entities.get_or_create_stub(id);
                            folder.sort_keys.insert(key.clone(), index as u64);
                        }
                        state.listings.set(&key, ids, true);
                        state.listings.sort(&key, &state.entities);
                        count::refresh_subtotal(
                            &mut state.entities,
                            &state.listings,
                            &self.config().exclusion,
                            parent,
                            &mut events,
                        );
                        Some(collect_listing(state, &key))
                    }
                    None => None,
                }
            };
            if let Some(folders) = warmed {
                self.emit_all(events).await;
                return Ok(folders);
            }
        }

        if let Some(module) = self.config().flat_roots.get(parent).copied() {
            let sections = self
                .flat(
                    module,
                    super::flat::FlatOptions {
                        all: opts.all,
                        cache: opts.cache && !opts.force,
                    },
                )
                .await?;
            return Ok(sections.private);
        }

        if self.virtuals().lock().await.contains_key(parent) {
            return self.list_virtual(parent).await;
        }

        let remotes = match self.transport().list_children(parent, opts.all).await {
            Ok(remotes) => remotes,
            Err(err) => {
                self.report_remote_error(parent, &err).await;
                return Err(Error::ListSubfoldersError(err, parent.to_owned()));
            }
        };

        let mut events = Vec::default();
        let folders = {
            let mut guard = self.lock_state().await;
            let state = &mut *guard;

            let mut remotes: Vec<_> = remotes
                .into_iter()
                .filter(|remote| !self.config().blocklist.contains(&remote.id))
                .collect();

            // inject the user's custom ordering ahead of the server
            // order (stable, so non-ordered items keep their place)
            let module = state
                .entities
                .get(parent)
                .map(|folder| folder.module())
                .unwrap_or(FolderModule::Unknown);
            if let Some(order) = self.config().settings.custom_order.get(&module) {
                remotes.sort_by_key(|remote| {
                    order
                        .iter()
                        .position(|id| id == &remote.id)
                        .unwrap_or(usize::MAX)
                });
            }

            let mut ids = Vec::with_capacity(remotes.len());
            for (index, remote) in remotes.iter().enumerate() {
                if state.pending_deletions.contains(&remote.id) {
                    continue;
                }
                // a duplicated id keeps its first position
                if ids.contains(&remote.id) {
                    continue;
                }
                state.apply_remote(self.config(), remote, &mut events);
                let folder = state.entities.get_or_create_stub(&remote.id);
                folder.sort_keys.insert(key.clone(), index as u64);
                if folder.parent_id.is_none() {
                    folder.parent_id = Some(parent.to_owned());
                }
                ids.push(remote.id.clone());
            }

            state.listings.set(&key, ids, false);
            state.listings.sort(&key, &state.entities);

            let has_subfolders = state
                .listings
                .get(&key)
                .map(|listing| !listing.is_empty())
                .unwrap_or_default();
            state.entities.get_or_create_stub(parent).has_subfolders = has_subfolders;

            count::refresh_subtotal(
                &mut state.entities,
                &state.listings,
                &self.config().exclusion,
                parent,
                &mut events,
            );

            collect_listing(state, &key)
        };
        self.emit_all(events).await;

        Ok(folders)
    }

    /// List the children of a folder restricted to a time range.
    ///
    /// Ranged listings are query results: cached under their own
    /// key, fully replaced on every fetch, and never fed into the
    /// parent's subfolder flag or subtotal.
    pub async fn list_ranged(
        &self,
        parent: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        opts: FetchOptions,
    ) -> Result<Vec<Folder>> {
        let key = ListingKey::range(parent, start, end);

        if opts.cache {
            let state = self.lock_state().await;
            if let Some(listing) = state.listings.get(&key) {
                if listing.is_valid() {
                    trace!("serving listing {key} from cache");
                    return Ok(collect_listing(&state, &key));
                }
            }
        }

        let remotes = match self.transport().list_ranged(parent, start, end).await {
            Ok(remotes) => remotes,
            Err(err) => {
                self.report_remote_error(parent, &err).await;
                return Err(Error::ListRangedFoldersError(err, parent.to_owned()));
            }
        };

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
                state.apply_remote(self.config(), remote, &mut events);
                let folder = state.entities.get_or_create_stub(&remote.id);
                folder.sort_keys.insert(key.clone(), index as u64);
                if folder.parent_id.is_none() {
                    folder.parent_id = Some(parent.to_owned());
                }
                ids.push(remote.id.clone());
            }

            state.listings.set(&key, ids, true);
            state.listings.sort(&key, &state.entities);

            collect_listing(state, &key)
        };
        self.emit_all(events).await;

        Ok(folders)
    }
}
