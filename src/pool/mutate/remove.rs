use tracing::{debug, trace};

use crate::{
    event::PoolEvent,
    folder::FolderId,
    pool::{
        count,
        fetch::FetchOptions,
        listing::ListingKey,
        Error, Pool, Result,
    },
    transport::RemoteFolder,
};

impl Pool {
    /// Delete the given folders, one remote call each.
    ///
    /// Stops at the first failure; the already-deleted folders stay
    /// deleted.
    pub async fn remove(&self, ids: &[FolderId]) -> Result<()> {
        for id in ids {
            self.remove_one(id).await?;
        }

        Ok(())
    }

    async fn remove_one(&self, id: &str) -> Result<()> {
        self.emit(PoolEvent::BeforeRemove(id.to_owned())).await;

        let mut events = Vec::default();
        {
            let mut guard = self.lock_state().await;
            let state = &mut *guard;

            // bubble counts away while the record is still in place
            let mut patch = RemoteFolder::new(id);
            patch.unread = Some(0);
            state.apply_remote(self.config(), &patch, &mut events);

            let old_parent = state
                .entities
                .get(id)
                .and_then(|folder| folder.parent_id.clone());

            state.listings.strip(id);
            let last = state.entities.remove(id);

            if let Some(old_parent) = &old_parent {
                count::refresh_subtotal(
                    &mut state.entities,
                    &state.listings,
                    &self.config().exclusion,
                    old_parent,
                    &mut events,
                );
            }

            if let Some(last) = last {
                events.push(PoolEvent::Removed {
                    id: id.to_owned(),
                    module: last.module(),
                    last: Box::new(last),
                });
            }

            // from here until the server answers, not-found errors
            // for this id are expected and must stay silent
            state.pending_deletions.insert(id.to_owned());
        }
        self.emit_all(events).await;

        match self
            .transport()
            .delete_folder(id, self.push_token())
            .await
        {
            Ok(outcome) => {
                let mut events = Vec::default();
                {
                    let mut guard = self.lock_state().await;
                    let state = &mut *guard;

                    state.pending_deletions.remove(id);

                    if outcome.new_path.is_none() {
                        // permanently gone: destroy the whole cached
                        // subtree, children first
                        for gone_id in state.listings.remove_subtree(id) {
                            if let Some(last) = state.entities.remove(&gone_id) {
                                events.push(PoolEvent::Removed {
                                    id: gone_id,
                                    module: last.module(),
                                    last: Box::new(last),
                                });
                            }
                        }
                        events.push(PoolEvent::ListingRemoved(ListingKey::children(id, true)));
                    }
                }
                self.emit_all(events).await;

                if let Some(new_path) = outcome.new_path {
                    // trashed rather than destroyed: re-fetch the
                    // record at its new path
                    if let Err(err) = self.get(&new_path, FetchOptions { cache: false }).await {
                        debug!("cannot fetch trashed folder {new_path}: {err}");
                        trace!("{err:?}");
                    }
                }

                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.lock_state().await;
                    state.pending_deletions.remove(id);
                }
                self.broadcast_failure(&err).await;

                // the record and its memberships are already gone
                // locally, so resynchronize with a full sweep
                self.refresh().await;

                Err(Error::DeleteFolderError(err, id.to_owned()))
            }
        }
    }
}
