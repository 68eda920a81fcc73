use tracing::{debug, trace, warn};

use crate::{
    event::PoolEvent,
    folder::Folder,
    pool::{
        fetch::{FetchOptions, ListOptions},
        Error, Pool, Result,
    },
    transport::RemoteFolder,
};

impl Pool {
    /// Update a folder.
    ///
    /// The entity store is patched optimistically before the remote
    /// call. A rename-induced id change from the server rewrites the
    /// entity key and every listing reference, then re-fetches the
    /// sibling listing to restore the correct order.
    pub async fn update(&self, id: &str, changes: RemoteFolder) -> Result<Folder> {
        let mut changes = changes;
        changes.id = id.to_owned();

        let mut events = Vec::default();
        {
            let mut state = self.lock_state().await;
            state.apply_remote(self.config(), &changes, &mut events);
        }
        self.emit_all(events).await;

        let outcome = match self
            .transport()
            .update_folder(id, &changes, self.push_token())
            .await
        {
            Ok(outcome) => self.resolve_outcome(outcome).await,
            Err(err) => {
                self.report_remote_error(id, &err).await;
                Err(Error::UpdateFolderError(err, id.to_owned()))
            }
        };

        match outcome {
            Ok(new_id) => {
                if new_id != id {
                    // server-side concurrent exception creation:
                    // trust the server's id
                    warn!("server answered update of folder {id} with different id {new_id}");
                    self.adopt_new_id(id, &new_id).await;
                }
                self.get(&new_id, FetchOptions::default()).await
            }
            Err(err) => {
                self.refetch_ground_truth(id).await;
                self.emit(PoolEvent::UpdateFailed(id.to_owned())).await;
                Err(err)
            }
        }
    }

    /// Rewrite the entity key and every listing reference after the
    /// server answered with a different id, then re-fetch the
    /// sibling listing.
    pub(crate) async fn adopt_new_id(&self, old_id: &str, new_id: &str) {
        let parent = {
            let mut guard = self.lock_state().await;
            let state = &mut *guard;

            state.entities.rename(old_id, new_id);
            for (key, position) in state.listings.strip(old_id) {
                state.listings.insert(&key, new_id.to_owned(), position);
            }

            state
                .entities
                .get(new_id)
                .and_then(|folder| folder.parent_id.clone())
        };

        self.emit(PoolEvent::Renamed {
            old_id: old_id.to_owned(),
            new_id: new_id.to_owned(),
        })
        .await;

        if let Some(parent) = parent {
            if let Err(err) = self
                .list(
                    &parent,
                    ListOptions {
                        all: true,
                        cache: false,
                        force: true,
                    },
                )
                .await
            {
                debug!("cannot re-list siblings of renamed folder {new_id}: {err}");
                trace!("{err:?}");
            }
        }
    }
}
