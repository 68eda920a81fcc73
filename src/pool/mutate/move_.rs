use tracing::{debug, trace};

use crate::{
    event::PoolEvent,
    folder::Folder,
    pool::{
        count,
        fetch::{FetchOptions, ListOptions},
        Error, Pool, Result,
    },
    transport::RemoteFolder,
};

impl Pool {
    /// Move a folder below a new parent.
    ///
    /// The folder is optimistically stripped from every listing and
    /// its unread is bubbled away from the old parent before the
    /// remote call. On failure the exact prior memberships (key and
    /// position) are restored.
    pub async fn move_folder(&self, id: &str, target: &str) -> Result<Folder> {
        let mut events = Vec::default();
        let (memberships, prev_unread, old_parent, virtual_parents) = {
            let mut guard = self.lock_state().await;
            let state = &mut *guard;

            let folder = state.entities.get_or_create_stub(id);
            let prev_unread = folder.unread;
            let old_parent = folder.parent_id.clone();
            // bubbling against the stripped listings prunes the
            // virtual back-references as stale; keep a copy so the
            // rollback can restore them
            let virtual_parents = folder.virtual_parents.clone();

            let memberships = state.listings.strip(id);

            // bubbling runs against the already-stripped listings, so
            // the old parent's counts drop immediately
            let mut patch = RemoteFolder::new(id);
            patch.unread = Some(0);
            state.apply_remote(self.config(), &patch, &mut events);

            if let Some(old_parent) = &old_parent {
                count::refresh_subtotal(
                    &mut state.entities,
                    &state.listings,
                    &self.config().exclusion,
                    old_parent,
                    &mut events,
                );
            }

            (memberships, prev_unread, old_parent, virtual_parents)
        };
        events.insert(
            0,
            PoolEvent::BeforeMove {
                id: id.to_owned(),
                from: old_parent.clone(),
                to: target.to_owned(),
            },
        );
        self.emit_all(events).await;

        let mut changes = RemoteFolder::new(id);
        changes.parent_id = Some(target.to_owned());

        let outcome = match self
            .transport()
            .update_folder(id, &changes, self.push_token())
            .await
        {
            Ok(outcome) => self.resolve_outcome(outcome).await,
            Err(err) => {
                self.report_remote_error(id, &err).await;
                Err(Error::MoveFolderError(err, id.to_owned()))
            }
        };

        match outcome {
            Ok(new_id) => {
                if new_id != id {
                    // path-based ids change on move
                    self.adopt_new_id(id, &new_id).await;
                }

                {
                    let mut state = self.lock_state().await;
                    let folder = state.entities.get_or_create_stub(&new_id);
                    folder.parent_id = Some(target.to_owned());
                    state.entities.get_or_create_stub(target).has_subfolders = true;
                    // the old parent's flag stays up until its next
                    // listing says otherwise
                    if let Some(old_parent) = &old_parent {
                        state.entities.get_or_create_stub(old_parent).has_subfolders = true;
                    }
                }

                if let Err(err) = self
                    .list(
                        target,
                        ListOptions {
                            all: true,
                            cache: false,
                            force: true,
                        },
                    )
                    .await
                {
                    debug!("cannot re-list new parent of moved folder {new_id}: {err}");
                    trace!("{err:?}");
                }

                // a move can change virtual membership
                self.refresh_virtual().await;

                self.emit(PoolEvent::Moved {
                    id: new_id.clone(),
                    from: old_parent,
                    to: target.to_owned(),
                })
                .await;

                self.get(&new_id, FetchOptions::default()).await
            }
            Err(err) => {
                let mut events = Vec::default();
                {
                    let mut guard = self.lock_state().await;
                    let state = &mut *guard;

                    for (key, position) in memberships {
                        state.listings.insert(&key, id.to_owned(), position);
                        state.listings.sort(&key, &state.entities);
                    }

                    // the listings are back in place, so the pruned
                    // virtual back-references are valid again
                    state.entities.get_or_create_stub(id).virtual_parents = virtual_parents;

                    let mut patch = RemoteFolder::new(id);
                    patch.unread = Some(prev_unread);
                    state.apply_remote(self.config(), &patch, &mut events);

                    if let Some(old_parent) = &old_parent {
                        count::refresh_subtotal(
                            &mut state.entities,
                            &state.listings,
                            &self.config().exclusion,
                            old_parent,
                            &mut events,
                        );
                    }
                }
                self.emit_all(events).await;

                Err(err)
            }
        }
    }
}
