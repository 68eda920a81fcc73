use tracing::{debug, trace};

use crate::{
    event::PoolEvent,
    folder::{Folder, FolderModule},
    pool::{
        fetch::{FetchOptions, ListOptions},
        flat::FlatOptions,
        Error, Pool, Result,
    },
    transport::FolderDraft,
};

impl Pool {
    /// Create a folder below the given parent.
    ///
    /// Creation has no optimistic phase: the new id only exists once
    /// the server answered, so the listing is re-fetched instead of
    /// patched.
    pub async fn create(&self, parent: &str, draft: FolderDraft) -> Result<Folder> {
        let draft = {
            let state = self.lock_state().await;
            let parent_folder = state.entities.get(parent);

            let mut draft = draft;
            if draft.module.is_none() {
                draft.module = parent_folder.map(Folder::module);
            }

            // flat non-calendar folders inherit the admin entries of
            // the parent's permission list
            let module = draft.module.unwrap_or(FolderModule::Unknown);
            if module.is_flat() && module != FolderModule::Calendar && draft.permissions.is_empty()
            {
                if let Some(parent_folder) = parent_folder {
                    draft.permissions = parent_folder
                        .permissions
                        .iter()
                        .filter(|permission| permission.is_admin())
                        .cloned()
                        .collect();
                }
            }

            draft
        };

        let id = match self
            .transport()
            .create_folder(parent, &draft, self.push_token())
            .await
        {
            Ok(id) => id,
            Err(err) => {
                self.broadcast_failure(&err).await;
                return Err(Error::CreateFolderError(err, parent.to_owned()));
            }
        };

        let module = draft.module.unwrap_or(FolderModule::Unknown);
        let refreshed = if module.is_flat() {
            self.flat(
                module,
                FlatOptions {
                    all: true,
                    cache: false,
                },
            )
            .await
            .map(|_| ())
        } else {
            self.list(
                parent,
                ListOptions {
                    all: true,
                    cache: false,
                    force: true,
                },
            )
            .await
            .map(|_| ())
        };
        if let Err(err) = refreshed {
            debug!("cannot re-list parent of created folder {id}: {err}");
            trace!("{err:?}");
        }

        let folder = self.get(&id, FetchOptions::default()).await?;
        self.emit(PoolEvent::Created(id)).await;

        Ok(folder)
    }
}
