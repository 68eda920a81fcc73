use crate::{
    event::PoolEvent,
    folder::Folder,
    pool::{Error, Pool, Result},
    transport::RemoteFolder,
};

impl Pool {
    /// Clear the contents of a folder.
    ///
    /// Counters are zeroed optimistically. Clearing the trash also
    /// destroys the cached subtree once the server job finished,
    /// since the contained folders are truly gone.
    pub async fn clear(&self, id: &str) -> Result<()> {
        let mut events = Vec::default();
        {
            let mut state = self.lock_state().await;
            let mut patch = RemoteFolder::new(id);
            patch.total = Some(0);
            patch.unread = Some(0);
            state.apply_remote(self.config(), &patch, &mut events);
        }
        self.emit_all(events).await;

        let outcome = match self
            .transport()
            .clear_folder(id, self.push_token())
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.report_remote_error(id, &err).await;
                self.refetch_ground_truth(id).await;
                return Err(Error::ClearFolderError(err, id.to_owned()));
            }
        };
        self.resolve_outcome(outcome).await?;

        let is_trash = {
            let state = self.lock_state().await;
            state.entities.get(id).map(Folder::is_trash).unwrap_or_default()
        };

        if is_trash {
            let mut events = Vec::default();
            {
                let mut guard = self.lock_state().await;
                let state = &mut *guard;
                for gone_id in state.listings.remove_subtree(id) {
                    if let Some(last) = state.entities.remove(&gone_id) {
                        events.push(PoolEvent::Removed {
                            id: gone_id,
                            module: last.module(),
                            last: Box::new(last),
                        });
                    }
                }
            }
            self.emit_all(events).await;
        }

        Ok(())
    }
}
