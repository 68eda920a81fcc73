use tracing::{debug, trace};

use crate::{
    event::PoolEvent,
    folder::FolderId,
    pool::{fetch::FetchOptions, Error, Pool, Result},
};

impl Pool {
    /// Restore the given folders from trash, one remote round trip
    /// for the whole batch.
    ///
    /// Restored ids are re-fetched at their new location; ids the
    /// server reports as gone or inaccessible are dropped from the
    /// cache instead of retried.
    pub async fn restore(&self, ids: Vec<FolderId>) -> Result<()> {
        {
            let mut state = self.lock_state().await;
            for id in &ids {
                state.listings.strip(id);
            }
        }

        let results = match self.transport().restore_folders(&ids).await {
            Ok(results) => results,
            Err(err) => {
                self.broadcast_failure(&err).await;
                return Err(Error::RestoreFoldersError(err));
            }
        };

        for (id, result) in results {
            match result {
                Ok(()) => {
                    if let Err(err) = self.get(&id, FetchOptions { cache: false }).await {
                        debug!("cannot fetch restored folder {id}: {err}");
                        trace!("{err:?}");
                    }
                    self.emit(PoolEvent::Restored(id)).await;
                }
                Err(err) if err.code.is_access_error() => {
                    debug!("dropping unrestorable folder {id}: {err}");
                    let mut state = self.lock_state().await;
                    state.entities.remove(&id);
                }
                Err(err) => {
                    self.report_remote_error(&id, &err).await;
                }
            }
        }

        // restored folders reappear under their original parents
        self.refresh().await;

        Ok(())
    }
}
