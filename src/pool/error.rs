use std::result;

use thiserror::Error;

use crate::{
    folder::{FolderId, FolderModule},
    transport::TransportError,
};

/// The global `Result` alias of the module.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot get folder {1}")]
    GetFolderError(#[source] TransportError, FolderId),
    #[error("cannot list subfolders of {1}")]
    ListSubfoldersError(#[source] TransportError, FolderId),
    #[error("cannot list flat {1} folders")]
    ListFlatFoldersError(#[source] TransportError, FolderModule),
    #[error("cannot list ranged subfolders of {1}")]
    ListRangedFoldersError(#[source] TransportError, FolderId),
    #[error("cannot list virtual folder {0}: no getter registered")]
    ListUnregisteredVirtualFolderError(FolderId),
    #[error("cannot list virtual folder {1}")]
    ListVirtualFolderError(
        #[source] Box<dyn std::error::Error + Send + Sync>,
        FolderId,
    ),
    #[error("cannot create folder below {1}")]
    CreateFolderError(#[source] TransportError, FolderId),
    #[error("cannot update folder {1}")]
    UpdateFolderError(#[source] TransportError, FolderId),
    #[error("cannot move folder {1}")]
    MoveFolderError(#[source] TransportError, FolderId),
    #[error("cannot delete folder {1}")]
    DeleteFolderError(#[source] TransportError, FolderId),
    #[error("cannot restore folders")]
    RestoreFoldersError(#[source] TransportError),
    #[error("cannot clear folder {1}")]
    ClearFolderError(#[source] TransportError, FolderId),
    #[error("cannot wait for job {0}: no job runner configured")]
    WaitJobMissingRunnerError(String),
    #[error("cannot wait for job {1}")]
    WaitJobError(#[source] TransportError, String),
}
