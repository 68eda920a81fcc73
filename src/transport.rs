//! # Transport module
//!
//! Module dedicated to the remote transport collaborator. The pool
//! talks to the remote service exclusively through the
//! [`FolderTransport`] trait; the HTTP batching layer behind it is
//! out of scope.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    folder::{FolderId, FolderModule, Permission},
    job::JobToken,
};

/// The normalized remote error code.
///
/// Remote failures are always tagged with one of these codes before
/// being broadcast and returned.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    NotFound,
    PermissionDenied,
    Validation,
    Network,
    Conflict,
    Other(String),
}

impl ErrorCode {
    /// Return `true` for the narrow set of codes that mean the
    /// folder is gone or inaccessible. These are the codes suppressed
    /// for ids whose deletion is already in flight.
    pub fn is_access_error(&self) -> bool {
        matches!(self, Self::NotFound | Self::PermissionDenied)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NotFound => "not-found",
            Self::PermissionDenied => "permission-denied",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Conflict => "conflict",
            Self::Other(code) => code.as_str(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A code-tagged remote failure.
#[derive(Clone, Debug, Error)]
#[error("remote call failed with {code}: {message}")]
pub struct TransportError {
    pub code: ErrorCode,
    pub message: String,
}

impl TransportError {
    pub fn new(code: ErrorCode, message: impl ToString) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    pub fn not_found(message: impl ToString) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn permission_denied(message: impl ToString) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn network(message: impl ToString) -> Self {
        Self::new(ErrorCode::Network, message)
    }
}

/// The folder wire record, as delivered by the remote service.
///
/// Merged into [`Folder`](crate::folder::Folder) entities with patch
/// semantics: only supplied fields change.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RemoteFolder {
    pub id: FolderId,
    #[serde(default)]
    pub parent_id: Option<FolderId>,
    #[serde(default)]
    pub module: Option<FolderModule>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    #[serde(default)]
    pub own_rights: Option<u64>,
    #[serde(default)]
    pub supported_capabilities: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Vec<Permission>>,
    #[serde(default)]
    pub subscribed: Option<bool>,
    #[serde(default)]
    pub has_subfolders: Option<bool>,
    #[serde(default)]
    pub total: Option<i64>,
    #[serde(default)]
    pub unread: Option<u64>,
    #[serde(default)]
    pub standard_folder: Option<bool>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub unified: Option<bool>,
}

impl RemoteFolder {
    pub fn new(id: impl ToString) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

/// The data of a folder to be created.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FolderDraft {
    pub title: String,
    #[serde(default)]
    pub module: Option<FolderModule>,
    #[serde(default)]
    pub subscribed: Option<bool>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// The outcome of a remote mutation.
///
/// Long-running mutations resolve to a job token instead of an
/// immediate result; reconciliation is deferred until the job
/// finishes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MutationOutcome {
    /// The mutation completed, yielding the (possibly renamed)
    /// folder id.
    Done(FolderId),

    /// The mutation turned into a long-running server job.
    Job(JobToken),
}

/// The outcome of a remote folder deletion.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeleteOutcome {
    /// The new path of the deleted folder. `None` means permanently
    /// gone rather than trashed.
    pub new_path: Option<FolderId>,
}

/// The multi-section response of a flat listing round trip.
///
/// Hidden and sharing sections are derived client-side from the
/// visible ones.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FlatResponse {
    pub private: Vec<RemoteFolder>,
    pub public: Vec<RemoteFolder>,
    pub shared: Vec<RemoteFolder>,
}

/// The remote transport collaborator.
///
/// Mutation calls accept an optional push token, a correlation id
/// used by the server to deduplicate its own push notifications.
#[async_trait]
pub trait FolderTransport: Send + Sync {
    /// Fetch one folder by id.
    async fn get_folder(&self, id: &str) -> Result<RemoteFolder, TransportError>;

    /// List the children of the given folder, either all of them or
    /// the subscribed-only subset.
    async fn list_children(&self, parent: &str, all: bool)
        -> Result<Vec<RemoteFolder>, TransportError>;

    /// Fetch every flat section of the given module in one round
    /// trip.
    async fn list_flat(&self, module: FolderModule, all: bool)
        -> Result<FlatResponse, TransportError>;

    /// List the children of the given folder that fall inside a time
    /// range. Transports without server-side range filtering deliver
    /// the full child set.
    async fn list_ranged(
        &self,
        parent: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RemoteFolder>, TransportError> {
        let _ = (start, end);
        self.list_children(parent, true).await
    }

    /// Create a folder below the given parent, returning the new id.
    async fn create_folder(
        &self,
        parent: &str,
        draft: &FolderDraft,
        push_token: Option<&str>,
    ) -> Result<FolderId, TransportError>;

    /// Update a folder. The outcome may carry a different id
    /// (rename-induced id change) or a long-running job token.
    async fn update_folder(
        &self,
        id: &str,
        changes: &RemoteFolder,
        push_token: Option<&str>,
    ) -> Result<MutationOutcome, TransportError>;

    /// Delete a folder, reporting its new (trash) path if any.
    async fn delete_folder(
        &self,
        id: &str,
        push_token: Option<&str>,
    ) -> Result<DeleteOutcome, TransportError>;

    /// Restore the given folders from trash, reporting a per-id
    /// result.
    async fn restore_folders(
        &self,
        ids: &[FolderId],
    ) -> Result<Vec<(FolderId, Result<(), TransportError>)>, TransportError>;

    /// Clear the contents of a folder as a long-running job.
    async fn clear_folder(
        &self,
        id: &str,
        push_token: Option<&str>,
    ) -> Result<MutationOutcome, TransportError>;

    /// Start coalescing concurrently-issued calls into one round
    /// trip.
    fn pause(&self) {}

    /// Send the coalesced batch and fan results back out in request
    /// order.
    fn resume(&self) {}
}
