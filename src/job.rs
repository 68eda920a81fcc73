//! # Job module
//!
//! Module dedicated to the long-running-job collaborator. Remote
//! mutations that outlive their HTTP request resolve to a
//! [`JobToken`]; the pool defers reconciliation until the job
//! finishes instead of treating the initial response as terminal.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{folder::FolderId, transport::TransportError};

/// The identifier of a long-running server job.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct JobToken(pub String);

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The long-running-job collaborator.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Resolve when the given job finishes, yielding the id of the
    /// folder the job produced or acted on.
    async fn wait(&self, token: &JobToken) -> Result<FolderId, TransportError>;
}
