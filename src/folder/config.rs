//! Module dedicated to the pool configuration.
//!
//! The core structure of the module is [`PoolConfig`], consumed once
//! by the [`PoolBuilder`](crate::pool::PoolBuilder). The aggregation
//! [`ExclusionPolicy`] lives here as well, as a single explicit
//! configuration rather than scattered role checks.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{FolderId, FolderModule, FolderRole};

/// Roles excluded from subtotal sums by default, to avoid counting
/// trashed, junk or already-aggregated items twice.
static DEFAULT_EXCLUDED_ROLES: Lazy<HashSet<FolderRole>> = Lazy::new(|| {
    HashSet::from_iter([
        FolderRole::Trash,
        FolderRole::Spam,
        FolderRole::ConfirmedSpam,
        FolderRole::UnreadAggregate,
    ])
});

/// The aggregation exclusion policy.
///
/// Children whose role belongs to the excluded set do not
/// participate in their parent's subtotal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExclusionPolicy {
    pub roles: HashSet<FolderRole>,
}

impl ExclusionPolicy {
    /// Return `true` if a child with the given role is excluded from
    /// subtotal sums.
    pub fn excludes(&self, role: Option<&FolderRole>) -> bool {
        role.map(|role| self.roles.contains(role)).unwrap_or_default()
    }
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            roles: DEFAULT_EXCLUDED_ROLES.clone(),
        }
    }
}

/// The server-synced user settings read by the pool.
///
/// The pool never writes these: they are owned by a settings
/// collaborator and consumed read-only.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Ids of flat folders the user chose to hide.
    pub hidden_folder_ids: HashSet<FolderId>,

    /// Custom per-module folder ordering, injected ahead of the
    /// server order when listing.
    pub custom_order: HashMap<FolderModule, Vec<FolderId>>,
}

/// The pool configuration.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// The aggregation exclusion policy.
    pub exclusion: ExclusionPolicy,

    /// Ids whose listing is delegated to the flat fetch path, mapped
    /// to their module.
    pub flat_roots: HashMap<FolderId, FolderModule>,

    /// Ids filtered out of remote listing responses.
    pub blocklist: HashSet<FolderId>,

    /// The quiet period of the debounced folder reload.
    pub reload_window: Duration,

    /// The correlation id attached to mutation calls for server-push
    /// deduplication.
    pub push_token: Option<String>,

    /// The server-synced user settings.
    pub settings: UserSettings,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            exclusion: ExclusionPolicy::default(),
            flat_roots: HashMap::default(),
            blocklist: HashSet::default(),
            reload_window: Duration::from_secs(2),
            push_token: None,
            settings: UserSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_exclusion_test() {
        let policy = ExclusionPolicy::default();
        assert!(policy.excludes(Some(&FolderRole::Trash)));
        assert!(policy.excludes(Some(&FolderRole::Spam)));
        assert!(policy.excludes(Some(&FolderRole::ConfirmedSpam)));
        assert!(policy.excludes(Some(&FolderRole::UnreadAggregate)));
        assert!(!policy.excludes(Some(&FolderRole::Inbox)));
        assert!(!policy.excludes(None));
    }
}
