//! Module dedicated to the entity store.
//!
//! The [`EntityStore`] holds one canonical [`Folder`] record per id.
//! Records are created lazily as stubs on first reference and merged
//! with patch semantics on every upsert: only supplied fields
//! change. Every upsert reports the list of field changes so the
//! pool can turn them into events and aggregation triggers.

use std::collections::HashMap;

use crate::{
    folder::{Folder, FolderId, FolderKind, FolderRole, Rights},
    transport::RemoteFolder,
};

/// A single field change reported by an upsert.
///
/// Count-bearing changes carry their previous value so the count
/// aggregator can compute the bubbling delta.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FolderChange {
    Added,
    Title,
    ParentId,
    Unread { prev: u64, next: u64 },
    Total { prev: i64, next: i64 },
    Subscribed,
    Permissions,
    Rights,
    Capabilities,
    HasSubfolders,
    Role,
    StandardFolder,
}

/// The store holding one canonical folder record per id.
#[derive(Debug, Default)]
pub struct EntityStore {
    folders: HashMap<FolderId, Folder>,
}

impl EntityStore {
    /// Return the record for the given id, creating a minimal stub
    /// if absent. Never fails.
    pub fn get_or_create_stub(&mut self, id: &str) -> &mut Folder {
        self.folders
            .entry(id.to_owned())
            .or_insert_with(|| Folder::stub(id))
    }

    pub fn get(&self, id: &str) -> Option<&Folder> {
        self.folders.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Folder> {
        self.folders.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.folders.contains_key(id)
    }

    /// Merge a wire record into the store with patch semantics,
    /// reporting every field that changed. The first insert reports
    /// [`FolderChange::Added`].
    pub fn upsert(&mut self, remote: &RemoteFolder) -> Vec<FolderChange> {
        let mut changes = Vec::default();

        let added = !self.folders.contains_key(&remote.id);
        let folder = self.get_or_create_stub(&remote.id);
        if added {
            changes.push(FolderChange::Added);
        }

        if let Some(module) = remote.module {
            if folder.kind.module() != module {
                folder.kind = FolderKind::from_module(module);
            }
        }

        match &mut folder.kind {
            FolderKind::Mail(mail) => {
                if let Some(unified) = remote.unified {
                    mail.unified = unified;
                }
            }
            FolderKind::Calendar(calendar) => {
                if remote.resource_id.is_some() {
                    calendar.resource_id = remote.resource_id.clone();
                }
                if remote.color.is_some() {
                    calendar.color = remote.color.clone();
                }
            }
            _ => (),
        }

        if let Some(parent_id) = &remote.parent_id {
            if folder.parent_id.as_ref() != Some(parent_id) {
                folder.parent_id = Some(parent_id.clone());
                changes.push(FolderChange::ParentId);
            }
        }

        if let Some(title) = &remote.title {
            if &folder.title != title {
                folder.title = title.clone();
                changes.push(FolderChange::Title);
            }
        }

        if remote.display_title.is_some() && folder.display_title != remote.display_title {
            folder.display_title = remote.display_title.clone();
            changes.push(FolderChange::Title);
        }

        if let Some(rights) = remote.own_rights {
            if folder.own_rights != Rights(rights) {
                folder.own_rights = Rights(rights);
                changes.push(FolderChange::Rights);
            }
        }

        if let Some(capabilities) = &remote.supported_capabilities {
            let capabilities = capabilities.iter().cloned().collect();
            if folder.supported_capabilities != capabilities {
                folder.supported_capabilities = capabilities;
                changes.push(FolderChange::Capabilities);
            }
        }

        if let Some(permissions) = &remote.permissions {
            if &folder.permissions != permissions {
                folder.permissions = permissions.clone();
                changes.push(FolderChange::Permissions);
            }
        }

        if let Some(subscribed) = remote.subscribed {
            if folder.subscribed != subscribed {
                folder.subscribed = subscribed;
                changes.push(FolderChange::Subscribed);
            }
        }

        if let Some(has_subfolders) = remote.has_subfolders {
            if folder.has_subfolders != has_subfolders {
                folder.has_subfolders = has_subfolders;
                changes.push(FolderChange::HasSubfolders);
            }
        }

        if let Some(total) = remote.total {
            if folder.total != total {
                changes.push(FolderChange::Total {
                    prev: folder.total,
                    next: total,
                });
                folder.total = total;
            }
        }

        if let Some(unread) = remote.unread {
            if folder.unread != unread {
                changes.push(FolderChange::Unread {
                    prev: folder.unread,
                    next: unread,
                });
                folder.unread = unread;
            }
        }

        if let Some(standard) = remote.standard_folder {
            if folder.standard_folder != standard {
                folder.standard_folder = standard;
                changes.push(FolderChange::StandardFolder);
            }
        }

        if let Some(role) = &remote.role {
            let role = FolderRole::from(role);
            if folder.role.as_ref() != Some(&role) {
                folder.role = Some(role);
                changes.push(FolderChange::Role);
            }
        }

        folder.stub = false;

        changes
    }

    /// Delete a record, returning its last known snapshot.
    pub fn remove(&mut self, id: &str) -> Option<Folder> {
        self.folders.remove(id)
    }

    /// Rewrite the key of a record after a rename-induced id change,
    /// trusting the server's id.
    pub fn rename(&mut self, old_id: &str, new_id: &str) -> bool {
        match self.folders.remove(old_id) {
            Some(mut folder) => {
                folder.id = new_id.to_owned();
                self.folders.insert(new_id.to_owned(), folder);
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &FolderId> {
        self.folders.keys()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::FolderModule;

    #[test]
    fn upsert_reports_added_test() {
        let mut store = EntityStore::default();
        let remote = RemoteFolder {
            title: Some("Inbox".into()),
            unread: Some(3),
            ..RemoteFolder::new("default0/INBOX")
        };

        let changes = store.upsert(&remote);

        assert!(changes.contains(&FolderChange::Added));
        assert!(changes.contains(&FolderChange::Title));
        assert!(changes.contains(&FolderChange::Unread { prev: 0, next: 3 }));
        assert!(!store.get("default0/INBOX").unwrap().is_stub());
    }

    #[test]
    fn upsert_patch_semantics_test() {
        let mut store = EntityStore::default();
        store.upsert(&RemoteFolder {
            title: Some("Inbox".into()),
            unread: Some(3),
            ..RemoteFolder::new("1")
        });

        // a patch without counters must not reset them
        let changes = store.upsert(&RemoteFolder {
            subscribed: Some(true),
            ..RemoteFolder::new("1")
        });

        assert_eq!(changes, vec![FolderChange::Subscribed]);
        assert_eq!(store.get("1").unwrap().unread, 3);
        assert_eq!(store.get("1").unwrap().title, "Inbox");
    }

    #[test]
    fn upsert_builds_module_kind_test() {
        let mut store = EntityStore::default();
        store.upsert(&RemoteFolder {
            module: Some(FolderModule::Calendar),
            resource_id: Some("room-42".into()),
            ..RemoteFolder::new("cal1")
        });

        let folder = store.get("cal1").unwrap();
        assert_eq!(folder.module(), FolderModule::Calendar);
        match &folder.kind {
            FolderKind::Calendar(calendar) => {
                assert_eq!(calendar.resource_id.as_deref(), Some("room-42"))
            }
            kind => panic!("unexpected kind {kind:?}"),
        }
    }

    #[test]
    fn rename_rewrites_key_test() {
        let mut store = EntityStore::default();
        store.upsert(&RemoteFolder::new("old"));

        assert!(store.rename("old", "new"));
        assert!(store.get("old").is_none());
        assert_eq!(store.get("new").unwrap().id, "new");
    }

    #[test]
    fn stub_never_fails_test() {
        let mut store = EntityStore::default();
        let folder = store.get_or_create_stub("anything");
        assert!(folder.is_stub());
        assert_eq!(folder.total, -1);
    }
}
