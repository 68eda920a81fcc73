//! Module dedicated to flat listings.
//!
//! Contacts, calendar and tasks folders are organized into flat
//! sections (private/public/shared/hidden/sharing) rather than a
//! tree. Every section is fetched in one remote round trip; the
//! hidden and sharing sections are derived client-side. Sections are
//! written to the cache **only** for unfiltered fetches, so a
//! partial result can never poison the full cached listing.

use std::collections::HashSet;

use crate::{
    event::PoolEvent,
    folder::{Folder, FolderId, FolderModule},
    transport::RemoteFolder,
};

use super::{
    fetch::collect_listing,
    listing::{FlatSection, ListingKey},
    Error, Pool, Result,
};

/// Options of a flat fetch.
#[derive(Clone, Copy, Debug)]
pub struct FlatOptions {
    /// Fetch every folder instead of a server-filtered subset. Only
    /// unfiltered results are cached.
    pub all: bool,

    /// Serve still-valid cached sections without a round trip.
    pub cache: bool,
}

impl Default for FlatOptions {
    fn default() -> Self {
        Self {
            all: true,
            cache: true,
        }
    }
}

/// The five flat sections of a module, in display order.
#[derive(Clone, Debug, Default)]
pub struct FlatSections {
    pub private: Vec<Folder>,
    pub public: Vec<Folder>,
    pub shared: Vec<Folder>,
    pub hidden: Vec<Folder>,
    pub sharing: Vec<Folder>,
}

impl FlatSections {
    fn section_mut(&mut self, section: FlatSection) -> &mut Vec<Folder> {
        match section {
            FlatSection::Private => &mut self.private,
            FlatSection::Public => &mut self.public,
            FlatSection::Shared => &mut self.shared,
            FlatSection::Hidden => &mut self.hidden,
            FlatSection::Sharing => &mut self.sharing,
        }
    }
}

impl Pool {
    /// Fetch every flat section of a module in one round trip.
    pub async fn flat(&self, module: FolderModule, opts: FlatOptions) -> Result<FlatSections> {
        if opts.cache {
            let state = self.lock_state().await;
            let all_valid = FlatSection::ALL.iter().all(|section| {
                state
                    .listings
                    .get(&ListingKey::flat(module, *section))
                    .map(|listing| listing.is_valid())
                    .unwrap_or_default()
            });
            if all_valid {
                let mut sections = FlatSections::default();
                for section in FlatSection::ALL {
                    *sections.section_mut(section) =
                        collect_listing(&state, &ListingKey::flat(module, section));
                }
                return Ok(sections);
            }
        }

        self.emit(PoolEvent::BeforeFlat(module)).await;

        let response = match self.transport().list_flat(module, opts.all).await {
            Ok(response) => response,
            Err(err) => {
                self.broadcast_failure(&err).await;
                return Err(Error::ListFlatFoldersError(err, module));
            }
        };

        let mut events = Vec::default();
        let sections = {
            let mut guard = self.lock_state().await;
            let state = &mut *guard;
            let hidden_ids = &self.config().settings.hidden_folder_ids;

            // split the hidden folders out of every visible section
            let mut hidden: Vec<RemoteFolder> = Vec::default();
            let mut visible: Vec<(FlatSection, Vec<RemoteFolder>)> = Vec::default();
            for (section, remotes) in [
                (FlatSection::Private, response.private),
                (FlatSection::Public, response.public),
                (FlatSection::Shared, response.shared),
            ] {
                let mut kept = Vec::with_capacity(remotes.len());
                for remote in remotes {
                    if hidden_ids.contains(&remote.id) {
                        hidden.push(remote);
                    } else {
                        kept.push(remote);
                    }
                }
                visible.push((section, kept));
            }
            visible.push((FlatSection::Hidden, hidden));

            let mut sections = FlatSections::default();
            let mut sharing_ids: Vec<FolderId> = Vec::default();

            for (section, remotes) in visible {
                let key = ListingKey::flat(module, section);
                let mut ids = Vec::with_capacity(remotes.len());

                for (index, remote) in remotes.into_iter().enumerate() {
                    if state.pending_deletions.contains(&remote.id) {
                        continue;
                    }
                    // a duplicated id keeps its first position
                    if ids.contains(&remote.id) {
                        continue;
                    }
                    let mut remote = remote;
                    remote.module.get_or_insert(module);
                    state.apply_remote(self.config(), &remote, &mut events);
                    let folder = state.entities.get_or_create_stub(&remote.id);
                    folder.sort_keys.insert(key.clone(), index as u64);
                    ids.push(remote.id.clone());

                    // the sharing pseudo-section duplicates the
                    // folders shared by the current user
                    if section == FlatSection::Private && folder.is_shared_by_me() {
                        sharing_ids.push(remote.id.clone());
                    }
                }

                if opts.all {
                    let prev_hidden: HashSet<FolderId> = if section == FlatSection::Hidden {
                        state
                            .listings
                            .get(&key)
                            .map(|listing| listing.ids().iter().cloned().collect())
                            .unwrap_or_default()
                    } else {
                        HashSet::default()
                    };

                    state.listings.set(&key, ids.clone(), true);
                    state.listings.sort(&key, &state.entities);

                    if section == FlatSection::Hidden {
                        let next: HashSet<FolderId> = ids.iter().cloned().collect();
                        for id in next.difference(&prev_hidden) {
                            events.push(PoolEvent::Hidden(id.clone()));
                        }
                        for id in prev_hidden.difference(&next) {
                            events.push(PoolEvent::Shown(id.clone()));
                        }
                    }

                    *sections.section_mut(section) = collect_listing(state, &key);
                } else {
                    // filtered results never touch the cached
                    // listings
                    *sections.section_mut(section) = ids
                        .iter()
                        .filter_map(|id| state.entities.get(id))
                        .cloned()
                        .collect();
                }
            }

            let sharing_key = ListingKey::flat(module, FlatSection::Sharing);
            if opts.all {
                state.listings.set(&sharing_key, sharing_ids, true);
                state.listings.sort(&sharing_key, &state.entities);
                sections.sharing = collect_listing(state, &sharing_key);
                events.push(PoolEvent::FlatCached(module));
            } else {
                sections.sharing = sharing_ids
                    .iter()
                    .filter_map(|id| state.entities.get(id))
                    .cloned()
                    .collect();
            }

            sections
        };
        self.emit_all(events).await;
        self.emit(PoolEvent::AfterFlat(module)).await;

        Ok(sections)
    }
}
