//! Module dedicated to the listing store.
//!
//! A [`Listing`] is a named, ordered set of child folder references
//! for a given scope key. The [`ListingStore`] owns every listing,
//! enforces id uniqueness within a listing and keeps the display
//! order in sync with the per-listing comparators.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use chrono::{DateTime, Utc};

use crate::folder::{FolderId, FolderModule};

use super::entity::EntityStore;

/// The flat section enumeration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FlatSection {
    Private,
    Public,
    Shared,
    Hidden,
    Sharing,
}

impl FlatSection {
    pub const ALL: [FlatSection; 5] = [
        Self::Private,
        Self::Public,
        Self::Shared,
        Self::Hidden,
        Self::Sharing,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
            Self::Shared => "shared",
            Self::Hidden => "hidden",
            Self::Sharing => "sharing",
        }
    }

    /// Sections ordered by case-insensitive title instead of the
    /// per-listing sort key.
    fn orders_by_title(&self) -> bool {
        matches!(self, Self::Shared | Self::Hidden)
    }
}

impl fmt::Display for FlatSection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The listing scope key.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ListingKey {
    /// Children of a folder, either all of them or the
    /// subscribed-only subset.
    Children { parent: FolderId, all: bool },

    /// One flat section of a module.
    Flat {
        module: FolderModule,
        section: FlatSection,
    },

    /// The computed children of a virtual folder.
    Virtual(FolderId),

    /// A time-ranged listing below a folder.
    Range {
        parent: FolderId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl ListingKey {
    pub fn children(parent: impl ToString, all: bool) -> Self {
        Self::Children {
            parent: parent.to_string(),
            all,
        }
    }

    pub fn flat(module: FolderModule, section: FlatSection) -> Self {
        Self::Flat { module, section }
    }

    pub fn r#virtual(id: impl ToString) -> Self {
        Self::Virtual(id.to_string())
    }

    pub fn range(parent: impl ToString, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Range {
            parent: parent.to_string(),
            start,
            end,
        }
    }
}

impl fmt::Display for ListingKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Children { parent, all: true } => write!(f, "children of {parent} (all)"),
            Self::Children { parent, all: false } => {
                write!(f, "children of {parent} (subscribed)")
            }
            Self::Flat { module, section } => write!(f, "flat {module} {section}"),
            Self::Virtual(id) => write!(f, "virtual {id}"),
            Self::Range { parent, start, end } => {
                write!(f, "range {start}..{end} below {parent}")
            }
        }
    }
}

/// The named ordered sequence of folder references.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Listing {
    pub key: ListingKey,

    /// Whether the listing has ever been populated.
    pub fetched: bool,

    /// Whether the listing must be re-validated before being
    /// trusted.
    pub expired: bool,

    ids: Vec<FolderId>,
}

impl Listing {
    fn new(key: ListingKey) -> Self {
        Self {
            key,
            fetched: false,
            expired: false,
            ids: Vec::default(),
        }
    }

    /// Return `true` if the listing can be served from cache.
    pub fn is_valid(&self) -> bool {
        self.fetched && !self.expired
    }

    pub fn ids(&self) -> &[FolderId] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The differential outcome of a listing set.
///
/// Downstream UI diffing relies on the distinction between a full
/// reset and a differential set, so the mode is explicit, never
/// inferred.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ListingDelta {
    /// Whether the set was a full reset rather than a diff.
    pub reset: bool,
    pub added: Vec<FolderId>,
    pub removed: Vec<FolderId>,
    pub reordered: bool,
}

/// The store holding every listing, keyed by scope.
#[derive(Debug, Default)]
pub struct ListingStore {
    listings: HashMap<ListingKey, Listing>,
}

impl ListingStore {
    /// Return the listing for the given key, lazily creating it.
    pub fn get_or_create(&mut self, key: &ListingKey) -> &mut Listing {
        self.listings
            .entry(key.clone())
            .or_insert_with(|| Listing::new(key.clone()))
    }

    pub fn get(&self, key: &ListingKey) -> Option<&Listing> {
        self.listings.get(key)
    }

    /// Set the items of a listing.
    ///
    /// A listing that was never fetched (or an explicit
    /// `replace_all`) is fully reset; a previously fetched listing
    /// receives a differential set. Duplicate ids keep their first
    /// occurrence.
    pub fn set(
        &mut self,
        key: &ListingKey,
        ids: Vec<FolderId>,
        replace_all: bool,
    ) -> ListingDelta {
        let mut unique = Vec::with_capacity(ids.len());
        let mut seen = HashSet::new();
        for id in ids {
            if seen.insert(id.clone()) {
                unique.push(id);
            }
        }

        let listing = self.get_or_create(key);
        let mut delta = ListingDelta::default();

        if replace_all || !listing.fetched {
            delta.reset = true;
            delta.added = unique.clone();
        } else {
            let prev: HashSet<_> = listing.ids.iter().cloned().collect();
            let next: HashSet<_> = unique.iter().cloned().collect();
            delta.added = unique.iter().filter(|id| !prev.contains(*id)).cloned().collect();
            delta.removed = listing.ids.iter().filter(|id| !next.contains(*id)).cloned().collect();
            delta.reordered = listing.ids != unique;
        }

        listing.ids = unique;
        listing.fetched = true;
        listing.expired = false;

        delta
    }

    /// Insert one id into a listing at the given position, clamped
    /// to the listing length. No-op if already present.
    pub fn insert(&mut self, key: &ListingKey, id: FolderId, position: usize) {
        let listing = self.get_or_create(key);
        if !listing.contains(&id) {
            let position = position.min(listing.ids.len());
            listing.ids.insert(position, id);
        }
    }

    /// Mark every listing as expired. Used before a full refresh
    /// sweep.
    pub fn mark_all_expired(&mut self) {
        for listing in self.listings.values_mut() {
            if listing.fetched {
                listing.expired = true;
            }
        }
    }

    /// Clear the fetched flag of exactly one listing, forcing a
    /// re-fetch on next access.
    pub fn invalidate(&mut self, key: &ListingKey) {
        if let Some(listing) = self.listings.get_mut(key) {
            listing.fetched = false;
            listing.expired = false;
            listing.ids.clear();
        }
    }

    /// Remove one listing.
    pub fn remove(&mut self, key: &ListingKey) -> Option<Listing> {
        self.listings.remove(key)
    }

    /// Remove every listing rooted at the given folder, children
    /// first (post-order), and return the ids of every descendant
    /// folder encountered so their entity records can be dropped
    /// afterwards.
    pub fn remove_subtree(&mut self, root: &str) -> Vec<FolderId> {
        let mut gone = Vec::default();
        let mut seen = HashSet::new();
        self.remove_subtree_inner(root, &mut gone, &mut seen);
        gone
    }

    fn remove_subtree_inner(
        &mut self,
        root: &str,
        gone: &mut Vec<FolderId>,
        seen: &mut HashSet<FolderId>,
    ) {
        if !seen.insert(root.to_owned()) {
            return;
        }

        for all in [true, false] {
            let key = ListingKey::children(root, all);
            if let Some(listing) = self.listings.remove(&key) {
                for id in listing.ids {
                    self.remove_subtree_inner(&id, gone, seen);
                    if !gone.contains(&id) {
                        gone.push(id);
                    }
                }
            }
        }

        self.listings.remove(&ListingKey::r#virtual(root));
    }

    /// Remove the given id from every listing containing it,
    /// returning the affected keys with the position the id held.
    pub fn strip(&mut self, id: &str) -> Vec<(ListingKey, usize)> {
        let mut memberships = Vec::default();
        for (key, listing) in self.listings.iter_mut() {
            if let Some(position) = listing.ids.iter().position(|i| i == id) {
                listing.ids.remove(position);
                memberships.push((key.clone(), position));
            }
        }
        memberships
    }

    /// Return the keys of every listing containing the given id.
    pub fn keys_containing(&self, id: &str) -> Vec<ListingKey> {
        self.listings
            .iter()
            .filter(|(_, listing)| listing.contains(id))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Return the keys of every children listing in the store.
    pub fn children_keys(&self) -> Vec<ListingKey> {
        self.listings
            .keys()
            .filter(|key| matches!(key, ListingKey::Children { .. }))
            .cloned()
            .collect()
    }

    /// Re-sort a listing with its comparator: the per-listing sort
    /// key by default, case-insensitive title for the shared and
    /// hidden flat sections. Must be called synchronously whenever
    /// items are added or removed.
    pub fn sort(&mut self, key: &ListingKey, entities: &EntityStore) {
        let by_title = matches!(
            key,
            ListingKey::Flat { section, .. } if section.orders_by_title()
        );

        if let Some(listing) = self.listings.get_mut(key) {
            if by_title {
                listing.ids.sort_by_cached_key(|id| {
                    entities
                        .get(id)
                        .map(|folder| folder.get_display_title().to_lowercase())
                        .unwrap_or_default()
                });
            } else {
                listing.ids.sort_by_cached_key(|id| {
                    let folder = entities.get(id);
                    let index = folder
                        .and_then(|folder| folder.sort_key(key))
                        .unwrap_or(u64::MAX);
                    let title = folder
                        .map(|folder| folder.get_display_title().to_lowercase())
                        .unwrap_or_default();
                    (index, title)
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ids: &[&str]) -> Vec<FolderId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn set_resets_unfetched_listing_test() {
        let mut store = ListingStore::default();
        let key = ListingKey::children("root", true);

        let delta = store.set(&key, ids(&["a", "b"]), false);

        assert!(delta.reset);
        assert_eq!(delta.added, ids(&["a", "b"]));
        assert!(store.get(&key).unwrap().is_valid());
    }

    #[test]
    fn set_diffs_fetched_listing_test() {
        let mut store = ListingStore::default();
        let key = ListingKey::children("root", true);

        store.set(&key, ids(&["a", "b"]), false);
        let delta = store.set(&key, ids(&["b", "c"]), false);

        assert!(!delta.reset);
        assert_eq!(delta.added, ids(&["c"]));
        assert_eq!(delta.removed, ids(&["a"]));
    }

    #[test]
    fn set_enforces_uniqueness_test() {
        let mut store = ListingStore::default();
        let key = ListingKey::children("root", true);

        store.set(&key, ids(&["a", "b", "a", "b", "a"]), false);

        assert_eq!(store.get(&key).unwrap().ids(), ids(&["a", "b"]).as_slice());
    }

    #[test]
    fn invalidate_clears_one_listing_test() {
        let mut store = ListingStore::default();
        let key_a = ListingKey::children("a", true);
        let key_b = ListingKey::children("b", true);

        store.set(&key_a, ids(&["x"]), false);
        store.set(&key_b, ids(&["y"]), false);
        store.invalidate(&key_a);

        assert!(!store.get(&key_a).unwrap().fetched);
        assert!(store.get(&key_b).unwrap().is_valid());
    }

    #[test]
    fn remove_subtree_is_post_order_test() {
        let mut store = ListingStore::default();

        store.set(&ListingKey::children("root", true), ids(&["a", "b"]), false);
        store.set(&ListingKey::children("a", true), ids(&["a1", "a2"]), false);
        store.set(&ListingKey::children("a1", true), ids(&["a11"]), false);

        let gone = store.remove_subtree("root");

        // children before their parents
        let pos = |id: &str| gone.iter().position(|i| i == id).unwrap();
        assert!(pos("a11") < pos("a1"));
        assert!(pos("a1") < pos("a"));
        assert!(gone.contains(&"b".to_string()));
        assert!(store.get(&ListingKey::children("a", true)).is_none());
    }

    #[test]
    fn strip_reports_memberships_test() {
        let mut store = ListingStore::default();
        let key_a = ListingKey::children("a", true);
        let key_b = ListingKey::r#virtual("v");

        store.set(&key_a, ids(&["x", "y"]), false);
        store.set(&key_b, ids(&["y"]), false);

        let mut memberships = store.strip("y");
        memberships.sort_by_key(|(key, _)| format!("{key}"));

        assert_eq!(memberships.len(), 2);
        assert!(!store.get(&key_a).unwrap().contains("y"));
        assert!(!store.get(&key_b).unwrap().contains("y"));
    }
}
