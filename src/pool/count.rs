//! Module dedicated to the count aggregator.
//!
//! Recomputes and bubbles rollup counters from a child listing up
//! through the real parent chain and through registered
//! virtual-parent relationships. Exported as pure functions over the
//! two stores so the algorithm can be easily tested.

use tracing::trace;

use crate::{event::PoolEvent, folder::config::ExclusionPolicy};

use super::{
    entity::EntityStore,
    listing::{ListingKey, ListingStore},
};

/// Sum, over the parent's children listing, each child's
/// `subtotal + unread`, excluding children whose role belongs to the
/// exclusion policy. Returns the sum without writing it.
pub(crate) fn recompute_subtotal(
    entities: &EntityStore,
    listings: &ListingStore,
    policy: &ExclusionPolicy,
    parent: &str,
) -> u64 {
    let listing = listings
        .get(&ListingKey::children(parent, true))
        .or_else(|| listings.get(&ListingKey::children(parent, false)));

    sum_listing(entities, policy, listing.map(|l| l.ids()).unwrap_or_default())
}

pub(crate) fn sum_listing(entities: &EntityStore, policy: &ExclusionPolicy, ids: &[String]) -> u64 {
    ids.iter()
        .filter_map(|id| entities.get(id))
        .filter(|child| !policy.excludes(child.role.as_ref()))
        .map(|child| child.subtotal.saturating_add(child.unread))
        .sum()
}

/// React to a count change of one entity: bubble the delta to the
/// real parent chain and to every registered virtual parent whose
/// listing still contains the entity. Stale virtual-parent
/// back-references are pruned silently.
pub(crate) fn on_count_changed(
    entities: &mut EntityStore,
    listings: &ListingStore,
    policy: &ExclusionPolicy,
    id: &str,
    next: u64,
    prev: u64,
    events: &mut Vec<PoolEvent>,
) {
    if next == prev {
        return;
    }

    bubble_to_real_parent(entities, listings, policy, id, events);
    bubble_to_virtual_parents(entities, listings, policy, id, events);
}

/// Recompute the subtotal of one folder from its children listing,
/// write it and keep bubbling if it changed.
pub(crate) fn refresh_subtotal(
    entities: &mut EntityStore,
    listings: &ListingStore,
    policy: &ExclusionPolicy,
    id: &str,
    events: &mut Vec<PoolEvent>,
) {
    let subtotal = recompute_subtotal(entities, listings, policy, id);

    let prev = match entities.get_mut(id) {
        Some(folder) if folder.subtotal != subtotal => {
            let prev = folder.subtotal;
            folder.subtotal = subtotal;
            prev
        }
        _ => return,
    };

    events.push(PoolEvent::SubtotalChanged {
        id: id.to_owned(),
        subtotal,
    });
    on_count_changed(entities, listings, policy, id, subtotal, prev, events);
}

fn bubble_to_real_parent(
    entities: &mut EntityStore,
    listings: &ListingStore,
    policy: &ExclusionPolicy,
    id: &str,
    events: &mut Vec<PoolEvent>,
) {
    let parent_id = match entities.get(id).and_then(|folder| folder.parent_id.clone()) {
        Some(parent_id) => parent_id,
        None => return,
    };

    let skip = match entities.get(&parent_id) {
        Some(parent) => parent.is_system() || parent.is_unified(),
        None => true,
    };
    if skip {
        return;
    }

    let subtotal = recompute_subtotal(entities, listings, policy, &parent_id);
    let prev_subtotal = match entities.get_mut(&parent_id) {
        Some(parent) if parent.subtotal != subtotal => {
            let prev = parent.subtotal;
            parent.subtotal = subtotal;
            prev
        }
        _ => return,
    };

    events.push(PoolEvent::SubtotalChanged {
        id: parent_id.clone(),
        subtotal,
    });

    // the parent's own subtotal changed, keep bubbling up the chain
    on_count_changed(
        entities,
        listings,
        policy,
        &parent_id,
        subtotal,
        prev_subtotal,
        events,
    );
}

fn bubble_to_virtual_parents(
    entities: &mut EntityStore,
    listings: &ListingStore,
    policy: &ExclusionPolicy,
    id: &str,
    events: &mut Vec<PoolEvent>,
) {
    let virtual_parents: Vec<_> = match entities.get(id) {
        Some(folder) => folder.virtual_parents.iter().cloned().collect(),
        None => return,
    };

    for parent_id in virtual_parents {
        let still_member = listings
            .get(&ListingKey::r#virtual(&parent_id))
            .map(|listing| listing.contains(id))
            .unwrap_or_default();

        if !still_member || !entities.contains(&parent_id) {
            // self-healing: drop the stale back-reference
            trace!("pruning stale virtual parent {parent_id} of folder {id}");
            if let Some(folder) = entities.get_mut(id) {
                folder.virtual_parents.remove(&parent_id);
            }
            continue;
        }

        let listing = listings.get(&ListingKey::r#virtual(&parent_id));
        let subtotal = sum_listing(
            entities,
            policy,
            listing.map(|l| l.ids()).unwrap_or_default(),
        );

        if let Some(parent) = entities.get_mut(&parent_id) {
            if parent.subtotal != subtotal {
                parent.subtotal = subtotal;
                events.push(PoolEvent::SubtotalChanged {
                    id: parent_id.clone(),
                    subtotal,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RemoteFolder;

    fn stores() -> (EntityStore, ListingStore, ExclusionPolicy) {
        (
            EntityStore::default(),
            ListingStore::default(),
            ExclusionPolicy::default(),
        )
    }

    fn child(id: &str, parent: &str, unread: u64) -> RemoteFolder {
        RemoteFolder {
            parent_id: Some(parent.into()),
            unread: Some(unread),
            ..RemoteFolder::new(id)
        }
    }

    #[test]
    fn recompute_sums_children_test() {
        let (mut entities, mut listings, policy) = stores();

        entities.upsert(&RemoteFolder::new("p"));
        entities.upsert(&child("a", "p", 2));
        entities.upsert(&child("b", "p", 0));
        entities.get_mut("b").unwrap().subtotal = 3;
        listings.set(&ListingKey::children("p", true), vec!["a".into(), "b".into()], false);

        assert_eq!(recompute_subtotal(&entities, &listings, &policy, "p"), 5);
    }

    #[test]
    fn recompute_excludes_trash_test() {
        let (mut entities, mut listings, policy) = stores();

        entities.upsert(&RemoteFolder::new("p"));
        entities.upsert(&RemoteFolder {
            role: Some("trash".into()),
            ..child("t", "p", 10)
        });
        entities.upsert(&child("a", "p", 1));
        listings.set(&ListingKey::children("p", true), vec!["t".into(), "a".into()], false);

        assert_eq!(recompute_subtotal(&entities, &listings, &policy, "p"), 1);
    }

    #[test]
    fn bubble_updates_ancestor_chain_test() {
        let (mut entities, mut listings, policy) = stores();

        entities.upsert(&RemoteFolder::new("root"));
        entities.upsert(&child("p", "root", 0));
        entities.upsert(&child("a", "p", 2));
        listings.set(&ListingKey::children("root", true), vec!["p".into()], false);
        listings.set(&ListingKey::children("p", true), vec!["a".into()], false);

        let mut events = Vec::default();
        entities.get_mut("a").unwrap().unread = 5;
        on_count_changed(&mut entities, &listings, &policy, "a", 5, 2, &mut events);

        assert_eq!(entities.get("p").unwrap().subtotal, 5);
        assert_eq!(entities.get("root").unwrap().subtotal, 5);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn bubble_skips_unified_parent_test() {
        let (mut entities, mut listings, policy) = stores();

        entities.upsert(&RemoteFolder {
            role: Some("unified".into()),
            ..RemoteFolder::new("unified")
        });
        entities.upsert(&child("a", "unified", 1));
        listings.set(&ListingKey::children("unified", true), vec!["a".into()], false);

        let mut events = Vec::default();
        entities.get_mut("a").unwrap().unread = 4;
        on_count_changed(&mut entities, &listings, &policy, "a", 4, 1, &mut events);

        assert_eq!(entities.get("unified").unwrap().subtotal, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn bubble_prunes_stale_virtual_parent_test() {
        let (mut entities, mut listings, policy) = stores();

        entities.upsert(&RemoteFolder::new("v"));
        entities.upsert(&child("a", "p", 1));
        entities
            .get_mut("a")
            .unwrap()
            .virtual_parents
            .insert("v".into());
        // the virtual listing no longer contains "a"
        listings.set(&ListingKey::r#virtual("v"), vec!["other".into()], false);

        let mut events = Vec::default();
        entities.get_mut("a").unwrap().unread = 2;
        on_count_changed(&mut entities, &listings, &policy, "a", 2, 1, &mut events);

        assert!(entities.get("a").unwrap().virtual_parents.is_empty());
    }

    #[test]
    fn virtual_round_trip_leaves_subtotal_unchanged_test() {
        let (mut entities, mut listings, policy) = stores();

        entities.upsert(&RemoteFolder::new("v"));
        entities.upsert(&child("a", "p", 2));
        entities
            .get_mut("a")
            .unwrap()
            .virtual_parents
            .insert("v".into());
        listings.set(&ListingKey::r#virtual("v"), vec!["a".into()], false);

        let mut events = Vec::default();
        entities.get_mut("a").unwrap().unread = 7;
        on_count_changed(&mut entities, &listings, &policy, "a", 7, 2, &mut events);
        let after_up = entities.get("v").unwrap().subtotal;

        entities.get_mut("a").unwrap().unread = 2;
        on_count_changed(&mut entities, &listings, &policy, "a", 2, 7, &mut events);
        let after_down = entities.get("v").unwrap().subtotal;

        assert_eq!(after_up, 7);
        assert_eq!(after_down, 2);
    }
}
