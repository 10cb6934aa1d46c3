//! Merged view state for one item collection.
//!
//! # Responsibility
//! - Hold the union of local and remote items keyed by id.
//! - Apply store snapshots per id instead of replacing the whole list.
//! - Produce the ordered list presented to callers.
//!
//! # Invariants
//! - One entry per id, so an id maps to exactly one location.
//! - A store snapshot only touches entries owned by that store.
//! - Entries with a mutation in flight are left alone by snapshots; the
//!   mutation result is applied when it settles.
//! - Order: pinned first, then unpinned, each by `timestamp DESC, id ASC`.

use crate::model::category::same_category;
use crate::model::item::{Item, ItemId, Location};
use crate::policy::tier::ItemCounts;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Sorts items into presentation order.
pub fn sort_items(items: &mut [Item]) {
    items.sort_by(compare_items);
}

fn compare_items(a: &Item, b: &Item) -> Ordering {
    b.pinned
        .cmp(&a.pinned)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
        .then_with(|| a.id.cmp(&b.id))
}

/// Merges two store listings into presentation order.
pub fn merge(local: Vec<Item>, remote: Vec<Item>) -> Vec<Item> {
    let mut view = ViewState::default();
    view.apply_snapshot(Location::Local, local);
    view.apply_snapshot(Location::Remote, remote);
    view.ordered()
}

/// Counters describing one snapshot application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub upserted: usize,
    pub removed: usize,
    /// Ids skipped because a mutation was in flight or the id is owned by
    /// the other store.
    pub skipped: usize,
}

/// Id-keyed union of both stores.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    entries: HashMap<ItemId, Item>,
    in_flight: HashSet<ItemId>,
}

impl ViewState {
    pub fn ordered(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.entries.values().cloned().collect();
        sort_items(&mut items);
        items
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn counts(&self) -> ItemCounts {
        ItemCounts {
            total: self.entries.len(),
            pinned: self.entries.values().filter(|item| item.pinned).count(),
        }
    }

    pub fn ids(&self) -> HashSet<ItemId> {
        self.entries.keys().cloned().collect()
    }

    /// Ids of items whose tag names the same category as `category`.
    pub fn ids_in_category(&self, category: &str) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self
            .entries
            .values()
            .filter(|item| {
                item.category
                    .as_deref()
                    .is_some_and(|tag| same_category(tag, category))
            })
            .map(|item| item.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn pinned_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self
            .entries
            .values()
            .filter(|item| item.pinned)
            .map(|item| item.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Inserts or replaces one item. Last applied wins.
    pub fn upsert(&mut self, item: Item) {
        self.entries.insert(item.id.clone(), item);
    }

    pub fn remove(&mut self, id: &str) -> Option<Item> {
        self.entries.remove(id)
    }

    pub fn mark_in_flight(&mut self, id: &str) {
        self.in_flight.insert(id.to_string());
    }

    pub fn clear_in_flight(&mut self, id: &str) {
        self.in_flight.remove(id);
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// Applies a full snapshot of one store.
    ///
    /// Entries of `location` missing from the snapshot are removed, present
    /// ones are upserted; entries of the other store are untouched.
    pub fn apply_snapshot(&mut self, location: Location, items: Vec<Item>) -> SnapshotStats {
        let mut stats = SnapshotStats::default();
        let incoming: HashSet<ItemId> = items.iter().map(|item| item.id.clone()).collect();

        let stale: Vec<ItemId> = self
            .entries
            .values()
            .filter(|item| item.location == location && !incoming.contains(&item.id))
            .map(|item| item.id.clone())
            .collect();
        for id in stale {
            if self.in_flight.contains(&id) {
                stats.skipped += 1;
                continue;
            }
            self.entries.remove(&id);
            stats.removed += 1;
        }

        for item in items {
            let owned_elsewhere = self
                .entries
                .get(&item.id)
                .is_some_and(|existing| existing.location != location);
            if owned_elsewhere || self.in_flight.contains(&item.id) {
                stats.skipped += 1;
                continue;
            }
            self.entries.insert(item.id.clone(), Item { location, ..item });
            stats.upserted += 1;
        }
        stats
    }
}
