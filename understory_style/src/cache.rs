// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Computed-value caches.
//!
//! The shared level is owned by the style manager and keyed by the sequence of
//! style-map ids from a node up to the root, so nodes with structurally
//! identical styling share computed values. Nodes hold generational handles
//! into it and must check liveness on every access; eviction bumps the
//! generation and leaves handles dangling rather than dangerous.
//!
//! The local level lives in each node's cache container and overlays a shared
//! entry with node-specific values and the apply-failure latch.

use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::pseudo::PseudoClassSet;
use crate::style_map::StyleMapId;
use crate::value::{CalculatedValue, FontKey};

/// Style-map ids from a node (first) up to the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StyleCacheKey(SmallVec<[StyleMapId; 8]>);

impl StyleCacheKey {
    /// Creates a key from node-first ids.
    pub fn new(ids: impl IntoIterator<Item = StyleMapId>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// The ids, node first.
    pub fn ids(&self) -> &[StyleMapId] {
        &self.0
    }

    /// Returns `true` if `parent` is this key without its first element.
    pub fn extends(&self, parent: &Self) -> bool {
        self.0.len() == parent.0.len() + 1 && self.0[1..] == parent.0[..]
    }
}

/// Filtered pseudo-class states from a node (first) up to the root.
pub type TransitionStates = SmallVec<[PseudoClassSet; 4]>;

/// Key of a cache entry: transition states plus the font used for relative
/// sizes. The font-size cache uses the same type with no font.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateKey {
    states: TransitionStates,
    font: Option<FontKey>,
}

impl StateKey {
    /// Creates a key.
    pub fn new(states: TransitionStates, font: Option<FontKey>) -> Self {
        Self { states, font }
    }

    /// The transition states, node first.
    pub fn states(&self) -> &[PseudoClassSet] {
        &self.states
    }
}

/// Resolved values for one state.
///
/// Only applicable values are stored; a property with no entry resolved to
/// nothing.
#[derive(Clone, Debug, Default)]
pub struct StyleCacheEntry {
    values: HashMap<&'static str, CalculatedValue>,
}

impl StyleCacheEntry {
    /// The cached value for `property`.
    pub fn get(&self, property: &str) -> Option<&CalculatedValue> {
        self.values.get(property)
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Handle to a shared cache. Only valid while its generation matches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SharedCacheHandle {
    slot: u32,
    generation: u32,
}

/// Identity of an entry in a shared cache.
///
/// Two nodes whose handles compare equal read and write the same entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SharedEntryId {
    cache: SharedCacheHandle,
    index: u32,
}

impl SharedEntryId {
    /// The cache this entry belongs to.
    pub fn cache(&self) -> SharedCacheHandle {
        self.cache
    }
}

#[derive(Debug, Default)]
struct SharedStyleCache {
    entries: Vec<StyleCacheEntry>,
    by_state: HashMap<StateKey, u32>,
}

#[derive(Debug, Default)]
struct SharedSlot {
    generation: u32,
    cache: Option<SharedStyleCache>,
}

/// All shared caches of a scene.
#[derive(Debug, Default)]
pub struct SharedCacheStore {
    slots: Vec<SharedSlot>,
    by_key: HashMap<StyleCacheKey, SharedCacheHandle>,
    free: Vec<u32>,
}

impl SharedCacheStore {
    /// Returns the cache for `key`, creating it if needed.
    pub fn handle_for(&mut self, key: &StyleCacheKey) -> SharedCacheHandle {
        if let Some(h) = self.by_key.get(key).copied()
            && self.is_live(h)
        {
            return h;
        }
        let slot = if let Some(slot) = self.free.pop() {
            slot
        } else {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "cache counts stay far below u32::MAX."
            )]
            let slot = self.slots.len() as u32;
            self.slots.push(SharedSlot::default());
            slot
        };
        let s = &mut self.slots[slot as usize];
        s.cache = Some(SharedStyleCache::default());
        let handle = SharedCacheHandle {
            slot,
            generation: s.generation,
        };
        self.by_key.insert(key.clone(), handle);
        handle
    }

    fn cache(&self, h: SharedCacheHandle) -> Option<&SharedStyleCache> {
        let slot = self.slots.get(h.slot as usize)?;
        if slot.generation != h.generation {
            return None;
        }
        slot.cache.as_ref()
    }

    fn cache_mut(&mut self, h: SharedCacheHandle) -> Option<&mut SharedStyleCache> {
        let slot = self.slots.get_mut(h.slot as usize)?;
        if slot.generation != h.generation {
            return None;
        }
        slot.cache.as_mut()
    }

    /// Returns `true` if the cache behind `h` still exists.
    pub fn is_live(&self, h: SharedCacheHandle) -> bool {
        self.cache(h).is_some()
    }

    /// Returns the entry for `state`, creating it if needed.
    ///
    /// Returns `None` if the cache has been evicted.
    pub fn entry_for(&mut self, h: SharedCacheHandle, state: &StateKey) -> Option<SharedEntryId> {
        let cache = self.cache_mut(h)?;
        let index = match cache.by_state.get(state) {
            Some(index) => *index,
            None => {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "entry counts stay far below u32::MAX."
                )]
                let index = cache.entries.len() as u32;
                cache.entries.push(StyleCacheEntry::default());
                cache.by_state.insert(state.clone(), index);
                index
            }
        };
        Some(SharedEntryId { cache: h, index })
    }

    /// Reads an entry.
    pub fn entry(&self, id: SharedEntryId) -> Option<&StyleCacheEntry> {
        self.cache(id.cache)?.entries.get(id.index as usize)
    }

    fn entry_mut(&mut self, id: SharedEntryId) -> Option<&mut StyleCacheEntry> {
        self.cache_mut(id.cache)?.entries.get_mut(id.index as usize)
    }

    /// Drops every shared cache. Outstanding handles go stale.
    pub fn evict_all(&mut self) {
        self.by_key.clear();
        self.free.clear();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.cache.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            #[allow(
                clippy::cast_possible_truncation,
                reason = "slot counts stay far below u32::MAX."
            )]
            let i = i as u32;
            self.free.push(i);
        }
    }

    /// Drops the cache for one key.
    pub fn evict(&mut self, key: &StyleCacheKey) {
        let Some(h) = self.by_key.remove(key) else {
            return;
        };
        if let Some(slot) = self.slots.get_mut(h.slot as usize)
            && slot.generation == h.generation
        {
            slot.cache = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(h.slot);
        }
    }

    /// Number of live shared caches.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.cache.is_some()).count()
    }

    /// Returns `true` if no shared cache is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A node's view of one state: local overrides layered on a shared entry.
#[derive(Clone, Debug)]
pub struct LocalEntry {
    shared: SharedEntryId,
    overrides: HashMap<&'static str, CalculatedValue>,
    failed: HashSet<&'static str>,
}

/// What the cache knows about one property in one state.
#[derive(Clone, Debug, PartialEq)]
pub enum Cached<'a> {
    /// Not resolved yet in this state, or resolved to nothing.
    Missing,
    /// Applying a value failed earlier; leave the property alone.
    Failed,
    /// A resolved value.
    Value(&'a CalculatedValue),
}

impl LocalEntry {
    /// Creates a local entry over `shared`.
    pub fn new(shared: SharedEntryId) -> Self {
        Self {
            shared,
            overrides: HashMap::new(),
            failed: HashSet::new(),
        }
    }

    /// The shared entry underneath.
    pub fn shared(&self) -> SharedEntryId {
        self.shared
    }

    /// Reads `property`, local values first.
    pub fn get<'a>(&'a self, store: &'a SharedCacheStore, property: &str) -> Cached<'a> {
        if self.failed.contains(property) {
            return Cached::Failed;
        }
        if let Some(v) = self.overrides.get(property) {
            return Cached::Value(v);
        }
        match store.entry(self.shared).and_then(|e| e.get(property)) {
            Some(v) => Cached::Value(v),
            None => Cached::Missing,
        }
    }

    /// Stores a resolved value, locally or in the shared entry.
    pub fn put(
        &mut self,
        store: &mut SharedCacheStore,
        property: &'static str,
        value: CalculatedValue,
        local_only: bool,
    ) {
        if local_only {
            self.overrides.insert(property, value);
        } else if let Some(entry) = store.entry_mut(self.shared) {
            entry.values.insert(property, value);
        } else {
            self.overrides.insert(property, value);
        }
    }

    /// Latches a failed application so later passes skip the property.
    pub fn mark_failed(&mut self, property: &'static str) {
        self.failed.insert(property);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::StyleOrigin;
    use crate::value::StyleValue;

    fn key(ids: &[u32]) -> StyleCacheKey {
        StyleCacheKey::new(ids.iter().map(|i| StyleMapId(*i)))
    }

    fn state() -> StateKey {
        StateKey::new(TransitionStates::new(), None)
    }

    #[test]
    fn same_key_shares_entries() {
        let mut store = SharedCacheStore::default();
        let a = store.handle_for(&key(&[2, 1]));
        let b = store.handle_for(&key(&[2, 1]));
        let c = store.handle_for(&key(&[3, 1]));
        assert_eq!(a, b, "same ids share a cache");
        assert_ne!(a, c, "different ids do not");
        let ea = store.entry_for(a, &state());
        let eb = store.entry_for(b, &state());
        assert_eq!(ea, eb, "same state shares an entry");
        assert_ne!(ea, store.entry_for(c, &state()), "entries differ across caches");
    }

    #[test]
    fn eviction_stales_handles() {
        let mut store = SharedCacheStore::default();
        let h = store.handle_for(&key(&[1]));
        store.evict_all();
        assert!(!store.is_live(h), "handle is stale after eviction");
        assert_eq!(store.entry_for(h, &state()), None, "no entries through a stale handle");
        let fresh = store.handle_for(&key(&[1]));
        assert_ne!(fresh, h, "slot reuse bumps the generation");
        assert!(store.is_live(fresh), "new handle is live");
    }

    #[test]
    fn local_overrides_shadow_shared_values() {
        let mut store = SharedCacheStore::default();
        let h = store.handle_for(&key(&[1]));
        let id = store.entry_for(h, &state()).unwrap();
        let mut a = LocalEntry::new(id);
        let mut b = LocalEntry::new(id);
        let shared = CalculatedValue::new(StyleValue::Number(1.0), Some(StyleOrigin::Author), false);
        let local = CalculatedValue::new(StyleValue::Number(2.0), Some(StyleOrigin::Inline), false);
        a.put(&mut store, "-fx-opacity", shared.clone(), false);
        assert_eq!(b.get(&store, "-fx-opacity"), Cached::Value(&shared), "shared write visible to b");
        b.put(&mut store, "-fx-opacity", local.clone(), true);
        assert_eq!(b.get(&store, "-fx-opacity"), Cached::Value(&local), "local value shadows");
        assert_eq!(a.get(&store, "-fx-opacity"), Cached::Value(&shared), "a is unaffected");
        a.mark_failed("-fx-opacity");
        assert_eq!(a.get(&store, "-fx-opacity"), Cached::Failed, "failure latch wins");
        assert_eq!(a.get(&store, "-fx-fill"), Cached::Missing, "unknown property");
    }
}
