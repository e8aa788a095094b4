// Copyright 2026 tiercache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use itertools::Itertools;
use parking_lot::RwLock;
use tiercache_common::{BackendId, CacheKey, Dn, Entry, Error, Event, EventListener, Naming, Result};

use crate::{
    indexer::DualIndex,
    record::{CachedEntry, Keyed},
    statistics::Statistics,
    tier::Tier,
};

/// Below this many entries a low-memory signal drops the whole tier.
const LOW_MEMORY_CLEAR_THRESHOLD: usize = 1000;
/// Above the threshold, a low-memory signal drops one in this many entries, oldest first.
const LOW_MEMORY_DROP_DIVISOR: usize = 10;

struct Slot<E> {
    entry: CachedEntry<E>,
    /// Insertion sequence, the key in the order map.
    seq: u64,
}

impl<E> Keyed for Slot<E> {
    fn key(&self) -> &CacheKey {
        self.entry.key()
    }
}

struct FifoState<E> {
    index: DualIndex<Slot<E>>,
    /// Insertion order, oldest first.
    order: BTreeMap<u64, Dn>,
    next_seq: u64,
}

impl<E> FifoState<E> {
    fn unlink(&mut self, slots: &[Slot<E>]) {
        for slot in slots {
            let dn = self.order.remove(&slot.seq);
            debug_assert_eq!(dn.as_ref(), Some(slot.entry.dn()));
        }
    }

    fn take_conflicts(&mut self, key: &CacheKey) -> Vec<Slot<E>> {
        let taken = self.index.take_conflicts(key);
        self.unlink(&taken);
        taken
    }

    fn pop_oldest(&mut self) -> Option<Slot<E>> {
        let (_, dn) = self.order.pop_first()?;
        let slot = self.index.remove_by_dn(&dn);
        debug_assert!(slot.is_some());
        slot
    }

    fn push(&mut self, entry: CachedEntry<E>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, entry.dn().clone());
        self.index.insert(Slot { entry, seq });
    }
}

/// A tier holding at most `capacity` entries, evicting in strict insertion order.
///
/// Lookups never change the order: a hit does not make an entry younger. Overwriting a DN with
/// [`Tier::put`] re-inserts it as the newest entry.
///
/// Lookups share a read lock; mutations take the write lock of this tier only.
pub struct FifoTier<E>
where
    E: Entry,
{
    name: String,
    capacity: AtomicUsize,
    state: RwLock<FifoState<E>>,
    statistics: Statistics,
    event_listener: Option<Arc<dyn EventListener>>,
}

impl<E> FifoTier<E>
where
    E: Entry,
{
    /// Create a FIFO tier. `capacity` must be at least 1.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self> {
        let name = name.into();
        if capacity == 0 {
            return Err(Error::config(format!("fifo tier {name:?}: capacity must be positive")));
        }
        Ok(Self {
            name,
            capacity: AtomicUsize::new(capacity),
            state: RwLock::new(FifoState {
                index: DualIndex::default(),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
            statistics: Statistics::default(),
            event_listener: None,
        })
    }

    /// Report entries leaving this tier to `event_listener`.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Pop the `count` oldest entries as evictions.
    fn evict_oldest(state: &mut FifoState<E>, count: usize) -> Vec<(Event, CachedEntry<E>)> {
        (0..count)
            .map_while(|_| state.pop_oldest())
            .map(|slot| (Event::Evict, slot.entry))
            .collect_vec()
    }

    fn insert(&self, entry: CachedEntry<E>, only_if_absent: bool) -> bool {
        let mut garbages = vec![];

        {
            let mut state = self.state.write();

            if only_if_absent && state.index.contains_dn(entry.dn()) {
                return false;
            }

            let replaced = state.take_conflicts(entry.key());
            if replaced.is_empty() {
                self.statistics.record_insert();
            } else {
                self.statistics.record_replace(replaced.len());
            }
            garbages.extend(replaced.into_iter().map(|slot| (Event::Replace, slot.entry)));

            let overflow = (state.index.len() + 1).saturating_sub(self.capacity());
            let evicted = Self::evict_oldest(&mut state, overflow);
            self.statistics.record_evict(evicted.len());
            garbages.extend(evicted);

            state.push(entry);
        }

        self.notify(garbages);
        true
    }

    fn remove_where<F>(&self, reason: Event, f: F) -> usize
    where
        F: FnMut(&Slot<E>) -> bool,
    {
        let removed = {
            let mut state = self.state.write();
            let removed = state.index.retain(f);
            state.unlink(&removed);
            removed
        };
        let count = removed.len();
        self.statistics.record_remove(count);
        self.notify(removed.into_iter().map(|slot| (reason, slot.entry)).collect());
        count
    }

    fn notify(&self, garbages: Vec<(Event, CachedEntry<E>)>) {
        for (event, entry) in garbages {
            tracing::trace!(tier = %self.name, ?event, key = %entry.key(), "[fifo]: entry leaves");
            if let Some(listener) = self.event_listener.as_ref() {
                listener.on_leave(event, entry.key());
            }
        }
    }
}

impl<E> Tier<E> for FifoTier<E>
where
    E: Entry,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> &'static str {
        "fifo"
    }

    fn get_by_dn(&self, dn: &Dn) -> Option<CachedEntry<E>> {
        let entry = self.state.read().index.get_by_dn(dn).map(|slot| slot.entry.clone());
        match entry {
            Some(_) => self.statistics.record_hit(),
            None => self.statistics.record_miss(),
        }
        entry
    }

    fn get_by_id(&self, backend_id: &BackendId, entry_id: i64) -> Option<CachedEntry<E>> {
        let entry = self
            .state
            .read()
            .index
            .get_by_id(backend_id, entry_id)
            .map(|slot| slot.entry.clone());
        match entry {
            Some(_) => self.statistics.record_hit(),
            None => self.statistics.record_miss(),
        }
        entry
    }

    fn contains(&self, dn: &Dn) -> bool {
        self.state.read().index.contains_dn(dn)
    }

    fn put(&self, entry: CachedEntry<E>) {
        self.insert(entry, false);
    }

    fn put_if_absent(&self, entry: CachedEntry<E>) -> bool {
        self.insert(entry, true)
    }

    fn remove(&self, dn: &Dn) -> bool {
        let removed = {
            let mut state = self.state.write();
            let removed = state.index.remove_by_dn(dn);
            if let Some(slot) = removed.as_ref() {
                state.unlink(std::slice::from_ref(slot));
            }
            removed
        };
        match removed {
            Some(slot) => {
                self.statistics.record_remove(1);
                self.notify(vec![(Event::Remove, slot.entry)]);
                true
            }
            None => false,
        }
    }

    fn remove_by_id(&self, backend_id: &BackendId, entry_id: i64) -> bool {
        let removed = {
            let mut state = self.state.write();
            let removed = state.index.remove_by_id(backend_id, entry_id);
            if let Some(slot) = removed.as_ref() {
                state.unlink(std::slice::from_ref(slot));
            }
            removed
        };
        match removed {
            Some(slot) => {
                self.statistics.record_remove(1);
                self.notify(vec![(Event::Remove, slot.entry)]);
                true
            }
            None => false,
        }
    }

    fn clear(&self) -> usize {
        let removed = {
            let mut state = self.state.write();
            state.order.clear();
            state.index.drain()
        };
        let count = removed.len();
        self.statistics.record_remove(count);
        self.notify(removed.into_iter().map(|slot| (Event::Clear, slot.entry)).collect());
        count
    }

    fn clear_backend(&self, backend_id: &BackendId) -> usize {
        self.remove_where(Event::Clear, |slot| slot.entry.backend_id() != backend_id)
    }

    fn clear_subtree(&self, base: &Dn, naming: &dyn Naming) -> usize {
        self.remove_where(Event::Clear, |slot| !naming.is_in_subtree(slot.entry.dn(), base))
    }

    fn evict_fraction(&self, hint: f64) {
        // The capacity already bounds the memory of this tier.
        tracing::trace!(tier = %self.name, hint, "[fifo]: ignore evict fraction");
    }

    fn handle_low_memory(&self) {
        let evicted = {
            let mut state = self.state.write();
            let len = state.index.len();
            let count = if len < LOW_MEMORY_CLEAR_THRESHOLD {
                len
            } else {
                len / LOW_MEMORY_DROP_DIVISOR
            };
            Self::evict_oldest(&mut state, count)
        };
        tracing::debug!(tier = %self.name, evicted = evicted.len(), "[fifo]: low memory");
        self.statistics.record_evict(evicted.len());
        self.notify(evicted);
    }

    fn set_capacity(&self, capacity: usize) {
        let capacity = capacity.max(1);
        let evicted = {
            let mut state = self.state.write();
            self.capacity.store(capacity, Ordering::Relaxed);
            let overflow = state.index.len().saturating_sub(capacity);
            Self::evict_oldest(&mut state, overflow)
        };
        tracing::debug!(tier = %self.name, capacity, evicted = evicted.len(), "[fifo]: resize");
        self.statistics.record_evict(evicted.len());
        self.notify(evicted);
    }

    fn len(&self) -> usize {
        self.state.read().index.len()
    }

    fn keys(&self) -> Vec<CacheKey> {
        let state = self.state.read();
        state
            .order
            .values()
            .filter_map(|dn| state.index.get_by_dn(dn))
            .map(|slot| slot.entry.key().clone())
            .collect_vec()
    }

    fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    fn check_consistency(&self) -> bool {
        let state = self.state.read();
        state.index.is_consistent()
            && state.order.len() == state.index.len()
            && state
                .order
                .iter()
                .all(|(seq, dn)| state.index.get_by_dn(dn).is_some_and(|slot| slot.seq == *seq))
    }
}
