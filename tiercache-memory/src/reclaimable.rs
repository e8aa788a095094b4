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

use std::sync::Arc;

use ahash::RandomState;
use itertools::Itertools;
use parking_lot::RwLock;
use tiercache_common::{BackendId, CacheKey, Dn, Entry, Error, Event, EventListener, Naming, Result};

use crate::{
    indexer::DualIndex,
    record::{CachedEntry, Keyed, SoftRecord},
    statistics::Statistics,
    tier::Tier,
};

type Shard<E> = RwLock<DualIndex<Arc<SoftRecord<E>>>>;

/// A tier without a count bound whose payloads may be reclaimed under memory pressure.
///
/// Reclamation drops payloads only; the index entries stay behind until the next lookup touches them. A lookup
/// that finds a reclaimed payload reports a miss and retires the stale index entries, exactly once even if
/// several threads race on the same key.
///
/// Entries are spread over shards by DN hash. Each shard carries both indices for its entries, and a backend
/// entry id is held by at most one shard at a time.
pub struct ReclaimableTier<E>
where
    E: Entry,
{
    name: String,
    shards: Vec<Shard<E>>,
    hash_builder: RandomState,
    statistics: Statistics,
    event_listener: Option<Arc<dyn EventListener>>,
}

impl<E> ReclaimableTier<E>
where
    E: Entry,
{
    /// Create a reclaimable tier with the given shard count, at least 1.
    pub fn new(name: impl Into<String>, shards: usize) -> Result<Self> {
        let name = name.into();
        if shards == 0 {
            return Err(Error::config(format!(
                "reclaimable tier {name:?}: shard count must be positive"
            )));
        }
        Ok(Self {
            name,
            shards: (0..shards).map(|_| RwLock::new(DualIndex::default())).collect_vec(),
            hash_builder: RandomState::new(),
            statistics: Statistics::default(),
            event_listener: None,
        })
    }

    /// Report entries leaving this tier to `event_listener`.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    fn shard(&self, dn: &Dn) -> &Shard<E> {
        let hash = self.hash_builder.hash_one(dn);
        &self.shards[hash as usize % self.shards.len()]
    }

    /// Turn an index hit into an entry, retiring it if its payload is gone.
    fn resolve(&self, shard: &Shard<E>, record: Option<Arc<SoftRecord<E>>>) -> Option<CachedEntry<E>> {
        let Some(record) = record else {
            self.statistics.record_miss();
            return None;
        };
        if let Some(entry) = record.upgrade() {
            self.statistics.record_hit();
            return Some(entry);
        }
        self.statistics.record_miss();
        self.retire(shard, &record);
        None
    }

    fn retire(&self, shard: &Shard<E>, record: &Arc<SoftRecord<E>>) {
        let retired = {
            let mut index = shard.write();
            // Another thread may have retired or replaced it already.
            match index.get_by_dn(&record.key().dn) {
                Some(current) if Arc::ptr_eq(current, record) => index.remove_by_dn(&record.key().dn),
                _ => None,
            }
        };
        if let Some(record) = retired {
            self.statistics.record_reclaim(1);
            self.notify(vec![(Event::Reclaim, record)]);
        }
    }

    fn insert(&self, entry: CachedEntry<E>, only_if_absent: bool) -> bool {
        let shard = self.shard(entry.dn());
        let mut garbages = vec![];

        {
            let mut index = shard.write();

            if only_if_absent && index.get_by_dn(entry.dn()).is_some_and(|r| !r.is_reclaimed()) {
                return false;
            }

            let mut replaced = 0;
            for record in index.take_conflicts(entry.key()) {
                if record.is_reclaimed() {
                    self.statistics.record_reclaim(1);
                    garbages.push((Event::Reclaim, record));
                } else {
                    replaced += 1;
                    garbages.push((Event::Replace, record));
                }
            }
            if replaced == 0 {
                self.statistics.record_insert();
            } else {
                self.statistics.record_replace(replaced);
            }

            index.insert(Arc::new(SoftRecord::new(entry.clone())));
        }

        // The same backend entry id may still be held by another shard under a different DN.
        for other in self.shards.iter().filter(|other| !std::ptr::eq(*other, shard)) {
            let taken = other.write().remove_by_id(entry.backend_id(), entry.entry_id());
            if let Some(record) = taken {
                self.statistics.record_replace(1);
                garbages.push((Event::Replace, record));
            }
        }

        self.notify(garbages);
        true
    }

    fn remove_where<F>(&self, reason: Event, mut f: F) -> usize
    where
        F: FnMut(&CacheKey) -> bool,
    {
        let mut removed = vec![];
        for shard in self.shards.iter() {
            let taken = shard.write().retain(|record| f(record.key()));
            removed.extend(taken);
        }
        let count = removed.len();
        self.statistics.record_remove(count);
        self.notify(removed.into_iter().map(|record| (reason, record)).collect());
        count
    }

    fn take_one<F>(&self, f: F) -> bool
    where
        F: Fn(&mut DualIndex<Arc<SoftRecord<E>>>) -> Option<Arc<SoftRecord<E>>>,
    {
        for shard in self.shards.iter() {
            let taken = f(&mut *shard.write());
            if let Some(record) = taken {
                if record.is_reclaimed() {
                    self.statistics.record_reclaim(1);
                    self.notify(vec![(Event::Reclaim, record)]);
                    return false;
                }
                self.statistics.record_remove(1);
                self.notify(vec![(Event::Remove, record)]);
                return true;
            }
        }
        false
    }

    fn notify(&self, garbages: Vec<(Event, Arc<SoftRecord<E>>)>) {
        for (event, record) in garbages {
            tracing::trace!(tier = %self.name, ?event, key = %record.key(), "[reclaimable]: entry leaves");
            if let Some(listener) = self.event_listener.as_ref() {
                listener.on_leave(event, record.key());
            }
        }
    }
}

impl<E> Tier<E> for ReclaimableTier<E>
where
    E: Entry,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> &'static str {
        "reclaimable"
    }

    fn get_by_dn(&self, dn: &Dn) -> Option<CachedEntry<E>> {
        let shard = self.shard(dn);
        let record = shard.read().get_by_dn(dn).cloned();
        self.resolve(shard, record)
    }

    fn contains(&self, dn: &Dn) -> bool {
        let shard = self.shard(dn);
        let record = shard.read().get_by_dn(dn).cloned();
        match record {
            Some(record) if record.is_reclaimed() => {
                self.retire(shard, &record);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn get_by_id(&self, backend_id: &BackendId, entry_id: i64) -> Option<CachedEntry<E>> {
        for shard in self.shards.iter() {
            let record = shard.read().get_by_id(backend_id, entry_id).cloned();
            if record.is_some() {
                return self.resolve(shard, record);
            }
        }
        self.statistics.record_miss();
        None
    }

    fn put(&self, entry: CachedEntry<E>) {
        self.insert(entry, false);
    }

    fn put_if_absent(&self, entry: CachedEntry<E>) -> bool {
        self.insert(entry, true)
    }

    fn remove(&self, dn: &Dn) -> bool {
        let shard = self.shard(dn);
        let record = shard.write().remove_by_dn(dn);
        match record {
            Some(record) if record.is_reclaimed() => {
                self.statistics.record_reclaim(1);
                self.notify(vec![(Event::Reclaim, record)]);
                false
            }
            Some(record) => {
                self.statistics.record_remove(1);
                self.notify(vec![(Event::Remove, record)]);
                true
            }
            None => false,
        }
    }

    fn remove_by_id(&self, backend_id: &BackendId, entry_id: i64) -> bool {
        self.take_one(|index| index.remove_by_id(backend_id, entry_id))
    }

    fn clear(&self) -> usize {
        let mut removed = vec![];
        for shard in self.shards.iter() {
            removed.extend(shard.write().drain());
        }
        let count = removed.len();
        self.statistics.record_remove(count);
        self.notify(removed.into_iter().map(|record| (Event::Clear, record)).collect());
        count
    }

    fn clear_backend(&self, backend_id: &BackendId) -> usize {
        self.remove_where(Event::Clear, |key| &key.backend_id != backend_id)
    }

    fn clear_subtree(&self, base: &Dn, naming: &dyn Naming) -> usize {
        self.remove_where(Event::Clear, |key| !naming.is_in_subtree(&key.dn, base))
    }

    fn evict_fraction(&self, hint: f64) {
        let hint = hint.clamp(0.0, 1.0);
        let mut reclaimed = 0;
        for shard in self.shards.iter() {
            let index = shard.read();
            let live = index.iter().filter(|record| !record.is_reclaimed()).collect_vec();
            let target = (live.len() as f64 * hint).ceil() as usize;
            reclaimed += live
                .into_iter()
                .take(target)
                .filter(|record| record.reclaim())
                .count();
        }
        tracing::debug!(tier = %self.name, hint, reclaimed, "[reclaimable]: payloads reclaimed");
    }

    fn handle_low_memory(&self) {
        self.evict_fraction(1.0);
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    fn keys(&self) -> Vec<CacheKey> {
        self.shards
            .iter()
            .flat_map(|shard| {
                shard
                    .read()
                    .iter()
                    .filter(|record| !record.is_reclaimed())
                    .map(|record| record.key().clone())
                    .collect_vec()
            })
            .sorted_by(|a, b| a.dn.cmp(&b.dn))
            .collect_vec()
    }

    fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    fn check_consistency(&self) -> bool {
        let mut ids = hashbrown::HashSet::new();
        for shard in self.shards.iter() {
            let index = shard.read();
            if !index.is_consistent() {
                return false;
            }
            for record in index.iter() {
                let key = record.key();
                if !std::ptr::eq(self.shard(&key.dn), shard) || !ids.insert(key.id()) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;

    use super::*;
    use crate::test_utils::{RecordingListener, TestEntry};

    fn entry(dn: &str, backend: &str, id: i64) -> CachedEntry<TestEntry> {
        CachedEntry::new(TestEntry::new(dn, &["person"]), backend, id)
    }

    fn tier_with_listener(shards: usize) -> (ReclaimableTier<TestEntry>, RecordingListener) {
        let listener = RecordingListener::default();
        let tier = ReclaimableTier::new("soft", shards)
            .unwrap()
            .with_event_listener(Arc::new(listener.clone()));
        (tier, listener)
    }

    #[test]
    fn test_send_sync_static() {
        fn is_send_sync_static<T: Send + Sync + 'static>() {}
        is_send_sync_static::<ReclaimableTier<TestEntry>>();
    }

    #[test]
    fn test_zero_shards() {
        assert!(ReclaimableTier::<TestEntry>::new("soft", 0).is_err());
    }

    #[test]
    fn test_unbounded() {
        let tier = ReclaimableTier::new("soft", 4).unwrap();
        for i in 0..1000 {
            tier.put(entry(&format!("uid=user{i},o=test"), "b1", i));
        }
        assert_eq!(tier.len(), 1000);
        for i in 0..1000 {
            let e = tier.get_by_id(&BackendId::new("b1"), i).unwrap();
            assert_eq!(e.dn(), &Dn::new(&format!("uid=user{i},o=test")));
            assert!(tier.get_by_dn(e.dn()).unwrap().ptr_eq(&e));
        }
        assert!(tier.check_consistency());
    }

    #[test_log::test]
    fn test_miss_after_low_memory() {
        let (tier, listener) = tier_with_listener(4);
        for i in 0..16 {
            tier.put(entry(&format!("uid=user{i},o=test"), "b1", i));
        }

        tier.handle_low_memory();
        // Retirement is lazy.
        assert_eq!(tier.len(), 16);
        assert!(tier.keys().is_empty());

        for i in 0..16 {
            assert!(tier.get_by_dn(&Dn::new(&format!("uid=user{i},o=test"))).is_none());
        }
        assert_eq!(tier.len(), 0);
        assert_eq!(listener.count(Event::Reclaim), 16);
        assert_eq!(tier.statistics().snapshot().reclaim, 16);

        // The tier behaves as if empty.
        assert!(tier.put_if_absent(entry("uid=user0,o=test", "b1", 0)));
        assert!(tier.get_by_dn(&Dn::new("uid=user0,o=test")).is_some());
        assert!(tier.check_consistency());
    }

    #[test]
    fn test_contains_skips_lookup_statistics() {
        let (tier, listener) = tier_with_listener(2);
        tier.put(entry("uid=a,o=test", "b1", 1));

        assert!(tier.contains(&Dn::new("uid=a,o=test")));
        assert!(!tier.contains(&Dn::new("uid=b,o=test")));
        tier.handle_low_memory();
        assert!(!tier.contains(&Dn::new("uid=a,o=test")));

        let stats = tier.statistics().snapshot();
        assert_eq!((stats.hit, stats.miss), (0, 0));
        assert_eq!(stats.reclaim, 1);
        assert_eq!(listener.count(Event::Reclaim), 1);
        assert_eq!(tier.len(), 0);
    }

    #[test]
    fn test_stale_id_lookup_retires() {
        let (tier, listener) = tier_with_listener(2);
        tier.put(entry("uid=a,o=test", "b1", 1));
        tier.handle_low_memory();

        assert!(tier.get_by_id(&BackendId::new("b1"), 1).is_none());
        assert!(tier.get_by_id(&BackendId::new("b1"), 1).is_none());
        assert_eq!(tier.len(), 0);
        assert_eq!(listener.count(Event::Reclaim), 1);
    }

    #[test]
    fn test_put_over_stale_entry() {
        let (tier, listener) = tier_with_listener(1);
        tier.put(entry("uid=a,o=test", "b1", 1));
        tier.handle_low_memory();

        let fresh = entry("uid=a,o=test", "b1", 1);
        tier.put(fresh.clone());
        assert!(tier.get_by_dn(&Dn::new("uid=a,o=test")).unwrap().ptr_eq(&fresh));
        assert_eq!(listener.count(Event::Reclaim), 1);
        assert_eq!(listener.count(Event::Replace), 0);
        assert!(!tier.remove(&Dn::new("uid=b,o=test")));
        assert!(tier.remove(&Dn::new("uid=a,o=test")));
    }

    #[test]
    fn test_evict_fraction() {
        let tier = ReclaimableTier::new("soft", 1).unwrap();
        for i in 0..10 {
            tier.put(entry(&format!("uid=user{i},o=test"), "b1", i));
        }
        tier.evict_fraction(0.5);
        assert_eq!(tier.keys().len(), 5);
        tier.evict_fraction(0.0);
        assert_eq!(tier.keys().len(), 5);
        tier.evict_fraction(1.0);
        assert!(tier.keys().is_empty());
    }

    #[test]
    fn test_same_id_across_shards() {
        let tier = ReclaimableTier::new("soft", 8).unwrap();
        for i in 0..32 {
            tier.put(entry(&format!("uid=rename{i},o=test"), "b1", 1));
        }
        assert_eq!(tier.len(), 1);
        assert_eq!(
            tier.get_by_id(&BackendId::new("b1"), 1).unwrap().dn(),
            &Dn::new("uid=rename31,o=test")
        );
        assert!(tier.check_consistency());
    }

    #[test]
    fn test_clear_backend_and_subtree() {
        let tier = ReclaimableTier::new("soft", 4).unwrap();
        tier.put(entry("uid=a,ou=people,o=test", "b1", 1));
        tier.put(entry("uid=a,ou=people,o=test2", "b2", 1));
        tier.put(entry("uid=b,ou=people,o=test", "b2", 2));

        assert_eq!(tier.clear_backend(&BackendId::new("b1")), 1);
        assert!(tier.get_by_id(&BackendId::new("b2"), 1).is_some());

        assert_eq!(tier.clear_subtree(&Dn::new("o=test"), &tiercache_common::SuffixNaming), 1);
        assert_eq!(tier.keys().len(), 1);
        assert_eq!(tier.clear(), 1);
        assert!(tier.is_empty());
        assert!(tier.check_consistency());
    }

    #[test]
    fn test_concurrent_retire_once() {
        const THREADS: usize = 8;

        let (tier, listener) = tier_with_listener(4);
        for i in 0..64 {
            tier.put(entry(&format!("uid=user{i},o=test"), "b1", i));
        }
        tier.handle_low_memory();

        let barrier = Barrier::new(THREADS);
        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    barrier.wait();
                    for i in 0..64 {
                        assert!(tier.get_by_dn(&Dn::new(&format!("uid=user{i},o=test"))).is_none());
                        assert!(tier.get_by_id(&BackendId::new("b1"), i).is_none());
                    }
                });
            }
        });

        assert_eq!(tier.len(), 0);
        assert_eq!(listener.count(Event::Reclaim), 64);
        assert!(tier.check_consistency());
    }
}
