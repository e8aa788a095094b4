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

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Operation counters of a tier.
#[derive(Debug, Default)]
pub struct Statistics {
    hit: AtomicUsize,
    miss: AtomicUsize,
    insert: AtomicUsize,
    replace: AtomicUsize,
    remove: AtomicUsize,
    evict: AtomicUsize,
    reclaim: AtomicUsize,
}

/// A point-in-time copy of [`Statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    /// Lookups that returned an entry.
    pub hit: usize,
    /// Lookups that returned nothing, including lookups that found a reclaimed payload.
    pub miss: usize,
    /// Successful inserts of a DN that was not cached.
    pub insert: usize,
    /// Inserts that displaced an entry with the same DN or backend entry id.
    pub replace: usize,
    /// Entries removed explicitly or by bulk invalidation.
    pub remove: usize,
    /// Entries evicted to honor the capacity.
    pub evict: usize,
    /// Stale entries retired after their payload was reclaimed.
    pub reclaim: usize,
}

impl Statistics {
    pub(crate) fn record_hit(&self) {
        self.hit.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.insert.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replace(&self, count: usize) {
        self.replace.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_remove(&self, count: usize) {
        self.remove.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_evict(&self, count: usize) {
        self.evict.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_reclaim(&self, count: usize) {
        self.reclaim.fetch_add(count, Ordering::Relaxed);
    }

    /// Load all counters.
    ///
    /// Counters are loaded one by one, so a snapshot taken under concurrent load is not an atomic cut.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            hit: self.hit.load(Ordering::Relaxed),
            miss: self.miss.load(Ordering::Relaxed),
            insert: self.insert.load(Ordering::Relaxed),
            replace: self.replace.load(Ordering::Relaxed),
            remove: self.remove.load(Ordering::Relaxed),
            evict: self.evict.load(Ordering::Relaxed),
            reclaim: self.reclaim.load(Ordering::Relaxed),
        }
    }
}

impl StatisticsSnapshot {
    /// Hit ratio over all lookups, `0.0` if there were none.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hit + self.miss;
        if lookups == 0 {
            return 0.0;
        }
        self.hit as f64 / lookups as f64
    }
}
