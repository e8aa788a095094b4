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

use tiercache_common::{BackendId, CacheKey, Dn, Entry, Naming};

use crate::{record::CachedEntry, statistics::Statistics};

/// A single cache implementation participating in the dispatcher.
///
/// Every operation is synchronous and bounded. Misses and rejected inserts are reported through the return
/// value; no operation fails.
///
/// A tier never consults a filter policy: the caller has already decided that the entry belongs here.
pub trait Tier<E>: Send + Sync + 'static
where
    E: Entry,
{
    /// Configured name of the tier.
    fn name(&self) -> &str;

    /// Short name of the eviction strategy, for diagnostics.
    fn strategy(&self) -> &'static str;

    /// Look up an entry by DN.
    fn get_by_dn(&self, dn: &Dn) -> Option<CachedEntry<E>>;

    /// Look up an entry by backend and backend-local entry id.
    fn get_by_id(&self, backend_id: &BackendId, entry_id: i64) -> Option<CachedEntry<E>>;

    /// Returns `true` if a live entry is cached under `dn`.
    ///
    /// Not counted as a lookup in [`Tier::statistics`].
    fn contains(&self, dn: &Dn) -> bool;

    /// Insert an entry, replacing any entry with the same DN or the same backend entry id.
    fn put(&self, entry: CachedEntry<E>);

    /// Insert an entry unless its DN is already cached. Returns `true` if the entry was inserted.
    fn put_if_absent(&self, entry: CachedEntry<E>) -> bool;

    /// Remove the entry cached under `dn`. Returns `true` if there was one.
    fn remove(&self, dn: &Dn) -> bool;

    /// Remove the entry cached under `(backend_id, entry_id)`. Returns `true` if there was one.
    fn remove_by_id(&self, backend_id: &BackendId, entry_id: i64) -> bool;

    /// Remove all entries. Returns the number of entries removed.
    fn clear(&self) -> usize;

    /// Remove all entries of a backend. Returns the number of entries removed.
    fn clear_backend(&self, backend_id: &BackendId) -> usize;

    /// Remove all entries at or below `base`. Returns the number of entries removed.
    fn clear_subtree(&self, base: &Dn, naming: &dyn Naming) -> usize;

    /// Shed roughly `hint` (`0.0..=1.0`) of the tier's memory.
    fn evict_fraction(&self, hint: f64);

    /// React to a low-memory signal.
    fn handle_low_memory(&self);

    /// Change the entry bound of a bounded tier, evicting the oldest entries that no longer fit.
    ///
    /// Unbounded tiers ignore it.
    fn set_capacity(&self, capacity: usize) {
        let _ = capacity;
    }

    /// Number of index entries, including ones whose payload may already be gone.
    fn len(&self) -> usize;

    /// Returns `true` if the tier holds no index entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all live entries, oldest first where the tier keeps an order.
    fn keys(&self) -> Vec<CacheKey>;

    /// Operation counters.
    fn statistics(&self) -> &Statistics;

    /// Returns `true` if the DN index and the id index describe the same entries.
    fn check_consistency(&self) -> bool;
}
