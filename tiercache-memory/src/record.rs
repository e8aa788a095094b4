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

use std::{fmt::Debug, ops::Deref, sync::Arc};

use arc_swap::ArcSwapOption;
use tiercache_common::{BackendId, CacheKey, Dn, Entry};

/// A directory entry as handed out by the cache.
///
/// Cloning is cheap. The payload is immutable; replacing an entry in the cache creates a new [`CachedEntry`],
/// so a handle obtained earlier keeps seeing the payload it was returned with.
pub struct CachedEntry<E> {
    key: Arc<CacheKey>,
    entry: Arc<E>,
}

impl<E> Clone for CachedEntry<E> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            entry: self.entry.clone(),
        }
    }
}

impl<E> Debug for CachedEntry<E>
where
    E: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEntry")
            .field("key", &self.key)
            .field("entry", &self.entry)
            .finish()
    }
}

impl<E> CachedEntry<E>
where
    E: Entry,
{
    /// Wrap a directory entry owned by `backend_id` under `entry_id`.
    pub fn new(entry: impl Into<Arc<E>>, backend_id: impl Into<BackendId>, entry_id: i64) -> Self {
        let entry = entry.into();
        let key = CacheKey::new(entry.dn().clone(), backend_id.into(), entry_id);
        Self {
            key: Arc::new(key),
            entry,
        }
    }
}

impl<E> CachedEntry<E> {
    pub(crate) fn from_parts(key: Arc<CacheKey>, entry: Arc<E>) -> Self {
        Self { key, entry }
    }

    pub(crate) fn key_arc(&self) -> &Arc<CacheKey> {
        &self.key
    }

    /// The cache key.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The entry DN.
    pub fn dn(&self) -> &Dn {
        &self.key.dn
    }

    /// The owning backend.
    pub fn backend_id(&self) -> &BackendId {
        &self.key.backend_id
    }

    /// The backend-local entry id.
    pub fn entry_id(&self) -> i64 {
        self.key.entry_id
    }

    /// The shared payload.
    pub fn entry(&self) -> &Arc<E> {
        &self.entry
    }

    /// Returns `true` if both handles refer to the same cached payload.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry) && Arc::ptr_eq(&self.key, &other.key)
    }
}

impl<E> Deref for CachedEntry<E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

/// Access to the cache key of an indexed record.
pub(crate) trait Keyed {
    fn key(&self) -> &CacheKey;
}

impl<E> Keyed for CachedEntry<E> {
    fn key(&self) -> &CacheKey {
        &self.key
    }
}

/// A record whose payload may be dropped at any time without touching the indices holding the record.
///
/// The key is always kept so the record can still be found, and retired, after its payload is gone.
pub(crate) struct SoftRecord<E> {
    key: Arc<CacheKey>,
    payload: ArcSwapOption<E>,
}

impl<E> SoftRecord<E> {
    pub(crate) fn new(entry: CachedEntry<E>) -> Self {
        Self {
            key: entry.key,
            payload: ArcSwapOption::new(Some(entry.entry)),
        }
    }

    /// Returns the entry, or `None` if the payload has been reclaimed.
    pub(crate) fn upgrade(&self) -> Option<CachedEntry<E>> {
        self.payload
            .load_full()
            .map(|entry| CachedEntry::from_parts(self.key.clone(), entry))
    }

    pub(crate) fn is_reclaimed(&self) -> bool {
        self.payload.load().is_none()
    }

    /// Drop the payload. Returns `true` if this call dropped it.
    pub(crate) fn reclaim(&self) -> bool {
        self.payload.swap(None).is_some()
    }
}

impl<E> Keyed for Arc<SoftRecord<E>> {
    fn key(&self) -> &CacheKey {
        &self.key
    }
}
