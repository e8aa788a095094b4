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

use hashbrown::HashMap;
use tiercache_common::{BackendId, CacheKey, Dn};

use crate::record::Keyed;

/// The two lookup indices of a tier.
///
/// Records live only in the DN index. The id index maps `(backend_id, entry_id)` to a DN, so an id hit always
/// resolves to the very record the DN index holds. Every mutation keeps both maps in step.
pub(crate) struct DualIndex<R> {
    by_dn: HashMap<Dn, R>,
    by_id: HashMap<(BackendId, i64), Dn>,
}

impl<R> Default for DualIndex<R> {
    fn default() -> Self {
        Self {
            by_dn: HashMap::new(),
            by_id: HashMap::new(),
        }
    }
}

impl<R> DualIndex<R>
where
    R: Keyed,
{
    pub(crate) fn get_by_dn(&self, dn: &Dn) -> Option<&R> {
        self.by_dn.get(dn)
    }

    pub(crate) fn get_by_id(&self, backend_id: &BackendId, entry_id: i64) -> Option<&R> {
        let dn = self.by_id.get(&(backend_id.clone(), entry_id))?;
        self.by_dn.get(dn)
    }

    pub(crate) fn contains_dn(&self, dn: &Dn) -> bool {
        self.by_dn.contains_key(dn)
    }

    /// Remove every record that would collide with `key` in either index.
    ///
    /// At most two records are returned: the one under the same DN and the one under the same backend id.
    pub(crate) fn take_conflicts(&mut self, key: &CacheKey) -> Vec<R> {
        let mut taken = vec![];
        if let Some(record) = self.remove_by_dn(&key.dn) {
            taken.push(record);
        }
        if let Some(record) = self.remove_by_id(&key.backend_id, key.entry_id) {
            taken.push(record);
        }
        taken
    }

    /// Insert a record that has no conflicts, see [`DualIndex::take_conflicts`].
    pub(crate) fn insert(&mut self, record: R) {
        let key = record.key();
        let id = key.id();
        let dn = key.dn.clone();
        debug_assert!(!self.by_dn.contains_key(&dn));
        debug_assert!(!self.by_id.contains_key(&id));
        self.by_id.insert(id, dn.clone());
        self.by_dn.insert(dn, record);
    }

    pub(crate) fn remove_by_dn(&mut self, dn: &Dn) -> Option<R> {
        let record = self.by_dn.remove(dn)?;
        let removed = self.by_id.remove(&record.key().id());
        debug_assert_eq!(removed.as_ref(), Some(dn));
        Some(record)
    }

    pub(crate) fn remove_by_id(&mut self, backend_id: &BackendId, entry_id: i64) -> Option<R> {
        let dn = self.by_id.remove(&(backend_id.clone(), entry_id))?;
        let record = self.by_dn.remove(&dn);
        debug_assert!(record.is_some());
        record
    }

    /// Keep only the records for which `f` returns `true`, returning the others.
    pub(crate) fn retain<F>(&mut self, mut f: F) -> Vec<R>
    where
        F: FnMut(&R) -> bool,
    {
        let removed: Vec<R> = self
            .by_dn
            .extract_if(|_, record| !f(&*record))
            .map(|(_, record)| record)
            .collect();
        for record in removed.iter() {
            self.by_id.remove(&record.key().id());
        }
        removed
    }

    pub(crate) fn drain(&mut self) -> Vec<R> {
        self.by_id.clear();
        self.by_dn.drain().map(|(_, record)| record).collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &R> {
        self.by_dn.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_dn.len()
    }

    /// Verify that both indices describe exactly the same set of records.
    pub(crate) fn is_consistent(&self) -> bool {
        self.by_dn.len() == self.by_id.len()
            && self.by_dn.iter().all(|(dn, record)| {
                let key = record.key();
                &key.dn == dn && self.by_id.get(&key.id()) == Some(dn)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record::CachedEntry, test_utils::TestEntry};

    fn entry(dn: &str, backend: &str, id: i64) -> CachedEntry<TestEntry> {
        CachedEntry::new(TestEntry::new(dn, &[]), backend, id)
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut index = DualIndex::default();
        let e = entry("uid=a,o=test", "b1", 1);
        index.insert(e.clone());

        assert!(index.get_by_dn(&Dn::new("uid=a,o=test")).unwrap().ptr_eq(&e));
        assert!(index.get_by_id(&BackendId::new("b1"), 1).unwrap().ptr_eq(&e));
        assert!(index.get_by_id(&BackendId::new("b2"), 1).is_none());
        assert!(index.is_consistent());
    }

    #[test]
    fn test_take_conflicts() {
        let mut index = DualIndex::default();
        index.insert(entry("uid=a,o=test", "b1", 1));
        index.insert(entry("uid=b,o=test", "b1", 2));

        // Same DN as `a`, same id as `b`.
        let incoming = entry("uid=a,o=test", "b1", 2);
        let taken = index.take_conflicts(incoming.key());
        assert_eq!(taken.len(), 2);
        assert_eq!(index.len(), 0);
        index.insert(incoming);
        assert!(index.is_consistent());

        // Same id reused by another backend is not a conflict.
        let taken = index.take_conflicts(entry("uid=c,o=test", "b2", 2).key());
        assert!(taken.is_empty());
    }

    #[test]
    fn test_retain_and_drain() {
        let mut index = DualIndex::default();
        for i in 0..10 {
            let backend = if i % 2 == 0 { "b1" } else { "b2" };
            index.insert(entry(&format!("uid={i},o=test"), backend, i));
        }

        let removed = index.retain(|r| r.backend_id().as_str() != "b1");
        assert_eq!(removed.len(), 5);
        assert_eq!(index.len(), 5);
        assert!(index.is_consistent());
        assert!(index.get_by_id(&BackendId::new("b1"), 0).is_none());
        assert!(index.get_by_id(&BackendId::new("b2"), 1).is_some());

        assert_eq!(index.drain().len(), 5);
        assert_eq!(index.len(), 0);
        assert!(index.is_consistent());
    }
}
