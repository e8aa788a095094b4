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

use std::{collections::HashMap, fmt::Write, sync::Arc};

use arc_swap::ArcSwap;
use itertools::Itertools;
use parking_lot::RwLock;
use serde::Serialize;
use tiercache_common::{BackendId, Dn, Entry, EventListener, Naming, Result, SuffixNaming};
use tiercache_memory::{CachedEntry, FifoTier, FilterPolicy, ReclaimableTier, StatisticsSnapshot, Tier};

use crate::{
    config::{CacheConfig, TierConfig, TierKind},
    stripe::Stripes,
};

/// A tier installed in the dispatcher, with the configuration it was installed with.
struct TierSlot<E>
where
    E: Entry,
{
    config: TierConfig,
    policy: FilterPolicy,
    tier: Arc<dyn Tier<E>>,
}

impl<E> TierSlot<E>
where
    E: Entry,
{
    fn accepts(&self, entry: &CachedEntry<E>) -> bool {
        self.policy.accepts(entry.dn(), entry.object_classes())
    }
}

/// Monitoring data of one installed tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStatistics {
    /// Tier name.
    pub name: String,
    /// Tier level.
    pub level: u32,
    /// Eviction strategy.
    pub strategy: &'static str,
    /// Index entries currently held.
    pub entries: usize,
    /// Operation counters.
    pub stats: StatisticsSnapshot,
}

/// Builder of a [`Dispatcher`].
pub struct DispatcherBuilder {
    config: CacheConfig,
    naming: Arc<dyn Naming>,
    event_listener: Option<Arc<dyn EventListener>>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    /// Create a builder without tiers, using [`SuffixNaming`] for subtree invalidation.
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            naming: Arc::new(SuffixNaming),
            event_listener: None,
        }
    }

    /// Add a tier.
    pub fn with_tier(mut self, tier: TierConfig) -> Self {
        self.config.tiers.push(tier);
        self
    }

    /// Replace the whole configuration, including tiers added so far.
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of per-DN writer lock stripes.
    pub fn with_stripes(mut self, stripes: usize) -> Self {
        self.config.stripes = stripes;
        self
    }

    /// Set the naming collaborator used by subtree invalidation.
    pub fn with_naming(mut self, naming: impl Naming) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    /// Report entries leaving any tier to `event_listener`.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Validate the configuration and build the dispatcher.
    pub fn build<E>(self) -> Result<Dispatcher<E>>
    where
        E: Entry,
    {
        self.config.validate()?;

        let slots = self
            .config
            .enabled_tiers()
            .into_iter()
            .map(|config| build_slot(config, self.event_listener.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "[dispatcher]: build with tiers [{}], {} stripes",
            slots.iter().map(|slot| &slot.config.name).join(", "),
            self.config.stripes,
        );

        Ok(Dispatcher {
            tiers: ArcSwap::from_pointee(slots),
            reconfigure_lock: RwLock::new(()),
            stripes: Stripes::new(self.config.stripes),
            naming: self.naming,
            event_listener: self.event_listener,
        })
    }
}

fn build_slot<E>(config: &TierConfig, event_listener: Option<&Arc<dyn EventListener>>) -> Result<TierSlot<E>>
where
    E: Entry,
{
    let tier: Arc<dyn Tier<E>> = match config.kind {
        TierKind::Fifo { capacity } => {
            let mut tier = FifoTier::new(&config.name, capacity)?;
            if let Some(listener) = event_listener {
                tier = tier.with_event_listener(listener.clone());
            }
            Arc::new(tier)
        }
        TierKind::Reclaimable { shards } => {
            let mut tier = ReclaimableTier::new(&config.name, shards)?;
            if let Some(listener) = event_listener {
                tier = tier.with_event_listener(listener.clone());
            }
            Arc::new(tier)
        }
    };
    Ok(TierSlot {
        config: config.clone(),
        policy: config.policy()?,
        tier,
    })
}

/// Returns `true` if a running tier built as `old` can serve as `new`.
fn reusable(old: &TierKind, new: &TierKind) -> bool {
    match (old, new) {
        (TierKind::Fifo { .. }, TierKind::Fifo { .. }) => true,
        (TierKind::Reclaimable { shards: old }, TierKind::Reclaimable { shards: new }) => old == new,
        _ => false,
    }
}

/// The tiered entry cache.
///
/// Tiers are kept ordered by ascending level. Writers lock the stripe of the DN they write, so writers of the
/// same DN are serialized and writers of different DNs are not. Writers also hold the shared side of the
/// reconfiguration lock, so a write never lands in a tier list that is being replaced. Readers take no
/// dispatcher lock at all.
///
/// A DN is held by at most one tier at any time, and so is a `(backend_id, entry_id)` pair.
pub struct Dispatcher<E>
where
    E: Entry,
{
    tiers: ArcSwap<Vec<TierSlot<E>>>,
    reconfigure_lock: RwLock<()>,
    stripes: Stripes,
    naming: Arc<dyn Naming>,
    event_listener: Option<Arc<dyn EventListener>>,
}

impl<E> std::fmt::Debug for Dispatcher<E>
where
    E: Entry,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl<E> Dispatcher<E>
where
    E: Entry,
{
    /// Returns `true` if any tier holds a live entry under `dn`.
    pub fn contains(&self, dn: &Dn) -> bool {
        self.tiers.load().iter().any(|slot| slot.tier.contains(dn))
    }

    /// Look up an entry by DN, probing tiers in level order.
    pub fn get_by_dn(&self, dn: &Dn) -> Option<CachedEntry<E>> {
        self.tiers.load().iter().find_map(|slot| slot.tier.get_by_dn(dn))
    }

    /// Look up an entry by backend and entry id, probing tiers in level order.
    pub fn get_by_id(&self, backend_id: &BackendId, entry_id: i64) -> Option<CachedEntry<E>> {
        self.tiers
            .load()
            .iter()
            .find_map(|slot| slot.tier.get_by_id(backend_id, entry_id))
    }

    /// The backend entry id cached under `dn`.
    pub fn get_id_for_dn(&self, dn: &Dn) -> Option<i64> {
        self.get_by_dn(dn).map(|entry| entry.entry_id())
    }

    /// Cache `entry` in the first tier whose filter policy accepts it.
    ///
    /// Any other cached copy of the DN or of the backend entry id is dropped first. If no tier accepts the entry
    /// it is not cached, and an older copy of its DN is dropped all the same.
    pub fn put(&self, entry: impl Into<Arc<E>>, backend_id: impl Into<BackendId>, entry_id: i64) {
        let entry = CachedEntry::new(entry, backend_id, entry_id);
        let _reconfigure = self.reconfigure_lock.read();
        let tiers = self.tiers.load();
        let _guard = self.stripes.lock(entry.dn());

        let target = tiers.iter().position(|slot| slot.accepts(&entry));
        for (i, slot) in tiers.iter().enumerate() {
            if Some(i) != target {
                slot.tier.remove(entry.dn());
                slot.tier.remove_by_id(entry.backend_id(), entry.entry_id());
            }
        }

        match target {
            Some(i) => tiers[i].tier.put(entry),
            None => tracing::trace!("[dispatcher]: no tier accepts {}", entry.key()),
        }
    }

    /// Cache `entry` unless its DN is already cached.
    ///
    /// Returns `false` only if the DN is already cached. `true` means the entry was either inserted or no tier
    /// accepts it, so it will never be cached. Concurrent calls for the same DN have exactly one winner.
    pub fn put_if_absent(&self, entry: impl Into<Arc<E>>, backend_id: impl Into<BackendId>, entry_id: i64) -> bool {
        let entry = CachedEntry::new(entry, backend_id, entry_id);
        let _reconfigure = self.reconfigure_lock.read();
        let tiers = self.tiers.load();
        let _guard = self.stripes.lock(entry.dn());

        if tiers.iter().any(|slot| slot.tier.contains(entry.dn())) {
            return false;
        }
        let Some(target) = tiers.iter().position(|slot| slot.accepts(&entry)) else {
            tracing::trace!("[dispatcher]: no tier accepts {}", entry.key());
            return true;
        };
        if !tiers[target].tier.put_if_absent(entry.clone()) {
            return false;
        }
        for (i, slot) in tiers.iter().enumerate() {
            if i != target {
                slot.tier.remove_by_id(entry.backend_id(), entry.entry_id());
            }
        }
        true
    }

    /// Remove the entry cached under `dn` from whichever tier holds it. Returns `true` if there was one.
    pub fn remove(&self, dn: &Dn) -> bool {
        let _reconfigure = self.reconfigure_lock.read();
        let tiers = self.tiers.load();
        let _guard = self.stripes.lock(dn);
        tiers
            .iter()
            .fold(false, |removed, slot| slot.tier.remove(dn) || removed)
    }

    /// Remove all entries. Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let removed = self.tiers.load().iter().map(|slot| slot.tier.clear()).sum();
        tracing::debug!("[dispatcher]: clear {} entries", removed);
        removed
    }

    /// Remove all entries of a backend. Returns the number of entries removed.
    pub fn clear_backend(&self, backend_id: impl Into<BackendId>) -> usize {
        let backend_id = backend_id.into();
        let removed = self
            .tiers
            .load()
            .iter()
            .map(|slot| slot.tier.clear_backend(&backend_id))
            .sum();
        tracing::debug!("[dispatcher]: clear {} entries of backend {}", removed, backend_id);
        removed
    }

    /// Remove all entries at or below `base`. Returns the number of entries removed.
    pub fn clear_subtree(&self, base: &Dn) -> usize {
        let removed = self
            .tiers
            .load()
            .iter()
            .map(|slot| slot.tier.clear_subtree(base, self.naming.as_ref()))
            .sum();
        tracing::debug!("[dispatcher]: clear {} entries under {:?}", removed, base.as_str());
        removed
    }

    /// Shed as much memory as every tier can.
    pub fn handle_low_memory(&self) {
        let tiers = self.tiers.load();
        tracing::debug!("[dispatcher]: low memory, {} index entries held", self.len_of(&tiers));
        tiers.iter().for_each(|slot| slot.tier.handle_low_memory());
    }

    /// Shed roughly `hint` (clamped to `0.0..=1.0`) of every tier's memory.
    pub fn evict_fraction(&self, hint: f64) {
        let hint = if hint.is_nan() { 0.0 } else { hint.clamp(0.0, 1.0) };
        let tiers = self.tiers.load();
        tracing::debug!("[dispatcher]: evict fraction {hint}, {} index entries held", self.len_of(&tiers));
        tiers.iter().for_each(|slot| slot.tier.evict_fraction(hint));
    }

    fn len_of(&self, tiers: &[TierSlot<E>]) -> usize {
        tiers.iter().map(|slot| slot.tier.len()).sum()
    }

    /// A listing of every live cached key by tier, or `None` if nothing is cached.
    pub fn diagnostic_dump(&self) -> Option<String> {
        let tiers = self.tiers.load();
        let dumps = tiers
            .iter()
            .map(|slot| (slot, slot.tier.keys()))
            .filter(|(_, keys)| !keys.is_empty())
            .collect_vec();
        if dumps.is_empty() {
            return None;
        }

        let mut out = String::new();
        for (slot, keys) in dumps {
            let _ = writeln!(
                out,
                "tier {} (level {}, {}): {} entries",
                slot.config.name,
                slot.config.level,
                slot.tier.strategy(),
                keys.len()
            );
            for key in keys {
                let _ = writeln!(out, "  {key}");
            }
        }
        Some(out)
    }

    /// Monitoring data of every installed tier, in level order.
    pub fn statistics(&self) -> Vec<TierStatistics> {
        self.tiers
            .load()
            .iter()
            .map(|slot| TierStatistics {
                name: slot.config.name.clone(),
                level: slot.config.level,
                strategy: slot.tier.strategy(),
                entries: slot.tier.len(),
                stats: slot.tier.statistics().snapshot(),
            })
            .collect()
    }

    /// The installed tier named `name`.
    pub fn tier(&self, name: &str) -> Option<Arc<dyn Tier<E>>> {
        self.tiers
            .load()
            .iter()
            .find(|slot| slot.config.name == name)
            .map(|slot| slot.tier.clone())
    }

    /// Name of the tier holding a live entry under `dn`.
    pub fn tier_of(&self, dn: &Dn) -> Option<String> {
        self.tiers
            .load()
            .iter()
            .find(|slot| slot.tier.contains(dn))
            .map(|slot| slot.config.name.clone())
    }

    /// Names of the installed tiers, in level order.
    pub fn tier_names(&self) -> Vec<String> {
        self.tiers.load().iter().map(|slot| slot.config.name.clone()).collect()
    }

    /// Returns `true` if every tier is internally consistent and no DN or backend entry id is held by more
    /// than one tier.
    ///
    /// Only meaningful while no writer is running.
    pub fn check_consistency(&self) -> bool {
        let tiers = self.tiers.load();
        if !tiers.iter().all(|slot| slot.tier.check_consistency()) {
            return false;
        }

        let mut dns = HashMap::new();
        let mut ids = HashMap::new();
        for slot in tiers.iter() {
            for key in slot.tier.keys() {
                if let Some(other) = dns.insert(key.dn.clone(), &slot.config.name) {
                    tracing::warn!("[dispatcher]: {} held by tiers {} and {}", key.dn, other, slot.config.name);
                    return false;
                }
                if let Some(other) = ids.insert(key.id(), &slot.config.name) {
                    tracing::warn!("[dispatcher]: {} held by tiers {} and {}", key, other, slot.config.name);
                    return false;
                }
            }
        }
        true
    }

    /// Install a new tier list.
    ///
    /// The list is validated first; on error the running tiers are left untouched. A running tier whose name
    /// reappears with the same strategy keeps its contents and takes the new level, filter policy and capacity;
    /// a shrunk FIFO tier evicts its oldest entries. A reclaimable tier with a new shard count is rebuilt. Every
    /// other running tier is discarded and its contents are cleared.
    pub fn reconfigure(&self, tiers: Vec<TierConfig>) -> Result<()> {
        let config = CacheConfig {
            tiers,
            stripes: self.stripes.len(),
        };
        config.validate()?;

        let _guard = self.reconfigure_lock.write();
        let current = self.tiers.load_full();

        let slots = config
            .enabled_tiers()
            .into_iter()
            .map(|config| {
                match current
                    .iter()
                    .find(|slot| slot.config.name == config.name && reusable(&slot.config.kind, &config.kind))
                {
                    Some(slot) => Ok(TierSlot {
                        config: config.clone(),
                        policy: config.policy()?,
                        tier: slot.tier.clone(),
                    }),
                    None => build_slot(config, self.event_listener.as_ref()),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        for slot in slots.iter() {
            if let TierKind::Fifo { capacity } = slot.config.kind {
                slot.tier.set_capacity(capacity);
            }
        }

        let retained = slots.iter().map(|slot| slot.tier.clone()).collect_vec();
        self.tiers.store(Arc::new(slots));

        for slot in current.iter() {
            if !retained.iter().any(|tier| Arc::ptr_eq(tier, &slot.tier)) {
                let removed = slot.tier.clear();
                tracing::debug!("[dispatcher]: discard tier {} with {} entries", slot.config.name, removed);
            }
        }

        tracing::info!(
            "[dispatcher]: reconfigure with tiers [{}]",
            self.tiers.load().iter().map(|slot| &slot.config.name).join(", ")
        );
        Ok(())
    }
}
