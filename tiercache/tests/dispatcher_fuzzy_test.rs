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

//! Fuzzy test for the dispatcher: random concurrent operations must leave every DN and every backend entry id
//! in at most one tier, with both indices of every tier agreeing.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use rand::{rng, Rng};
use tiercache::prelude::*;
use tiercache_memory::test_utils::{RecordingListener, TestEntry};

const THREADS: usize = 8;
const OPS: usize = 5000;
const DNS: i64 = 64;
const BACKENDS: [&str; 2] = ["userRoot", "adminRoot"];

const PREFIXES: [&str; 3] = ["soft", "fifo", "other"];
const BASES: [&str; 3] = ["ou=people,o=test", "ou=groups,o=test", "cn=config"];

/// A random DN and the entry id that belongs to it.
fn random_entry(rng: &mut impl Rng) -> (String, i64) {
    let p = rng.random_range(0..PREFIXES.len());
    let b = rng.random_range(0..BASES.len());
    let n = rng.random_range(0..DNS);
    let dn = format!("uid={}{n},{}", PREFIXES[p], BASES[b]);
    (dn, (p * BASES.len() + b) as i64 * DNS + n)
}

fn build(listener: RecordingListener) -> Dispatcher<TestEntry> {
    DispatcherBuilder::new()
        .with_tier(TierConfig::reclaimable("soft", 1).with_include(["uid=soft*"]).with_shards(4))
        .with_tier(TierConfig::fifo("fifo", 2, 32).with_include(["uid=fifo*"]))
        .with_tier(TierConfig::fifo("groups", 3, 16).with_include(["*,ou=groups,o=test"]))
        .with_stripes(16)
        .with_event_listener(Arc::new(listener))
        .build()
        .unwrap()
}

#[test_log::test]
fn test_concurrent_random_ops_keep_indices_consistent() {
    let listener = RecordingListener::default();
    let cache = build(listener.clone());
    let puts = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut rng = rng();
                for _ in 0..OPS {
                    let (dn, entry_id) = random_entry(&mut rng);
                    let backend = BACKENDS[rng.random_range(0..BACKENDS.len())];
                    match rng.random_range(0..100) {
                        0..30 => {
                            cache.put(TestEntry::new(&dn, &[]).with_payload(rng.random()), backend, entry_id);
                            puts.fetch_add(1, Ordering::Relaxed);
                        }
                        30..45 => {
                            cache.put_if_absent(TestEntry::new(&dn, &[]), backend, entry_id);
                        }
                        45..70 => {
                            if let Some(entry) = cache.get_by_dn(&Dn::new(&dn)) {
                                assert_eq!(entry.dn(), &Dn::new(&dn));
                            }
                        }
                        70..85 => {
                            if let Some(entry) = cache.get_by_id(&BackendId::new(backend), entry_id) {
                                assert_eq!(entry.entry_id(), entry_id);
                                assert_eq!(entry.backend_id().as_str(), backend);
                            }
                        }
                        85..93 => {
                            cache.remove(&Dn::new(&dn));
                        }
                        93..96 => {
                            cache.evict_fraction(0.25);
                        }
                        96..98 => {
                            cache.clear_subtree(&Dn::new("ou=groups,o=test"));
                        }
                        98..99 => {
                            cache.clear_backend(backend);
                        }
                        _ => {
                            cache.handle_low_memory();
                        }
                    }
                }
            });
        }
    });

    assert!(puts.load(Ordering::Relaxed) > 0);
    assert!(cache.check_consistency());

    let fifo = cache.tier("fifo").unwrap();
    assert!(fifo.len() <= 32);
    assert!(cache.tier("groups").unwrap().len() <= 16);

    // every live key is reachable through both lookups and lives in the tier it was routed to
    for stats in cache.statistics() {
        let tier = cache.tier(&stats.name).unwrap();
        for key in tier.keys() {
            let by_dn = cache.get_by_dn(&key.dn).unwrap();
            let by_id = cache.get_by_id(&key.backend_id, key.entry_id).unwrap();
            assert!(by_dn.ptr_eq(&by_id), "{key}");
            assert_eq!(cache.tier_of(&key.dn).as_deref(), Some(stats.name.as_str()));
        }
    }

    cache.clear();
    assert_eq!(cache.diagnostic_dump(), None);
    assert!(!listener.events().is_empty());
}
