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

//! A tiered entry cache for a directory server.
//!
//! The [`Dispatcher`] composes several tiers, ordered by ascending level, behind one cache facade:
//!
//! - a `put` lands in the first tier whose filter policy accepts the entry;
//! - lookups consult the tiers in level order and return the first hit;
//! - removals and bulk invalidations fan out to every tier.
//!
//! A DN is cached by at most one tier at a time, and writers of the same DN are serialized by a striped
//! per-DN lock while writers of different DNs proceed in parallel.
//!
//! ```
//! use tiercache::prelude::*;
//!
//! #[derive(Debug)]
//! struct Person {
//!     dn: Dn,
//!     object_classes: Vec<String>,
//! }
//!
//! impl Entry for Person {
//!     fn dn(&self) -> &Dn {
//!         &self.dn
//!     }
//!
//!     fn object_classes(&self) -> &[String] {
//!         &self.object_classes
//!     }
//! }
//!
//! let cache: Dispatcher<Person> = DispatcherBuilder::new()
//!     .with_tier(TierConfig::fifo("people", 1, 1024).with_include(["*,ou=people,o=example"]))
//!     .with_tier(TierConfig::reclaimable("rest", 2))
//!     .build()
//!     .unwrap();
//!
//! let person = Person {
//!     dn: Dn::new("uid=jdoe,ou=People,o=example"),
//!     object_classes: vec!["person".to_string()],
//! };
//! cache.put(person, "userRoot", 42);
//!
//! assert_eq!(cache.get_id_for_dn(&Dn::new("uid=jdoe,ou=people,o=example")), Some(42));
//! assert_eq!(cache.tier_of(&Dn::new("uid=jdoe,ou=people,o=example")).as_deref(), Some("people"));
//! ```

mod config;
mod dispatcher;
mod stripe;

pub use crate::{
    config::{CacheConfig, TierConfig, TierKind},
    dispatcher::{Dispatcher, DispatcherBuilder, TierStatistics},
};

/// Re-exports of everything needed to configure and use the cache.
pub mod prelude {
    pub use tiercache_common::{BackendId, CacheKey, Dn, Entry, Error, Event, EventListener, Naming, Result, SuffixNaming};
    pub use tiercache_memory::{CachedEntry, FifoTier, FilterPolicy, ReclaimableTier, StatisticsSnapshot, Tier};

    pub use crate::{CacheConfig, Dispatcher, DispatcherBuilder, TierConfig, TierKind, TierStatistics};
}
