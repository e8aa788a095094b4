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

//! In-memory tiers for the tiered directory entry cache.
//!
//! A tier holds cached entries behind two indices, one by DN and one by `(backend_id, entry_id)`, and decides
//! on its own which entries to drop:
//!
//! - [`FifoTier`] holds at most `capacity` entries and evicts in strict insertion order.
//! - [`ReclaimableTier`] has no count bound; its payloads may vanish under memory pressure and the dangling
//!   index entries are retired lazily on the next lookup.
//!
//! [`FilterPolicy`] decides whether a tier admits an entry at all.

mod fifo;
mod filter;
mod indexer;
mod reclaimable;
mod record;
mod statistics;
mod tier;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use crate::{
    fifo::FifoTier,
    filter::{FilterPolicy, Pattern},
    reclaimable::ReclaimableTier,
    record::CachedEntry,
    statistics::{Statistics, StatisticsSnapshot},
    tier::Tier,
};
