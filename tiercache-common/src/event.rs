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

use crate::key::CacheKey;

/// Why an entry left a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Pushed out to make room for a newer entry.
    Evict,
    /// Overwritten by a `put` with the same DN or the same backend entry id.
    Replace,
    /// Explicitly removed, or moved out of the tier by a `put` that landed elsewhere.
    Remove,
    /// Dropped by a bulk invalidation or a tier teardown.
    Clear,
    /// Payload discarded under memory pressure.
    Reclaim,
}

/// Trait for a customized listener on entries leaving the cache.
pub trait EventListener: Send + Sync + 'static {
    /// Called once for every entry that leaves a tier, with the reason.
    fn on_leave(&self, reason: Event, key: &CacheKey);
}
