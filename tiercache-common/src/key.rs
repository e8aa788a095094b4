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

use std::{
    fmt::{Debug, Display},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::dn::Dn;

/// Identifier of the storage partition that owns an entry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BackendId(Arc<str>);

impl BackendId {
    /// Create a backend id.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().into())
    }

    /// The backend id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BackendId({:?})", self.0)
    }
}

impl Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self(id.into())
    }
}

impl From<BackendId> for String {
    fn from(id: BackendId) -> Self {
        id.0.to_string()
    }
}

/// The identity of a cached entry.
///
/// `dn` is unique across the whole cache. `(backend_id, entry_id)` is unique within a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Normalized DN of the entry.
    pub dn: Dn,
    /// Backend that owns the entry.
    pub backend_id: BackendId,
    /// Backend-local entry id.
    pub entry_id: i64,
}

impl CacheKey {
    /// Create a cache key.
    pub fn new(dn: Dn, backend_id: BackendId, entry_id: i64) -> Self {
        Self {
            dn,
            backend_id,
            entry_id,
        }
    }

    /// The `(backend_id, entry_id)` pair used by the id index.
    pub fn id(&self) -> (BackendId, i64) {
        (self.backend_id.clone(), self.entry_id)
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}#{}]", self.dn, self.backend_id, self.entry_id)
    }
}
