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

//! Utilities for testing.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tiercache_common::{CacheKey, Dn, Entry, Event, EventListener};

/// A minimal directory entry with an opaque numeric payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEntry {
    dn: Dn,
    object_classes: Vec<String>,
    payload: u64,
}

impl TestEntry {
    /// Create an entry with payload `0`.
    pub fn new(dn: &str, object_classes: &[&str]) -> Self {
        Self {
            dn: Dn::new(dn),
            object_classes: object_classes.iter().map(|s| s.to_string()).collect(),
            payload: 0,
        }
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: u64) -> Self {
        self.payload = payload;
        self
    }

    /// The payload.
    pub fn payload(&self) -> u64 {
        self.payload
    }
}

impl Entry for TestEntry {
    fn dn(&self) -> &Dn {
        &self.dn
    }

    fn object_classes(&self) -> &[String] {
        &self.object_classes
    }
}

/// An event listener that records all leave events.
#[derive(Debug, Default, Clone)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<(Event, CacheKey)>>>,
}

impl EventListener for RecordingListener {
    fn on_leave(&self, reason: Event, key: &CacheKey) {
        self.events.lock().push((reason, key.clone()));
    }
}

impl RecordingListener {
    /// Get all recorded events.
    pub fn events(&self) -> MutexGuard<'_, Vec<(Event, CacheKey)>> {
        self.events.lock()
    }

    /// Number of recorded events of the given kind.
    pub fn count(&self, reason: Event) -> usize {
        self.events.lock().iter().filter(|(e, _)| *e == reason).count()
    }
}
