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


use ahash::RandomState;
use parking_lot::{Mutex, MutexGuard};
use tiercache_common::Dn;

/// A fixed set of locks, one of which guards every DN.
///
/// Two writers of the same DN always contend on the same lock; writers of different DNs usually do not.
pub(crate) struct Stripes {
    locks: Vec<Mutex<()>>,
    hash_builder: RandomState,
}

impl Stripes {
    pub(crate) fn new(stripes: usize) -> Self {
        Self {
            locks: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
            hash_builder: RandomState::default(),
        }
    }

    pub(crate) fn lock(&self, dn: &Dn) -> MutexGuard<'_, ()> {
        self.locks[self.index(dn)].lock()
    }

    fn index(&self, dn: &Dn) -> usize {
        self.hash_builder.hash_one(dn) as usize % self.locks.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
