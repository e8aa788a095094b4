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

use std::fmt::Debug;

use crate::dn::Dn;

/// A directory entry payload held by the cache.
///
/// The cache never inspects attributes. It reads the DN to key the entry and the object classes to let tier
/// filter policies decide whether to admit it.
pub trait Entry: Send + Sync + 'static + Debug {
    /// The entry's normalized DN.
    fn dn(&self) -> &Dn;

    /// The entry's object class names.
    fn object_classes(&self) -> &[String];
}
