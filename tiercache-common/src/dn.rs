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

use itertools::Itertools;

/// A normalized distinguished name.
///
/// Normalization lowercases attribute types and values, and strips insignificant whitespace around RDN
/// separators and `=`. Escaped separators (`\,`, `\+`) are preserved verbatim. Two [`Dn`]s are equal iff their
/// normalized forms are byte-equal; the cache never looks deeper into the structure than that.
///
/// Cloning a [`Dn`] is cheap.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dn(Arc<str>);

impl Dn {
    /// Normalize `raw` into a [`Dn`].
    pub fn new(raw: &str) -> Self {
        let normalized = split_unescaped(raw, ',')
            .into_iter()
            .map(|rdn| {
                split_unescaped(rdn, '+')
                    .into_iter()
                    .map(normalize_ava)
                    .join("+")
            })
            .filter(|rdn| !rdn.is_empty())
            .join(",");
        Self(normalized.into())
    }

    /// The root DN, the ancestor of every DN.
    pub fn root() -> Self {
        Self("".into())
    }

    /// Returns `true` for the root DN.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the RDNs from the leaf towards the root.
    pub fn rdns(&self) -> impl Iterator<Item = &str> + '_ {
        split_unescaped(&self.0, ',').into_iter()
    }

    /// Number of RDNs.
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.rdns().count()
        }
    }

    /// Returns the DN with the leaf RDN removed, or `None` for the root DN.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let parent = self.rdns().skip(1).join(",");
        Some(Self(parent.into()))
    }

    /// Returns a child of `self` with the given RDN prepended.
    pub fn child(&self, rdn: &str) -> Self {
        if self.is_root() {
            Self::new(rdn)
        } else {
            Self::new(&format!("{rdn},{}", self.0))
        }
    }
}

impl Debug for Dn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dn({:?})", self.0)
    }
}

impl Display for Dn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Dn {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Dn {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

/// Split on `sep`, ignoring separators escaped by a backslash.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = vec![];
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == sep => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn normalize_ava(ava: &str) -> String {
    match ava.split_once('=') {
        Some((attr, value)) => format!("{}={}", attr.trim().to_lowercase(), value.trim().to_lowercase()),
        None => ava.trim().to_lowercase(),
    }
}

/// The directory-naming collaborator.
///
/// The cache treats DNs as opaque keys; the only structural question it asks is whether an entry lies in the
/// subtree rooted at some base DN, which is needed by subtree invalidation.
pub trait Naming: Send + Sync + 'static {
    /// Returns `true` if `dn` is equal to `base` or is a descendant of it.
    fn is_in_subtree(&self, dn: &Dn, base: &Dn) -> bool;
}

/// Subtree containment by RDN-suffix equality over normalized components.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixNaming;

impl Naming for SuffixNaming {
    fn is_in_subtree(&self, dn: &Dn, base: &Dn) -> bool {
        if base.is_root() {
            return true;
        }
        let dn_rdns = dn.rdns().collect_vec();
        let base_rdns = base.rdns().collect_vec();
        dn_rdns.len() >= base_rdns.len() && dn_rdns.ends_with(&base_rdns)
    }
}
