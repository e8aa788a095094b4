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

use std::fmt::Display;

use itertools::Itertools;
use tiercache_common::{Dn, Error, Result};

const OBJECT_CLASS_PREFIX: &str = "objectclass=";

/// A `*` wildcard pattern over a lowercase string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Glob {
    /// Literal pieces between wildcards. Always at least one piece, possibly empty.
    pieces: Vec<String>,
}

impl Glob {
    fn new(pattern: &str) -> Self {
        Self {
            pieces: pattern.split('*').map(str::to_string).collect(),
        }
    }

    fn matches(&self, s: &str) -> bool {
        let (first, rest) = match self.pieces.split_first() {
            Some(split) => split,
            None => return s.is_empty(),
        };
        // No wildcard at all: exact match.
        let Some((last, middle)) = rest.split_last() else {
            return s == first;
        };

        if !s.starts_with(first.as_str()) {
            return false;
        }
        let mut remaining = &s[first.len()..];
        for piece in middle {
            match remaining.find(piece.as_str()) {
                Some(pos) => remaining = &remaining[pos + piece.len()..],
                None => return false,
            }
        }
        remaining.len() >= last.len() && remaining.ends_with(last.as_str())
    }
}

impl Display for Glob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pieces.iter().join("*"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Dn,
    ObjectClass,
}

/// A single include or exclude pattern.
///
/// Two forms are understood:
///
/// - `objectClass=<glob>` matches if any of the entry's object classes matches the glob.
/// - anything else is a glob over the entry's normalized DN, e.g. `uid=soft*` or `*,ou=people,o=test`.
///
/// Matching is case-insensitive. `*` matches any run of characters, including none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    target: Target,
    glob: Glob,
}

impl Pattern {
    /// Parse a pattern.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::pattern(raw, "empty pattern"));
        }
        if trimmed.starts_with('(') || trimmed.ends_with(')') {
            return Err(Error::pattern(raw, "search filter syntax is not supported"));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(Error::pattern(raw, "control characters are not allowed"));
        }

        let lower = trimmed.to_lowercase();
        if let Some(class) = lower.strip_prefix(OBJECT_CLASS_PREFIX) {
            let class = class.trim();
            if class.is_empty() {
                return Err(Error::pattern(raw, "missing object class"));
            }
            return Ok(Self {
                target: Target::ObjectClass,
                glob: Glob::new(class),
            });
        }

        if !lower.contains('=') && !lower.chars().all(|c| c == '*') {
            return Err(Error::pattern(raw, "expected `attr=value` components"));
        }
        Ok(Self {
            target: Target::Dn,
            glob: Glob::new(Dn::new(&lower).as_str()),
        })
    }

    /// Returns `true` if the entry identified by `dn` and `object_classes` matches.
    pub fn matches(&self, dn: &Dn, object_classes: &[String]) -> bool {
        match self.target {
            Target::Dn => self.glob.matches(dn.as_str()),
            Target::ObjectClass => object_classes
                .iter()
                .any(|class| self.glob.matches(&class.to_lowercase())),
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.target {
            Target::Dn => write!(f, "{}", self.glob),
            Target::ObjectClass => write!(f, "objectClass={}", self.glob),
        }
    }
}

/// Admission policy of a tier.
///
/// An entry is accepted if it matches any include pattern (or there are none) and matches no exclude
/// pattern. Exclude always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl FilterPolicy {
    /// Build a policy from raw include and exclude patterns.
    ///
    /// Every malformed pattern is reported, not only the first one.
    pub fn new<I, X>(include: I, exclude: X) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        X: IntoIterator,
        X::Item: AsRef<str>,
    {
        let mut errs = vec![];
        let mut parse_all = |patterns: Vec<String>| {
            patterns
                .iter()
                .filter_map(|p| match Pattern::parse(p) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        errs.push(e);
                        None
                    }
                })
                .collect_vec()
        };
        let include = parse_all(include.into_iter().map(|p| p.as_ref().to_string()).collect());
        let exclude = parse_all(exclude.into_iter().map(|p| p.as_ref().to_string()).collect());

        if !errs.is_empty() {
            return Err(Error::multiple(errs));
        }
        Ok(Self { include, exclude })
    }

    /// A policy that accepts every entry.
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Returns `true` if the entry may be cached by the tier.
    pub fn accepts(&self, dn: &Dn, object_classes: &[String]) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(dn, object_classes));
        included && !self.exclude.iter().any(|p| p.matches(dn, object_classes))
    }

    /// Include patterns.
    pub fn include(&self) -> &[Pattern] {
        &self.include
    }

    /// Exclude patterns.
    pub fn exclude(&self) -> &[Pattern] {
        &self.exclude
    }
}
