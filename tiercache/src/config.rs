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

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tiercache_common::{Error, Result};
use tiercache_memory::FilterPolicy;

const DEFAULT_SHARDS: usize = 16;
const DEFAULT_STRIPES: usize = 256;

fn default_shards() -> usize {
    DEFAULT_SHARDS
}

fn default_stripes() -> usize {
    DEFAULT_STRIPES
}

fn default_enabled() -> bool {
    true
}

/// Eviction strategy of a tier, with its strategy-specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierKind {
    /// Bounded tier evicting in insertion order.
    Fifo {
        /// Maximum entry count, at least 1.
        capacity: usize,
    },
    /// Unbounded tier whose payloads may be reclaimed under memory pressure.
    Reclaimable {
        /// Shard count, at least 1.
        #[serde(default = "default_shards")]
        shards: usize,
    },
}

/// Configuration of one tier.
///
/// Deserializes from e.g.
///
/// ```json
/// { "name": "people", "level": 1, "kind": "fifo", "capacity": 10000, "include": ["*,ou=people,o=example"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Unique tier name.
    pub name: String,
    /// Position in the lookup order; lower levels are consulted first. Unique among enabled tiers, at least 1.
    pub level: u32,
    /// Eviction strategy.
    #[serde(flatten)]
    pub kind: TierKind,
    /// Include patterns; an empty list includes everything.
    #[serde(default)]
    pub include: Vec<String>,
    /// Exclude patterns, which override include patterns.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Disabled tiers are validated but not built.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl TierConfig {
    /// A FIFO tier accepting every entry.
    pub fn fifo(name: impl Into<String>, level: u32, capacity: usize) -> Self {
        Self::new(name, level, TierKind::Fifo { capacity })
    }

    /// A reclaimable tier accepting every entry, with the default shard count.
    pub fn reclaimable(name: impl Into<String>, level: u32) -> Self {
        Self::new(
            name,
            level,
            TierKind::Reclaimable {
                shards: DEFAULT_SHARDS,
            },
        )
    }

    fn new(name: impl Into<String>, level: u32, kind: TierKind) -> Self {
        Self {
            name: name.into(),
            level,
            kind,
            include: vec![],
            exclude: vec![],
            enabled: true,
        }
    }

    /// Set the include patterns.
    pub fn with_include<I>(mut self, include: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.include = include.into_iter().map(Into::into).collect();
        self
    }

    /// Set the exclude patterns.
    pub fn with_exclude<I>(mut self, exclude: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable the tier.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the shard count of a reclaimable tier. No effect on other kinds.
    pub fn with_shards(mut self, shards: usize) -> Self {
        if let TierKind::Reclaimable { shards: s } = &mut self.kind {
            *s = shards;
        }
        self
    }

    /// Build the filter policy described by the include and exclude patterns.
    pub fn policy(&self) -> Result<FilterPolicy> {
        FilterPolicy::new(&self.include, &self.exclude)
    }

    fn validate(&self, errs: &mut Vec<Error>) {
        if self.name.trim().is_empty() {
            errs.push(Error::config("tier name must not be empty"));
        }
        if self.level == 0 {
            errs.push(Error::config(format!("tier {:?}: level must be positive", self.name)));
        }
        match self.kind {
            TierKind::Fifo { capacity: 0 } => {
                errs.push(Error::config(format!("tier {:?}: capacity must be positive", self.name)))
            }
            TierKind::Reclaimable { shards: 0 } => {
                errs.push(Error::config(format!("tier {:?}: shard count must be positive", self.name)))
            }
            _ => {}
        }
        if let Err(e) = self.policy() {
            errs.push(e);
        }
    }
}

/// Configuration of the whole cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Tier definitions, in any order.
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
    /// Number of per-DN writer lock stripes, at least 1.
    #[serde(default = "default_stripes")]
    pub stripes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tiers: vec![],
            stripes: DEFAULT_STRIPES,
        }
    }
}

impl CacheConfig {
    /// Check the configuration, reporting every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut errs = vec![];

        if self.stripes == 0 {
            errs.push(Error::config("stripe count must be positive"));
        }

        let mut names = HashSet::new();
        let mut levels = HashMap::new();
        for tier in self.tiers.iter() {
            tier.validate(&mut errs);

            if !names.insert(tier.name.as_str()) {
                errs.push(Error::config(format!("duplicate tier name {:?}", tier.name)));
            }
            if tier.enabled {
                if let Some(other) = levels.insert(tier.level, tier.name.as_str()) {
                    errs.push(Error::config(format!(
                        "tiers {:?} and {:?} share level {}",
                        other, tier.name, tier.level
                    )));
                }
            }
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(Error::multiple(errs))
        }
    }

    /// Enabled tiers, ordered by ascending level.
    pub(crate) fn enabled_tiers(&self) -> Vec<&TierConfig> {
        let mut tiers: Vec<_> = self.tiers.iter().filter(|tier| tier.enabled).collect();
        tiers.sort_by_key(|tier| tier.level);
        tiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize() {
        let config: CacheConfig = serde_json::from_str(
            r#"{
                "tiers": [
                    { "name": "soft", "level": 1, "kind": "reclaimable", "include": ["uid=soft*"] },
                    { "name": "fifo", "level": 2, "kind": "fifo", "capacity": 10, "include": ["uid=fifo*"] },
                    { "name": "off", "level": 2, "kind": "fifo", "capacity": 1, "enabled": false }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.stripes, DEFAULT_STRIPES);
        assert_eq!(
            config.tiers[0],
            TierConfig::reclaimable("soft", 1).with_include(["uid=soft*"])
        );
        assert_eq!(config.tiers[1], TierConfig::fifo("fifo", 2, 10).with_include(["uid=fifo*"]));
        assert!(!config.tiers[2].enabled);
        config.validate().unwrap();

        let names: Vec<_> = config.enabled_tiers().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["soft", "fifo"]);
    }

    #[test]
    fn test_serialize_roundtrip_shape() {
        let tier = TierConfig::reclaimable("soft", 3).with_shards(4).with_exclude(["*,cn=config"]);
        let json = serde_json::to_value(&tier).unwrap();
        assert_eq!(json["kind"], "reclaimable");
        assert_eq!(json["shards"], 4);
        assert_eq!(json["exclude"][0], "*,cn=config");
    }

    #[test]
    fn test_validate_collects_errors() {
        let config = CacheConfig {
            tiers: vec![
                TierConfig::fifo("a", 1, 0),
                TierConfig::fifo("b", 1, 10),
                TierConfig::reclaimable("c", 0).with_include(["(uid=*)"]),
                TierConfig::reclaimable("a", 5).with_shards(0),
            ],
            stripes: 0,
        };

        let err = config.validate().unwrap_err();
        let Error::Multiple(errs) = err else {
            panic!("expected multiple errors");
        };
        // stripes, capacity, duplicate level, level 0, pattern, shards, duplicate name
        assert_eq!(errs.errors().len(), 7);
    }

    #[test]
    fn test_disabled_tiers_share_levels() {
        let config = CacheConfig {
            tiers: vec![
                TierConfig::fifo("a", 1, 10),
                TierConfig::fifo("b", 1, 10).with_enabled(false),
            ],
            ..Default::default()
        };
        config.validate().unwrap();

        let config = CacheConfig {
            tiers: vec![TierConfig::fifo("b", 1, 10).with_enabled(false).with_include([""])],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
