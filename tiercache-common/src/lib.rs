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

//! Shared components for the tiered directory entry cache.
//!
//! This crate holds the identity types every tier agrees on ([`Dn`], [`BackendId`], [`CacheKey`]), the
//! payload contract ([`Entry`]), the naming collaborator used for subtree invalidation ([`Naming`]), and the
//! error and event types reported by the cache layers built on top of it.

/// Normalized distinguished names and subtree comparison.
pub mod dn;
/// The payload contract for cached directory entries.
pub mod entry;
/// Error types for configuration paths.
pub mod error;
/// Cache leave events and listeners.
pub mod event;
/// Cache keys and backend identifiers.
pub mod key;

pub use crate::{
    dn::{Dn, Naming, SuffixNaming},
    entry::Entry,
    error::{Error, MultipleError, Result},
    event::{Event, EventListener},
    key::{BackendId, CacheKey},
};
