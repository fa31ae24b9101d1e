//
// Copyright (c) 2023 ZettaScale Technology
//
// This program and the accompanying materials are made available under the
// terms of the Eclipse Public License 2.0 which is available at
// http://www.eclipse.org/legal/epl-2.0, or the Apache License, Version 2.0
// which is available at https://www.apache.org/licenses/LICENSE-2.0.
//
// SPDX-License-Identifier: EPL-2.0 OR Apache-2.0
//
// Contributors:
//   ZettaScale Zenoh Team, <zenoh@zettascale.tech>
//
//! Per-session resource tables: a `u16 id -> KE` mapping for ids this
//! session minted (local) and one for ids the peer minted (remote). Ids
//! `0` and `0xFFFF` are reserved.

use std::collections::HashMap;

use zenoh_pico_collections::IntMap;
use zenoh_pico_keyexpr::ResourceResolver;

pub const RESERVED_ID_NONE: u16 = 0;
pub const RESERVED_ID_MAX: u16 = u16::MAX;

/// One direction's half of the resource table (either "ids this session
/// minted" or "ids the peer minted"): a dense forward map plus a reverse
/// index so `declare_resource` can answer "does this KE already have an
/// id?" idempotently in O(1) rather than scanning.
#[derive(Default)]
pub struct ResourceTable {
    forward: IntMap<u16, String>,
    reverse: HashMap<String, u16>,
    next_id: u16,
}

impl ResourceTable {
    pub fn new() -> Self {
        ResourceTable {
            forward: IntMap::with_capacity(16),
            reverse: HashMap::new(),
            next_id: RESERVED_ID_NONE + 1,
        }
    }

    pub fn get(&self, id: u16) -> Option<&str> {
        self.forward.get(id).map(String::as_str)
    }

    pub fn id_of(&self, key: &str) -> Option<u16> {
        self.reverse.get(key).copied()
    }

    /// Allocates the next non-reserved id and inserts `key`. Callers are
    /// responsible for checking `id_of` first to preserve idempotency.
    pub fn insert_new(&mut self, key: String) -> Option<u16> {
        let id = self.allocate_id()?;
        self.forward.insert(id, key.clone());
        self.reverse.insert(key, id);
        Some(id)
    }

    /// Inserts a peer-assigned id directly (used when decoding a remote
    /// `DeclareResource`, which carries the id the peer chose).
    pub fn insert_with_id(&mut self, id: u16, key: String) {
        if let Some(old) = self.forward.get(id) {
            self.reverse.remove(old);
        }
        self.forward.insert(id, key.clone());
        self.reverse.insert(key, id);
    }

    pub fn remove(&mut self, id: u16) -> Option<String> {
        let key = self.forward.remove(id)?;
        self.reverse.remove(&key);
        Some(key)
    }

    fn allocate_id(&mut self) -> Option<u16> {
        let start = self.next_id;
        loop {
            let candidate = self.next_id;
            if candidate != RESERVED_ID_NONE && candidate != RESERVED_ID_MAX && !self.forward.contains_key(candidate) {
                self.next_id = candidate.wrapping_add(1);
                return Some(candidate);
            }
            self.next_id = candidate.wrapping_add(1);
            if self.next_id == start {
                return None; // table exhausted
            }
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Adapts a [`ResourceTable`] to [`zenoh_pico_keyexpr::ResourceResolver`]
/// so the key-expression crate's `resolve`/`suffix_intersects` can be used
/// without that crate depending on the session engine.
pub struct TableResolver<'a>(pub &'a ResourceTable);

impl ResourceResolver for TableResolver<'_> {
    fn resolve_scope(&self, id: u16) -> Option<String> {
        self.0.get(id).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaring_unique_keys_yields_distinct_ids() {
        let mut t = ResourceTable::new();
        let a = t.insert_new("a/b".into()).unwrap();
        let b = t.insert_new("a/c".into()).unwrap();
        assert_ne!(a, b);
        assert_eq!(t.id_of("a/b"), Some(a));
    }

    #[test]
    fn undeclare_then_redeclare_yields_a_new_id() {
        let mut t = ResourceTable::new();
        let a = t.insert_new("a/b".into()).unwrap();
        t.remove(a);
        assert_eq!(t.id_of("a/b"), None);
        let b = t.insert_new("a/b".into()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn never_allocates_reserved_ids() {
        let mut t = ResourceTable::new();
        for i in 0..10 {
            let id = t.insert_new(format!("k/{i}")).unwrap();
            assert_ne!(id, RESERVED_ID_NONE);
            assert_ne!(id, RESERVED_ID_MAX);
        }
    }
}
