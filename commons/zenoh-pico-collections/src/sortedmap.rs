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
//! An ordered map, used for reply consolidation (keyed by canonical key
//! expression) and the periodic scheduler (keyed by due time). Thin wrapper
//! over `BTreeMap` — the "caller-supplied comparator" the C source needs is,
//! in idiomatic Rust, just the key's `Ord` impl, so no separate comparator
//! parameter is threaded through.

use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct SortedMap<K, V> {
    inner: BTreeMap<K, V>,
}

impl<K: Ord, V> SortedMap<K, V> {
    pub fn new() -> Self {
        SortedMap {
            inner: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }
}

impl<K: Ord + Clone, V> SortedMap<K, V> {
    /// Removes and returns the entry with the smallest key.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let key = self.inner.keys().next().cloned()?;
        let value = self.inner.remove(&key)?;
        Some((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_first_returns_earliest_key() {
        let mut m = SortedMap::new();
        m.insert(30u64, "c");
        m.insert(10u64, "a");
        m.insert(20u64, "b");
        assert_eq!(m.pop_first(), Some((10, "a")));
        assert_eq!(m.pop_first(), Some((20, "b")));
        assert_eq!(m.len(), 1);
    }
}
