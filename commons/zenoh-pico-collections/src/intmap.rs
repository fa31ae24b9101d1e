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
//! A dense, small-integer-keyed map, used for the session's resource tables
//! (`u16 id -> key expression`). Backed by a bucketed `Vec<Option<(K, V)>>`
//! rather than a general hash map, since resource ids are small, dense, and
//! allocated sequentially in practice.

/// A map keyed by a small unsigned integer, bucketed for direct indexing.
#[derive(Clone)]
pub struct IntMap<K, V> {
    buckets: Vec<Option<(K, V)>>,
}

impl<K, V> IntMap<K, V>
where
    K: Into<usize> + Copy + PartialEq,
{
    /// Creates a map with the given initial bucket capacity (16 by default
    /// in the session's resource tables; callers needing to exercise growth
    /// or capacity errors can pass a smaller value).
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buckets = Vec::with_capacity(capacity);
        buckets.resize_with(capacity, || None);
        IntMap { buckets }
    }

    fn ensure_capacity(&mut self, idx: usize) {
        if idx >= self.buckets.len() {
            self.buckets.resize_with(idx + 1, || None);
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let idx: usize = key.into();
        self.ensure_capacity(idx);
        self.buckets[idx].replace((key, value)).map(|(_, v)| v)
    }

    pub fn get(&self, key: K) -> Option<&V> {
        let idx: usize = key.into();
        self.buckets.get(idx).and_then(|b| b.as_ref()).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        let idx: usize = key.into();
        self.buckets
            .get_mut(idx)
            .and_then(|b| b.as_mut())
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: K) -> Option<V> {
        let idx: usize = key.into();
        self.buckets
            .get_mut(idx)
            .and_then(|b| b.take())
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: K) -> bool {
        let idx: usize = key.into();
        matches!(self.buckets.get(idx), Some(Some(_)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.buckets
            .iter()
            .filter_map(|b| b.as_ref())
            .map(|(k, v)| (k, v))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.buckets.iter().filter_map(|b| b.as_ref()).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().filter(|b| b.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for IntMap<K, V>
where
    K: Into<usize> + Copy + PartialEq,
{
    fn default() -> Self {
        Self::with_capacity(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut m: IntMap<u16, &str> = IntMap::default();
        m.insert(3, "three");
        m.insert(300, "threehundred"); // forces growth past initial capacity
        assert_eq!(m.get(3), Some(&"three"));
        assert_eq!(m.get(300), Some(&"threehundred"));
        assert_eq!(m.remove(3), Some("three"));
        assert_eq!(m.get(3), None);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn grows_beyond_small_capacity() {
        let mut m: IntMap<u16, u16> = IntMap::with_capacity(2);
        for i in 0..50u16 {
            m.insert(i, i * 2);
        }
        assert_eq!(m.len(), 50);
        assert_eq!(m.get(49), Some(&98));
    }
}
