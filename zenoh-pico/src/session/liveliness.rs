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
//! Liveliness tokens: a declaration asserting "this peer is alive at this
//! key expression". Local and remote tokens
//! live in separate id-keyed tables, matching the asymmetry between
//! `declare_token` (we mint the id) and a remote `DeclareToken` (the peer's
//! id, opaque to us beyond bookkeeping).
//!
//! The "matching status" supplemented feature (original_source
//! `api/liveliness.h`'s `z_liveliness_get`/subscriber-count query, minus
//! the querying-other-peers half that needs a router) lives here too:
//! [`LivelinessTable::is_alive`] answers "does some known token intersect
//! this key?" from purely local state.

use std::collections::HashMap;

use zenoh_pico_keyexpr::intersects;

#[derive(Default)]
pub struct LivelinessTable {
    local: HashMap<u32, String>,
    remote: HashMap<u32, String>,
    next_id: u32,
}

impl LivelinessTable {
    pub fn new() -> Self {
        LivelinessTable {
            local: HashMap::new(),
            remote: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn declare_local(&mut self, key: String) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.local.insert(id, key);
        id
    }

    pub fn undeclare_local(&mut self, id: u32) -> Option<String> {
        self.local.remove(&id)
    }

    pub fn insert_remote(&mut self, id: u32, key: String) {
        self.remote.insert(id, key);
    }

    pub fn remove_remote(&mut self, id: u32) -> Option<String> {
        self.remote.remove(&id)
    }

    pub fn local_key(&self, id: u32) -> Option<&str> {
        self.local.get(&id).map(String::as_str)
    }

    /// Whether any known token (local or remote — a session observes its
    /// own liveliness too) intersects `key`.
    pub fn is_alive(&self, key: &str) -> bool {
        self.local
            .values()
            .chain(self.remote.values())
            .any(|k| intersects(k, key).unwrap_or(false))
    }

    pub fn local_iter(&self) -> impl Iterator<Item = (&u32, &String)> {
        self.local.iter()
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    pub fn remote_len(&self) -> usize {
        self.remote.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_undeclare_local_removes_it() {
        let mut t = LivelinessTable::new();
        let id = t.declare_local("a/b".into());
        assert!(t.is_alive("a/b"));
        t.undeclare_local(id);
        assert!(!t.is_alive("a/b"));
    }

    #[test]
    fn is_alive_sees_remote_tokens_too() {
        let mut t = LivelinessTable::new();
        t.insert_remote(7, "a/**".into());
        assert!(t.is_alive("a/b/c"));
        assert!(!t.is_alive("x/y"));
    }
}
