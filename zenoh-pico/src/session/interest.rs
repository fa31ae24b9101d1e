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
//! Interest declarations: "notify me of current and/or future declarations
//! matching this mask (and, optionally, this key)". Two directions share
//! one table: an entry registered by the peer
//! (over the wire) tells us who to notify when we declare something
//! locally; an entry we register ourselves (via `declare_interest`) is
//! answered by the peer's own table and, for `current`, an immediate burst
//! of `Declare` replies tagged with this interest's id.

use std::collections::HashMap;

use zenoh_pico_protocol::core::MessageOrigin;
use zenoh_pico_protocol::network::InterestMask;

#[derive(Clone, Debug)]
pub struct InterestRecord {
    pub id: u32,
    pub key: Option<String>,
    pub mask: InterestMask,
    pub restricted: bool,
    pub current: bool,
    pub future: bool,
    pub aggregate: bool,
    /// Where this interest was declared from, i.e. where matching
    /// `Declare`s generated for it must be delivered.
    pub origin: MessageOrigin,
}

#[derive(Default)]
pub struct InterestTable {
    records: HashMap<u32, InterestRecord>,
    next_id: u32,
}

impl InterestTable {
    pub fn new() -> Self {
        InterestTable {
            records: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a locally-originated interest (our own `declare_interest`
    /// call) and allocates its id.
    pub fn register_local(
        &mut self,
        key: Option<String>,
        mask: InterestMask,
        restricted: bool,
        current: bool,
        future: bool,
        aggregate: bool,
    ) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.records.insert(
            id,
            InterestRecord {
                id,
                key,
                mask,
                restricted,
                current,
                future,
                aggregate,
                origin: MessageOrigin::Local,
            },
        );
        id
    }

    /// Records an `Interest` that arrived (locally or over the link) so
    /// future matching declarations get relayed to it.
    pub fn insert_remote(&mut self, record: InterestRecord) {
        self.records.insert(record.id, record);
    }

    pub fn remove(&mut self, id: u32) -> Option<InterestRecord> {
        self.records.remove(&id)
    }

    pub fn get(&self, id: u32) -> Option<&InterestRecord> {
        self.records.get(&id)
    }

    /// Interests whose `future` flag is set and whose mask admits `kind`,
    /// used to fan a fresh local declaration out as `Declare` messages.
    pub fn future_matching(&self, kind: InterestMask) -> Vec<&InterestRecord> {
        self.records
            .values()
            .filter(|r| r.future && r.mask.contains(kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_matching_filters_by_mask_and_flag() {
        let mut t = InterestTable::new();
        let id = t.register_local(None, InterestMask::SUBSCRIBER, false, false, true, false);
        t.register_local(None, InterestMask::QUERYABLE, false, false, true, false);
        t.register_local(None, InterestMask::SUBSCRIBER, false, false, false, false); // future=false, excluded

        let hits = t.future_matching(InterestMask::SUBSCRIBER);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }

    #[test]
    fn remove_drops_the_record() {
        let mut t = InterestTable::new();
        let id = t.register_local(None, InterestMask::TOKEN, false, true, false, false);
        assert!(t.remove(id).is_some());
        assert!(t.get(id).is_none());
    }
}
