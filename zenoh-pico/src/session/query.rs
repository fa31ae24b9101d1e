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
//! Querier-side pending queries.
//!
//! A `get()` call registers one [`PendingQuery`], keyed by request id, and
//! arms a timeout task on the scheduler. Each `Response` that arrives (from
//! the loopback path or the transport) is fed to [`PendingQuery::on_reply`];
//! each `ResponseFinal` (and the timeout, whichever comes first) finalises
//! it exactly once — replies are consolidated before the callback sees
//! them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use zenoh_pico_collections::{Bytes, SortedMap};
use zenoh_pico_protocol::core::{Encoding, EffectiveConsolidation, Timestamp};
use zenoh_pico_protocol::zenoh::Sample;
use zenoh_pico_scheduler::{Scheduler, TaskId};

/// One answer to a `get()`, already resolved to its application shape.
#[derive(Clone, Debug)]
pub enum QueryReply {
    Ok(Sample),
    Err { payload: Bytes, encoding: Encoding },
}

impl QueryReply {
    fn key(&self) -> &str {
        match self {
            QueryReply::Ok(sample) => &sample.key,
            QueryReply::Err { .. } => "",
        }
    }

    fn timestamp(&self) -> Option<Timestamp> {
        match self {
            QueryReply::Ok(sample) => sample.timestamp,
            QueryReply::Err { .. } => None,
        }
    }
}

pub type ReplyCallback = Box<dyn Fn(QueryReply) + Send + Sync>;
pub type DoneCallback = Box<dyn FnOnce() + Send>;

/// Tracks one outstanding `get()`. `remaining_finals` starts at the number
/// of response streams the call expects a `ResponseFinal` from — the
/// loopback queryable table contributes one per matching local queryable,
/// and the transport (if the request targets `Locality::Any` or `Remote`
/// and a link is up) always contributes exactly one more, since the core
/// cannot know synchronously whether a remote queryable will actually
/// answer — a `get()` over a dead/absent transport must still time out
/// rather than hang forever.
pub struct PendingQuery {
    pub id: u32,
    pub key: String,
    consolidation: EffectiveConsolidation,
    callback: ReplyCallback,
    remaining_finals: AtomicU32,
    latest_buffer: Mutex<SortedMap<String, QueryReply>>,
    monotonic_seen: Mutex<HashMap<String, Option<Timestamp>>>,
    done_callback: Mutex<Option<DoneCallback>>,
    finished: AtomicBool,
    scheduler: Arc<Scheduler>,
    timeout_task: Mutex<Option<TaskId>>,
}

impl PendingQuery {
    pub fn new(
        id: u32,
        key: String,
        consolidation: EffectiveConsolidation,
        expected_finals: u32,
        callback: ReplyCallback,
        done_callback: Option<DoneCallback>,
        scheduler: Arc<Scheduler>,
    ) -> Arc<Self> {
        Arc::new(PendingQuery {
            id,
            key,
            consolidation,
            callback,
            remaining_finals: AtomicU32::new(expected_finals),
            latest_buffer: Mutex::new(SortedMap::new()),
            monotonic_seen: Mutex::new(HashMap::new()),
            done_callback: Mutex::new(done_callback),
            finished: AtomicBool::new(false),
            scheduler,
            timeout_task: Mutex::new(None),
        })
    }

    pub fn set_timeout_task(&self, id: TaskId) {
        *self.timeout_task.lock().unwrap() = Some(id);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Feeds one reply through the consolidation policy. `None` delivers
    /// immediately; `Monotonic` delivers only if strictly newer than the
    /// last delivered sample for this key (an absent timestamp is always
    /// deliverable); `Latest` buffers per key until finalisation.
    pub fn on_reply(&self, reply: QueryReply) {
        if self.is_finished() {
            return;
        }
        // Err replies bypass consolidation entirely and reach the callback
        // immediately, regardless of mode: the original delivers every
        // `Err` as soon as it arrives (query.c's `_z_trigger_query_reply_err`
        // never touches `_pending_replies`), since `QueryReply::key()` has
        // no real key to consolidate on.
        if matches!(reply, QueryReply::Err { .. }) {
            (self.callback)(reply);
            return;
        }
        match self.consolidation {
            EffectiveConsolidation::None => (self.callback)(reply),
            EffectiveConsolidation::Monotonic => {
                let key = reply.key().to_string();
                let ts = reply.timestamp();
                let mut seen = self.monotonic_seen.lock().unwrap();
                let deliver = match (seen.get(&key), ts) {
                    (None, _) => true,
                    (Some(_), None) => true,
                    (Some(None), Some(_)) => true,
                    (Some(Some(prev)), Some(cur)) => cur > *prev,
                };
                if deliver {
                    seen.insert(key, ts);
                    drop(seen);
                    (self.callback)(reply);
                }
            }
            EffectiveConsolidation::Latest => {
                let key = reply.key().to_string();
                let ts = reply.timestamp();
                let mut buf = self.latest_buffer.lock().unwrap();
                // First-wins on ties: drop the incoming reply whenever its
                // timestamp is not strictly newer than the stored one
                // (absent timestamps compare as never newer, matching the
                // original's `<=` drop check on raw timestamp values).
                let drop_incoming = match buf.get(&key) {
                    Some(stored) => ts.is_none() || ts <= stored.timestamp(),
                    None => false,
                };
                if !drop_incoming {
                    buf.insert(key, reply);
                }
            }
        }
    }

    /// One response stream finished. Returns `true` if this was the last
    /// one expected, in which case the caller should cancel the timeout
    /// task (this type has no scheduler write access of its own beyond
    /// the cancellation performed here).
    pub fn on_response_final(&self) -> bool {
        let prev = self.remaining_finals.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            if n == 0 {
                None
            } else {
                Some(n - 1)
            }
        });
        let done = matches!(prev, Ok(1));
        if done {
            self.finalize();
        }
        done
    }

    /// The timeout fired before every expected final arrived.
    pub fn on_timeout(&self) {
        self.finalize();
    }

    fn finalize(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        if matches!(self.consolidation, EffectiveConsolidation::Latest) {
            let mut buf = self.latest_buffer.lock().unwrap();
            while let Some((_, reply)) = buf.pop_first() {
                (self.callback)(reply);
            }
        }
        if let Some(id) = self.timeout_task.lock().unwrap().take() {
            let _ = self.scheduler.remove(id);
        }
        if let Some(done) = self.done_callback.lock().unwrap().take() {
            done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn sample(key: &str, ts: Option<Timestamp>) -> QueryReply {
        QueryReply::Ok(Sample {
            key: key.to_string(),
            payload: Bytes::from_buf(vec![1]),
            encoding: Encoding::default(),
            kind: zenoh_pico_protocol::core::SampleKind::Put,
            timestamp: ts,
            qos: Default::default(),
            attachment: None,
            source_info: None,
        })
    }

    #[test]
    fn none_consolidation_delivers_every_reply_immediately() {
        let scheduler = Scheduler::new(4);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let pq = PendingQuery::new(
            1,
            "a/*".into(),
            EffectiveConsolidation::None,
            1,
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            None,
            scheduler,
        );
        pq.on_reply(sample("a/b", None));
        pq.on_reply(sample("a/b", None));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn latest_consolidation_buffers_until_finalized() {
        let scheduler = Scheduler::new(4);
        let delivered: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let d = delivered.clone();
        let pq = PendingQuery::new(
            1,
            "a/*".into(),
            EffectiveConsolidation::Latest,
            1,
            Box::new(move |r| {
                if let QueryReply::Ok(s) = r {
                    d.lock().unwrap().push(s.key);
                }
            }),
            None,
            scheduler,
        );
        pq.on_reply(sample("a/b", None));
        pq.on_reply(sample("a/c", None));
        assert!(delivered.lock().unwrap().is_empty());
        assert!(pq.on_response_final());
        assert_eq!(delivered.lock().unwrap().len(), 2);
    }

    #[test]
    fn latest_consolidation_keeps_the_later_timestamp_regardless_of_arrival_order() {
        let scheduler = Scheduler::new(4);
        let delivered: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let d = delivered.clone();
        let pq = PendingQuery::new(
            1,
            "a/*".into(),
            EffectiveConsolidation::Latest,
            1,
            Box::new(move |r| {
                if let QueryReply::Ok(s) = r {
                    d.lock().unwrap().push(s.payload.to_vec()[0] as u64);
                }
            }),
            None,
            scheduler,
        );
        let hlc = uhlc::HLC::default();
        let older = hlc.new_timestamp();
        let newer = hlc.new_timestamp();
        let mut first = sample("a/b", Some(newer));
        if let QueryReply::Ok(ref mut s) = first {
            s.payload = Bytes::from_buf(vec![2]);
        }
        pq.on_reply(first);
        let mut second = sample("a/b", Some(older));
        if let QueryReply::Ok(ref mut s) = second {
            s.payload = Bytes::from_buf(vec![1]);
        }
        pq.on_reply(second);
        assert!(pq.on_response_final());
        assert_eq!(delivered.lock().unwrap().as_slice(), &[2]);
    }

    #[test]
    fn err_replies_bypass_consolidation_and_deliver_immediately() {
        let scheduler = Scheduler::new(4);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let pq = PendingQuery::new(
            1,
            "a/*".into(),
            EffectiveConsolidation::Latest,
            1,
            Box::new(move |r| {
                if matches!(r, QueryReply::Err { .. }) {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            }),
            None,
            scheduler,
        );
        pq.on_reply(QueryReply::Err {
            payload: Bytes::from_buf(vec![1]),
            encoding: Encoding::default(),
        });
        pq.on_reply(QueryReply::Err {
            payload: Bytes::from_buf(vec![2]),
            encoding: Encoding::default(),
        });
        // Both Err replies deliver immediately, not just one surviving a
        // shared "" consolidation slot.
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!pq.on_response_final());
    }

    #[test]
    fn monotonic_consolidation_drops_stale_timestamps() {
        let scheduler = Scheduler::new(4);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let pq = PendingQuery::new(
            1,
            "a/*".into(),
            EffectiveConsolidation::Monotonic,
            1,
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            None,
            scheduler,
        );
        let hlc = uhlc::HLC::default();
        let older = hlc.new_timestamp();
        let newer = hlc.new_timestamp();
        pq.on_reply(sample("a/b", Some(newer)));
        pq.on_reply(sample("a/b", Some(older)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_response_final_runs_done_callback_exactly_once() {
        let scheduler = Scheduler::new(4);
        let done_count = Arc::new(AtomicUsize::new(0));
        let d = done_count.clone();
        let pq = PendingQuery::new(
            1,
            "a/*".into(),
            EffectiveConsolidation::None,
            2,
            Box::new(|_| {}),
            Some(Box::new(move || {
                d.fetch_add(1, Ordering::SeqCst);
            })),
            scheduler,
        );
        assert!(!pq.on_response_final());
        assert_eq!(done_count.load(Ordering::SeqCst), 0);
        assert!(pq.on_response_final());
        assert_eq!(done_count.load(Ordering::SeqCst), 1);
        // A timeout racing in after completion must not double-fire.
        pq.on_timeout();
        assert_eq!(done_count.load(Ordering::SeqCst), 1);
    }
}
