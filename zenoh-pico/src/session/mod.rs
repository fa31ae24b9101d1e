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
//! The session engine: resource, subscription, queryable, pending-query,
//! interest and liveliness tables, wired to the transport engine and the
//! periodic scheduler. [`Session`] is the crate's single public entry
//! point; it is a cheap `Arc` handle, so cloning it to hand out to
//! callbacks (as [`queryable::Query`] does) is the idiom, not an
//! exception.
//!
//! **Loopback.** `put`/`delete`/`get` each consult `locality` (allowed
//! origin/destination) and, where it admits [`MessageOrigin::Local`],
//! dispatch directly against the local tables without ever constructing a
//! wire message. Where it admits [`MessageOrigin::Remote`], the same
//! operation is also encoded and handed to the transport.
//!
//! **Lock order.** Table locks are taken and released one at a time, never
//! nested, and never held across a callback invocation or a
//! `transport.send` call — session locks, then transport locks, never
//! held across a callback — reusing the same clone-under-lock-then-release
//! pattern `subscription::SubscriptionEntry` and `queryable::QueryableEntry`
//! already use for callback safety.

pub mod interest;
pub mod liveliness;
pub mod query;
pub mod queryable;
pub mod resource;
pub mod subscription;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use zenoh_pico_collections::Bytes;
use zenoh_pico_keyexpr::{canonicalize, intersects};
use zenoh_pico_protocol::core::{
    ConsolidationMode, Encoding, Locality, MessageOrigin, QoS, QueryTarget, SampleKind, Timestamp,
    WhatAmI, ZenohId,
};
use zenoh_pico_protocol::network::{
    Declare, DeclareBody, DeclareQueryable, DeclareResource, DeclareSubscriber, DeclareToken,
    Interest as WireInterest, InterestMask, Mapping, NetworkMessage, Push, PushPayload, Request,
    RequestPayload, Response, ResponseFinal, ResponsePayload, UndeclareQueryable,
    UndeclareSubscriber, UndeclareToken, WireExpr,
};
use zenoh_pico_protocol::transport::{CloseReason, Reliability};
use zenoh_pico_protocol::zenoh::{
    Delete as WireDelete, Err as WireErr, Put as WirePut, Query as WireQuery, Reply as WireReply,
    ReplyBody, Sample,
};
use zenoh_pico_scheduler::Scheduler;
use zenoh_pico_transport::{LocalIdentity, RxState, Transport};

use crate::config::Config;
use crate::error::{ZError, ZResult};

use interest::{InterestRecord, InterestTable};
use liveliness::LivelinessTable;
use query::{DoneCallback as QueryDoneCallback, PendingQuery, QueryReply, ReplyCallback};
use queryable::{Query, QueryCallback, QueryableEntry};
use resource::{ResourceTable, TableResolver};
use subscription::{DataCallback, DropCallback as SubDropCallback, SubscriptionEntry};

pub use queryable::DropCallback as QueryableDropCallback;

pub struct SessionInner {
    pub zid: ZenohId,
    lease_millis: u64,
    resources_local: Mutex<ResourceTable>,
    resources_remote: Mutex<ResourceTable>,
    subscriptions: Mutex<HashMap<u32, Arc<SubscriptionEntry>>>,
    queryables: Mutex<HashMap<u32, Arc<QueryableEntry>>>,
    pending_queries: Mutex<HashMap<u32, Arc<PendingQuery>>>,
    interests: Mutex<InterestTable>,
    liveliness: Mutex<LivelinessTable>,
    next_entity_id: AtomicU32,
    next_query_id: AtomicU32,
    transport: Mutex<Option<Arc<Transport>>>,
    rx: Mutex<Option<RxState>>,
    scheduler: Arc<Scheduler>,
    hlc: uhlc::HLC,
}

/// A cheap, cloneable handle to an open (or not-yet-connected) session.
/// Every clone refers to the same underlying tables.
#[derive(Clone)]
pub struct Session(Arc<SessionInner>);

impl Session {
    /// Builds a session bound to `link`, completing the transport handshake
    /// before returning. Leaves keep-alive, lease and RX loop unstarted;
    /// call [`Session::spawn_io_threads`] for the multi-threaded build or
    /// drive [`Session::read`]/[`Session::send_keep_alive`]/
    /// [`Session::scheduler_tick`] explicitly for the single-threaded one.
    pub fn open(config: &Config, link: Arc<dyn zenoh_pico_link::Link>) -> ZResult<Self> {
        Self::open_with_clock(config, link, Arc::new(zenoh_pico_link::MonotonicSystemClock::new()))
    }

    pub fn open_with_clock(
        config: &Config,
        link: Arc<dyn zenoh_pico_link::Link>,
        clock: Arc<dyn zenoh_pico_link::SystemClock>,
    ) -> ZResult<Self> {
        let zid = config.zid();
        let local = LocalIdentity {
            whatami: config.whatami(),
            zid,
            sn_resolution: config.sn_resolution(),
            batch_size: config.batch_size(),
            qos_enabled: false,
            lease: config.lease(),
        };
        let (transport, rx) = if local.whatami == WhatAmI::Client || config.connect_endpoint().is_some() {
            Transport::connect(link, local, clock)?
        } else {
            Transport::accept(link, local, clock)?
        };
        let inner = SessionInner {
            zid,
            lease_millis: config.lease().millis,
            resources_local: Mutex::new(ResourceTable::new()),
            resources_remote: Mutex::new(ResourceTable::new()),
            subscriptions: Mutex::new(HashMap::new()),
            queryables: Mutex::new(HashMap::new()),
            pending_queries: Mutex::new(HashMap::new()),
            interests: Mutex::new(InterestTable::new()),
            liveliness: Mutex::new(LivelinessTable::new()),
            next_entity_id: AtomicU32::new(1),
            next_query_id: AtomicU32::new(1),
            transport: Mutex::new(Some(transport)),
            rx: Mutex::new(Some(rx)),
            scheduler: Scheduler::new(zenoh_pico_scheduler::DEFAULT_MAX_TASKS),
            hlc: uhlc::HLC::default(),
        };
        Ok(Session(Arc::new(inner)))
    }

    /// A session with no transport at all: every operation still works
    /// against the loopback path, only `Locality::Remote`/`Any` sends are
    /// silently skipped. Used by tests exercising the session tables
    /// without a link.
    pub fn open_loopback_only(config: &Config) -> Self {
        let zid = config.zid();
        let inner = SessionInner {
            zid,
            lease_millis: config.lease().millis,
            resources_local: Mutex::new(ResourceTable::new()),
            resources_remote: Mutex::new(ResourceTable::new()),
            subscriptions: Mutex::new(HashMap::new()),
            queryables: Mutex::new(HashMap::new()),
            pending_queries: Mutex::new(HashMap::new()),
            interests: Mutex::new(InterestTable::new()),
            liveliness: Mutex::new(LivelinessTable::new()),
            next_entity_id: AtomicU32::new(1),
            next_query_id: AtomicU32::new(1),
            transport: Mutex::new(None),
            rx: Mutex::new(None),
            scheduler: Scheduler::new(zenoh_pico_scheduler::DEFAULT_MAX_TASKS),
            hlc: uhlc::HLC::default(),
        };
        Session(Arc::new(inner))
    }

    pub fn zid(&self) -> ZenohId {
        self.0.zid
    }

    pub fn close(&self) -> ZResult<()> {
        self.0.scheduler.stop();
        if let Some(t) = self.0.transport.lock().unwrap().take() {
            t.close(CloseReason::Generic)?;
        }
        Ok(())
    }

    /// Registers the transport's keep-alive and lease watchdogs, starts the
    /// scheduler's background thread, and spawns a dedicated RX loop thread
    /// — the multi-threaded building-block, as opposed to driving `read`/
    /// `send_keep_alive`/`scheduler_tick` by hand.
    pub fn spawn_io_threads(&self) -> ZResult<()> {
        let transport = self.0.transport.lock().unwrap().clone();
        if let Some(t) = transport {
            t.spawn_keep_alive_task(&self.0.scheduler, self.0.lease_millis)?;
            t.spawn_lease_task(&self.0.scheduler, self.0.lease_millis)?;
        }
        self.0.scheduler.spawn();
        let session = self.clone();
        std::thread::Builder::new()
            .name("zenoh-pico-rx".into())
            .spawn(move || loop {
                match session.read() {
                    Ok(_) => {}
                    Err(e) => {
                        debug!("rx loop stopping: {e}");
                        break;
                    }
                }
            })
            .map_err(|_| ZError::Resource("failed to spawn rx thread".into()))?;
        Ok(())
    }

    /// Single-threaded entry point: reads and dispatches exactly one
    /// framed record, returning how many network messages it yielded.
    pub fn read(&self) -> ZResult<usize> {
        let transport = self.0.transport.lock().unwrap().clone();
        let Some(t) = transport else { return Ok(0) };
        let mut rx_guard = self.0.rx.lock().unwrap();
        let Some(rx) = rx_guard.as_mut() else { return Ok(0) };
        let delivered = t.recv_one(rx)?;
        drop(rx_guard);
        let n = delivered.messages.len();
        for m in delivered.messages {
            self.handle_rx_message(m);
        }
        Ok(n)
    }

    pub fn send_keep_alive(&self) -> ZResult<()> {
        if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
            t.send_keep_alive()?;
        }
        Ok(())
    }

    pub fn scheduler_tick(&self) -> usize {
        self.0.scheduler.tick()
    }

    // -- Resources -----------------------------------------------------

    /// Registers `key` in the local resource table, assigning a fresh scope
    /// id if it isn't already known, and advertises it to the peer. This is
    /// idempotent: a key already declared returns its existing id without
    /// sending anything.
    pub fn declare_resource(&self, key: &str) -> ZResult<u16> {
        let key = canonicalize(key)?;
        let mut table = self.0.resources_local.lock().unwrap();
        if let Some(id) = table.id_of(&key) {
            return Ok(id);
        }
        let id = table
            .insert_new(key.clone())
            .ok_or_else(|| ZError::Resource("local resource table exhausted".into()))?;
        drop(table);
        self.send_best_effort_declare(DeclareBody::Resource(DeclareResource {
            id,
            key: WireExpr::from_suffix(key),
        }));
        Ok(id)
    }

    /// Drops `id` from the local resource table. There is no wire message
    /// for this: the real protocol never retracts a scope mapping, it only
    /// lets it become unused, so this is purely local bookkeeping.
    pub fn undeclare_resource(&self, id: u16) -> ZResult<()> {
        self.0.resources_local.lock().unwrap().remove(id);
        Ok(())
    }

    // -- Subscriptions ---------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn declare_subscriber(
        &self,
        key: &str,
        allowed_origin: Locality,
        cache_capacity: usize,
        callback: DataCallback,
        drop_callback: Option<SubDropCallback>,
    ) -> ZResult<u32> {
        let key = canonicalize(key)?;
        let id = self.0.next_entity_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(SubscriptionEntry::new(
            id,
            key.clone(),
            key.clone(),
            allowed_origin,
            callback,
            drop_callback,
            cache_capacity,
        ));
        self.0.subscriptions.lock().unwrap().insert(id, entry);
        if allowed_origin.admits(MessageOrigin::Remote) {
            self.send_best_effort_declare(DeclareBody::Subscriber(DeclareSubscriber {
                id,
                key: WireExpr::from_suffix(key),
            }));
        }
        Ok(id)
    }

    pub fn undeclare_subscriber(&self, id: u32) -> ZResult<()> {
        let removed = self.0.subscriptions.lock().unwrap().remove(&id);
        if let Some(entry) = removed {
            self.send_best_effort_declare(DeclareBody::UndeclSubscriber(UndeclareSubscriber {
                id,
                key: WireExpr::from_suffix(entry.key.clone()),
            }));
        }
        Ok(())
    }

    pub fn cached_samples(&self, subscriber_id: u32) -> Vec<Sample> {
        self.0
            .subscriptions
            .lock()
            .unwrap()
            .get(&subscriber_id)
            .map(|e| e.cached_samples())
            .unwrap_or_default()
    }

    /// Whether any known subscriber (local or, once advertised, remote)
    /// matches `key` — the publisher-side half of the matching-status
    /// query.
    pub fn has_matching_subscribers(&self, key: &str) -> bool {
        self.0
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .any(|s| intersects(&s.key, key).unwrap_or(false))
    }

    // -- Queryables ------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn declare_queryable(
        &self,
        key: &str,
        complete: bool,
        allowed_origin: Locality,
        callback: QueryCallback,
        drop_callback: Option<QueryableDropCallback>,
    ) -> ZResult<u32> {
        let key = canonicalize(key)?;
        let id = self.0.next_entity_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(QueryableEntry::new(
            id,
            key.clone(),
            key.clone(),
            complete,
            allowed_origin,
            callback,
            drop_callback,
        ));
        self.0.queryables.lock().unwrap().insert(id, entry);
        if allowed_origin.admits(MessageOrigin::Remote) {
            self.send_best_effort_declare(DeclareBody::Queryable(DeclareQueryable {
                id,
                key: WireExpr::from_suffix(key),
                complete,
            }));
        }
        Ok(id)
    }

    pub fn undeclare_queryable(&self, id: u32) -> ZResult<()> {
        let removed = self.0.queryables.lock().unwrap().remove(&id);
        if let Some(entry) = removed {
            self.send_best_effort_declare(DeclareBody::UndeclQueryable(UndeclareQueryable {
                id,
                key: WireExpr::from_suffix(entry.key.clone()),
            }));
        }
        Ok(())
    }

    pub fn has_matching_queryables(&self, key: &str) -> bool {
        self.0
            .queryables
            .lock()
            .unwrap()
            .values()
            .any(|q| intersects(&q.key, key).unwrap_or(false))
    }

    // -- Liveliness ------------------------------------------------------

    pub fn declare_token(&self, key: &str) -> ZResult<u32> {
        let key = canonicalize(key)?;
        let id = self.0.liveliness.lock().unwrap().declare_local(key.clone());
        self.send_best_effort_declare(DeclareBody::Token(DeclareToken {
            id,
            key: WireExpr::from_suffix(key),
        }));
        Ok(id)
    }

    pub fn undeclare_token(&self, id: u32) -> ZResult<()> {
        let removed = self.0.liveliness.lock().unwrap().undeclare_local(id);
        if let Some(key) = removed {
            self.send_best_effort_declare(DeclareBody::UndeclToken(UndeclareToken {
                id,
                key: WireExpr::from_suffix(key),
            }));
        }
        Ok(())
    }

    pub fn is_alive(&self, key: &str) -> bool {
        self.0.liveliness.lock().unwrap().is_alive(key)
    }

    // -- Interests ---------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn declare_interest(
        &self,
        key: Option<&str>,
        mask: InterestMask,
        restricted: bool,
        current: bool,
        future: bool,
        aggregate: bool,
    ) -> ZResult<u32> {
        let key = key.map(canonicalize).transpose()?;
        let id = self.0.interests.lock().unwrap().register_local(
            key.clone(),
            mask,
            restricted,
            current,
            future,
            aggregate,
        );
        if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
            let msg = NetworkMessage::Interest(WireInterest {
                id,
                key: key.map(WireExpr::from_suffix),
                mask,
                restricted,
                current,
                future,
                aggregate,
            });
            t.send(&msg, Reliability::Reliable)?;
        }
        Ok(id)
    }

    pub fn undeclare_interest(&self, id: u32) -> ZResult<()> {
        self.0.interests.lock().unwrap().remove(id);
        Ok(())
    }

    // -- Data plane --------------------------------------------------------

    pub fn put(&self, key: &str, payload: Vec<u8>, encoding: Option<Encoding>, locality: Locality) -> ZResult<()> {
        let key = canonicalize(key)?;
        let timestamp = Some(self.0.hlc.new_timestamp());
        if locality.admits(MessageOrigin::Local) {
            let sample = Sample {
                key: key.clone(),
                payload: Bytes::from_buf(payload.clone()),
                encoding: encoding.clone().unwrap_or_default(),
                kind: SampleKind::Put,
                timestamp,
                qos: QoS::default(),
                attachment: None,
                source_info: None,
            };
            self.dispatch_to_subscriptions(sample, MessageOrigin::Local);
        }
        if locality.admits(MessageOrigin::Remote) {
            if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
                let msg = NetworkMessage::Push(Push {
                    key: WireExpr::from_suffix(key),
                    qos: QoS::default(),
                    timestamp,
                    payload: PushPayload::Put(WirePut {
                        encoding,
                        timestamp,
                        source_info: None,
                        attachment: None,
                        payload: Bytes::from_buf(payload),
                    }),
                });
                t.send(&msg, Reliability::Reliable)?;
            }
        }
        Ok(())
    }

    pub fn delete(&self, key: &str, locality: Locality) -> ZResult<()> {
        let key = canonicalize(key)?;
        let timestamp = Some(self.0.hlc.new_timestamp());
        if locality.admits(MessageOrigin::Local) {
            let sample = Sample {
                key: key.clone(),
                payload: Bytes::empty(),
                encoding: Encoding::default(),
                kind: SampleKind::Delete,
                timestamp,
                qos: QoS::default(),
                attachment: None,
                source_info: None,
            };
            self.dispatch_to_subscriptions(sample, MessageOrigin::Local);
        }
        if locality.admits(MessageOrigin::Remote) {
            if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
                let msg = NetworkMessage::Push(Push {
                    key: WireExpr::from_suffix(key),
                    qos: QoS::default(),
                    timestamp,
                    payload: PushPayload::Delete(WireDelete {
                        timestamp,
                        source_info: None,
                        attachment: None,
                    }),
                });
                t.send(&msg, Reliability::Reliable)?;
            }
        }
        Ok(())
    }

    /// Issues a query. Matching local queryables are invoked synchronously
    /// before this call returns; remote matches (if `locality` admits
    /// them) arrive later through [`Session::read`]/the RX thread. Returns
    /// the request id.
    #[allow(clippy::too_many_arguments)]
    pub fn get(
        &self,
        key_pattern: &str,
        parameters: Vec<u8>,
        target: QueryTarget,
        consolidation: ConsolidationMode,
        timeout_ms: u64,
        locality: Locality,
        callback: ReplyCallback,
        done_callback: Option<QueryDoneCallback>,
    ) -> ZResult<u32> {
        let key = canonicalize(key_pattern)?;
        let request_id = self.0.next_query_id.fetch_add(1, Ordering::Relaxed);
        let params_bytes = Bytes::from_buf(parameters);

        let local_matches: Vec<Arc<QueryableEntry>> = if locality.admits(MessageOrigin::Local) {
            self.0
                .queryables
                .lock()
                .unwrap()
                .values()
                .filter(|q| q.allowed_origin.admits(MessageOrigin::Local) && intersects(&q.key, &key).unwrap_or(false))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        let remote_expected = u32::from(locality.admits(MessageOrigin::Remote));
        let expected = local_matches.len() as u32 + remote_expected;

        let pending = PendingQuery::new(
            request_id,
            key.clone(),
            consolidation.effective(),
            expected.max(1),
            callback,
            done_callback,
            self.0.scheduler.clone(),
        );

        if expected == 0 {
            pending.on_timeout();
            return Ok(request_id);
        }

        self.0.pending_queries.lock().unwrap().insert(request_id, pending.clone());
        self.arm_query_timeout(request_id, &pending, timeout_ms);

        if remote_expected == 1 {
            if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
                let msg = NetworkMessage::Request(Request {
                    id: request_id,
                    key: WireExpr::from_suffix(key.clone()),
                    target,
                    payload: RequestPayload::Query(WireQuery {
                        consolidation: Some(consolidation),
                        parameters: Some(params_bytes),
                        source_info: None,
                        value: None,
                        attachment: None,
                    }),
                });
                if let Err(e) = t.send(&msg, Reliability::Reliable) {
                    warn!("failed to send Request {request_id}: {e}");
                }
            }
        }

        for q in local_matches {
            let query = Query {
                request_id,
                key: key.clone(),
                parameters: params_bytes.clone(),
                origin: MessageOrigin::Local,
                session: self.clone(),
                finalized: std::sync::atomic::AtomicBool::new(false),
            };
            q.dispatch(query);
        }

        Ok(request_id)
    }

    /// Registers the one-shot-via-self-cancel timeout task:
    /// `Scheduler::add` with `period_ms == 0` fires immediately rather than
    /// after a delay, so a genuine "fire once after `timeout_ms`" needs a
    /// recurring registration that cancels itself on its first execution.
    fn arm_query_timeout(&self, request_id: u32, pending: &Arc<PendingQuery>, timeout_ms: u64) {
        let weak_inner = Arc::downgrade(&self.0);
        let scheduler = self.0.scheduler.clone();
        let scheduler_for_cb = scheduler.clone();
        let self_id: Arc<Mutex<Option<zenoh_pico_scheduler::TaskId>>> = Arc::new(Mutex::new(None));
        let self_id_cb = self_id.clone();
        let task = scheduler.add(timeout_ms.max(1), move || {
            if let Some(inner) = weak_inner.upgrade() {
                if let Some(pq) = inner.pending_queries.lock().unwrap().remove(&request_id) {
                    pq.on_timeout();
                }
            }
            if let Some(id) = self_id_cb.lock().unwrap().take() {
                let _ = scheduler_for_cb.remove(id);
            }
        });
        if let Ok(id) = task {
            *self_id.lock().unwrap() = Some(id);
            pending.set_timeout_task(id);
        }
    }

    // -- Reply routing (used by `queryable::Query`) -------------------------

    pub(crate) fn send_reply_put(
        &self,
        request_id: u32,
        origin: MessageOrigin,
        key: &str,
        payload: Vec<u8>,
        encoding: Option<Encoding>,
        timestamp: Option<Timestamp>,
    ) -> ZResult<()> {
        let ts = timestamp.or_else(|| Some(self.0.hlc.new_timestamp()));
        match origin {
            MessageOrigin::Local => {
                if let Some(pq) = self.0.pending_queries.lock().unwrap().get(&request_id).cloned() {
                    pq.on_reply(QueryReply::Ok(Sample {
                        key: key.to_string(),
                        payload: Bytes::from_buf(payload),
                        encoding: encoding.unwrap_or_default(),
                        kind: SampleKind::Put,
                        timestamp: ts,
                        qos: QoS::default(),
                        attachment: None,
                        source_info: None,
                    }));
                }
                Ok(())
            }
            MessageOrigin::Remote => {
                if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
                    let msg = NetworkMessage::Response(Response {
                        request_id,
                        key: WireExpr::from_suffix(key),
                        payload: ResponsePayload::Reply(WireReply {
                            consolidation: None,
                            body: ReplyBody::Put(WirePut {
                                encoding,
                                timestamp: ts,
                                source_info: None,
                                attachment: None,
                                payload: Bytes::from_buf(payload),
                            }),
                        }),
                    });
                    t.send(&msg, Reliability::Reliable)?;
                }
                Ok(())
            }
        }
    }

    pub(crate) fn send_reply_delete(&self, request_id: u32, origin: MessageOrigin, key: &str) -> ZResult<()> {
        let ts = Some(self.0.hlc.new_timestamp());
        match origin {
            MessageOrigin::Local => {
                if let Some(pq) = self.0.pending_queries.lock().unwrap().get(&request_id).cloned() {
                    pq.on_reply(QueryReply::Ok(Sample {
                        key: key.to_string(),
                        payload: Bytes::empty(),
                        encoding: Encoding::default(),
                        kind: SampleKind::Delete,
                        timestamp: ts,
                        qos: QoS::default(),
                        attachment: None,
                        source_info: None,
                    }));
                }
                Ok(())
            }
            MessageOrigin::Remote => {
                if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
                    let msg = NetworkMessage::Response(Response {
                        request_id,
                        key: WireExpr::from_suffix(key),
                        payload: ResponsePayload::Reply(WireReply {
                            consolidation: None,
                            body: ReplyBody::Delete(WireDelete {
                                timestamp: ts,
                                source_info: None,
                                attachment: None,
                            }),
                        }),
                    });
                    t.send(&msg, Reliability::Reliable)?;
                }
                Ok(())
            }
        }
    }

    pub(crate) fn send_reply_err(&self, request_id: u32, origin: MessageOrigin, payload: Vec<u8>) -> ZResult<()> {
        match origin {
            MessageOrigin::Local => {
                if let Some(pq) = self.0.pending_queries.lock().unwrap().get(&request_id).cloned() {
                    pq.on_reply(QueryReply::Err {
                        payload: Bytes::from_buf(payload),
                        encoding: Encoding::default(),
                    });
                }
                Ok(())
            }
            MessageOrigin::Remote => {
                if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
                    let msg = NetworkMessage::Response(Response {
                        request_id,
                        key: WireExpr::from_suffix(""),
                        payload: ResponsePayload::Err(WireErr {
                            encoding: None,
                            source_info: None,
                            payload: Bytes::from_buf(payload),
                        }),
                    });
                    t.send(&msg, Reliability::Reliable)?;
                }
                Ok(())
            }
        }
    }

    pub(crate) fn send_response_final(&self, request_id: u32, origin: MessageOrigin) -> ZResult<()> {
        match origin {
            MessageOrigin::Local => {
                self.finish_pending(request_id);
                Ok(())
            }
            MessageOrigin::Remote => {
                if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
                    t.send(&NetworkMessage::ResponseFinal(ResponseFinal { request_id }), Reliability::Reliable)?;
                }
                Ok(())
            }
        }
    }

    fn finish_pending(&self, request_id: u32) {
        let done = self
            .0
            .pending_queries
            .lock()
            .unwrap()
            .get(&request_id)
            .map(|pq| pq.on_response_final())
            .unwrap_or(false);
        if done {
            self.0.pending_queries.lock().unwrap().remove(&request_id);
        }
    }

    // -- RX dispatch ---------------------------------------------------------

    fn dispatch_to_subscriptions(&self, sample: Sample, origin: MessageOrigin) {
        let matches: Vec<Arc<SubscriptionEntry>> = {
            self.0
                .subscriptions
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.allowed_origin.admits(origin))
                .filter(|s| intersects(&s.key, &sample.key).unwrap_or(false))
                .cloned()
                .collect()
        };
        for s in matches {
            s.dispatch(sample.clone());
        }
    }

    fn resolve_wire_key(&self, key: &WireExpr, origin: MessageOrigin) -> ZResult<String> {
        // A `Sender`-mapped scope id was minted by whoever produced this
        // message; for a message that arrived over the link that is the
        // peer, so it resolves against our remote-resource table (the ids
        // we learned from the peer's own `DeclareResource`s). A
        // `Receiver`-mapped scope indexes the table of whoever is about to
        // consume the message, i.e. our own local table. This is a
        // simplification of full bidirectional scope accounting, adequate
        // for the single-peer, non-routing core this crate implements.
        let use_local = match (key.mapping, origin) {
            (Mapping::Sender, MessageOrigin::Remote) => false,
            (Mapping::Sender, MessageOrigin::Local) => true,
            (Mapping::Receiver, MessageOrigin::Remote) => true,
            (Mapping::Receiver, MessageOrigin::Local) => false,
        };
        let table = if use_local {
            &self.0.resources_local
        } else {
            &self.0.resources_remote
        };
        let guard = table.lock().unwrap();
        zenoh_pico_keyexpr::resolve(key.scope, key.suffix.as_deref(), &TableResolver(&guard))
            .ok_or_else(|| ZError::Resource(format!("unknown resource scope id {}", key.scope)))
    }

    fn handle_rx_message(&self, msg: NetworkMessage) {
        match msg {
            NetworkMessage::Declare(d) => self.handle_remote_declare(d),
            NetworkMessage::Push(p) => self.handle_remote_push(p),
            NetworkMessage::Request(r) => self.handle_remote_request(r),
            NetworkMessage::Response(r) => self.handle_remote_response(r),
            NetworkMessage::ResponseFinal(f) => self.finish_pending(f.request_id),
            NetworkMessage::Interest(i) => self.handle_remote_interest(i),
        }
    }

    fn handle_remote_declare(&self, d: Declare) {
        match d.body {
            DeclareBody::Resource(r) | DeclareBody::Keyexpr(r) => {
                if let Ok(key) = self.resolve_wire_key(&r.key, MessageOrigin::Remote) {
                    self.0.resources_remote.lock().unwrap().insert_with_id(r.id, key);
                }
            }
            DeclareBody::Token(t) => {
                if let Ok(key) = self.resolve_wire_key(&t.key, MessageOrigin::Remote) {
                    self.0.liveliness.lock().unwrap().insert_remote(t.id, key);
                }
            }
            DeclareBody::UndeclToken(t) => {
                self.0.liveliness.lock().unwrap().remove_remote(t.id);
            }
            // Remote subscriber/queryable advertisements have no routing
            // table to feed in this core (spec: routing table is a
            // Non-goal); they're observed only for diagnostics.
            DeclareBody::Subscriber(s) => debug!("peer declared subscriber {} ", s.id),
            DeclareBody::UndeclSubscriber(s) => debug!("peer undeclared subscriber {}", s.id),
            DeclareBody::Queryable(q) => debug!("peer declared queryable {}", q.id),
            DeclareBody::UndeclQueryable(q) => debug!("peer undeclared queryable {}", q.id),
        }
    }

    fn handle_remote_push(&self, p: Push) {
        let Ok(key) = self.resolve_wire_key(&p.key, MessageOrigin::Remote) else {
            warn!("dropping Push with unresolvable key");
            return;
        };
        let sample = match p.payload {
            PushPayload::Put(put) => Sample {
                key,
                payload: put.payload,
                encoding: put.encoding.unwrap_or_default(),
                kind: SampleKind::Put,
                timestamp: put.timestamp,
                qos: p.qos,
                attachment: put.attachment,
                source_info: put.source_info,
            },
            PushPayload::Delete(del) => Sample {
                key,
                payload: Bytes::empty(),
                encoding: Encoding::default(),
                kind: SampleKind::Delete,
                timestamp: del.timestamp,
                qos: p.qos,
                attachment: del.attachment,
                source_info: del.source_info,
            },
        };
        self.dispatch_to_subscriptions(sample, MessageOrigin::Remote);
    }

    fn handle_remote_request(&self, r: Request) {
        let Ok(key) = self.resolve_wire_key(&r.key, MessageOrigin::Remote) else {
            warn!("dropping Request with unresolvable key");
            return;
        };
        let RequestPayload::Query(q) = r.payload else {
            // Reliability-acking Put/Delete payloads are a router-only
            // concern this core doesn't implement (no routing table).
            return;
        };
        let matches: Vec<Arc<QueryableEntry>> = self
            .0
            .queryables
            .lock()
            .unwrap()
            .values()
            .filter(|qbl| qbl.allowed_origin.admits(MessageOrigin::Remote) && intersects(&qbl.key, &key).unwrap_or(false))
            .cloned()
            .collect();

        if matches.is_empty() {
            let _ = self.send_response_final(r.id, MessageOrigin::Remote);
            return;
        }

        let parameters = q.parameters.unwrap_or_else(Bytes::empty);
        for qbl in matches {
            let query = Query {
                request_id: r.id,
                key: key.clone(),
                parameters: parameters.clone(),
                origin: MessageOrigin::Remote,
                session: self.clone(),
                finalized: std::sync::atomic::AtomicBool::new(false),
            };
            qbl.dispatch(query);
        }
    }

    fn handle_remote_response(&self, r: Response) {
        let Some(pq) = self.0.pending_queries.lock().unwrap().get(&r.request_id).cloned() else {
            return;
        };
        let key = self.resolve_wire_key(&r.key, MessageOrigin::Remote).unwrap_or_default();
        match r.payload {
            ResponsePayload::Reply(reply) => {
                let sample = match reply.body {
                    ReplyBody::Put(put) => Sample {
                        key,
                        payload: put.payload,
                        encoding: put.encoding.unwrap_or_default(),
                        kind: SampleKind::Put,
                        timestamp: put.timestamp,
                        qos: QoS::default(),
                        attachment: put.attachment,
                        source_info: put.source_info,
                    },
                    ReplyBody::Delete(del) => Sample {
                        key,
                        payload: Bytes::empty(),
                        encoding: Encoding::default(),
                        kind: SampleKind::Delete,
                        timestamp: del.timestamp,
                        qos: QoS::default(),
                        attachment: del.attachment,
                        source_info: del.source_info,
                    },
                };
                pq.on_reply(QueryReply::Ok(sample));
            }
            ResponsePayload::Err(e) => {
                pq.on_reply(QueryReply::Err {
                    payload: e.payload,
                    encoding: e.encoding.unwrap_or_default(),
                });
            }
        }
    }

    fn handle_remote_interest(&self, i: WireInterest) {
        if i.current {
            let declares = self.collect_current_declarations(&i);
            if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
                for body in declares {
                    let msg = NetworkMessage::Declare(Declare {
                        body,
                        timestamp: None,
                        interest_id: Some(i.id),
                    });
                    let _ = t.send(&msg, Reliability::Reliable);
                }
            }
        }
        if i.future {
            self.0.interests.lock().unwrap().insert_remote(InterestRecord {
                id: i.id,
                key: i.key.as_ref().and_then(|k| k.suffix.clone()),
                mask: i.mask,
                restricted: i.restricted,
                current: i.current,
                future: i.future,
                aggregate: i.aggregate,
                origin: MessageOrigin::Remote,
            });
        }
    }

    fn collect_current_declarations(&self, i: &WireInterest) -> Vec<DeclareBody> {
        let mut out = Vec::new();
        if i.mask.contains(InterestMask::SUBSCRIBER) {
            for s in self.0.subscriptions.lock().unwrap().values() {
                out.push(DeclareBody::Subscriber(DeclareSubscriber {
                    id: s.id,
                    key: WireExpr::from_suffix(s.key.clone()),
                }));
            }
        }
        if i.mask.contains(InterestMask::QUERYABLE) {
            for q in self.0.queryables.lock().unwrap().values() {
                out.push(DeclareBody::Queryable(DeclareQueryable {
                    id: q.id,
                    key: WireExpr::from_suffix(q.key.clone()),
                    complete: q.complete,
                }));
            }
        }
        if i.mask.contains(InterestMask::TOKEN) {
            for (id, key) in self.0.liveliness.lock().unwrap().local_iter() {
                out.push(DeclareBody::Token(DeclareToken {
                    id: *id,
                    key: WireExpr::from_suffix(key.clone()),
                }));
            }
        }
        out
    }

    fn send_best_effort_declare(&self, body: DeclareBody) {
        if let Some(t) = self.0.transport.lock().unwrap().as_ref() {
            let msg = NetworkMessage::Declare(Declare {
                body,
                timestamp: None,
                interest_id: None,
            });
            if let Err(e) = t.send(&msg, Reliability::Reliable) {
                warn!("failed to send Declare: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    fn cfg() -> Config {
        Config::new()
    }

    #[test]
    fn declare_resource_is_idempotent() {
        let session = Session::open_loopback_only(&cfg());
        let a = session.declare_resource("a/b").unwrap();
        let b = session.declare_resource("a/b").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn put_loopback_reaches_a_matching_subscriber() {
        let session = Session::open_loopback_only(&cfg());
        let received: Arc<StdMutex<Vec<Vec<u8>>>> = Arc::new(StdMutex::new(Vec::new()));
        let r = received.clone();
        session
            .declare_subscriber(
                "a/b",
                Locality::Any,
                0,
                Box::new(move |sample: Sample| {
                    r.lock().unwrap().push(sample.payload.to_vec());
                }),
                None,
            )
            .unwrap();

        session.put("a/b", vec![1, 2, 3], None, Locality::Any).unwrap();
        assert_eq!(received.lock().unwrap().as_slice(), [vec![1u8, 2, 3]]);
    }

    #[test]
    fn session_local_put_does_not_reach_remote_only_subscriber() {
        let session = Session::open_loopback_only(&cfg());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        session
            .declare_subscriber(
                "a/b",
                Locality::Remote,
                0,
                Box::new(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
                None,
            )
            .unwrap();
        session.put("a/b", vec![1], None, Locality::SessionLocal).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn get_with_no_queryable_and_no_transport_times_out_immediately() {
        let session = Session::open_loopback_only(&cfg());
        let got = Arc::new(AtomicUsize::new(0));
        let g = got.clone();
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        session
            .get(
                "a/*",
                vec![],
                QueryTarget::BestMatching,
                ConsolidationMode::Latest,
                50,
                Locality::SessionLocal,
                Box::new(move |_| {
                    g.fetch_add(1, Ordering::SeqCst);
                }),
                Some(Box::new(move || {
                    d.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        assert_eq!(got.load(Ordering::SeqCst), 0);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_loopback_reaches_a_local_queryable_and_consolidates() {
        let session = Session::open_loopback_only(&cfg());
        session
            .declare_queryable(
                "a/b",
                true,
                Locality::Any,
                Box::new(|q: Query| {
                    q.reply("a/b", vec![9]).unwrap();
                    q.reply_final().unwrap();
                }),
                None,
            )
            .unwrap();

        let replies: Arc<StdMutex<Vec<Vec<u8>>>> = Arc::new(StdMutex::new(Vec::new()));
        let r = replies.clone();
        session
            .get(
                "a/*",
                vec![],
                QueryTarget::BestMatching,
                ConsolidationMode::None,
                1000,
                Locality::SessionLocal,
                Box::new(move |reply| {
                    if let QueryReply::Ok(s) = reply {
                        r.lock().unwrap().push(s.payload.to_vec());
                    }
                }),
                None,
            )
            .unwrap();
        assert_eq!(replies.lock().unwrap().as_slice(), [vec![9u8]]);
    }

    #[test]
    fn two_subscribers_on_the_same_key_both_see_a_put() {
        let session = Session::open_loopback_only(&cfg());
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let (a_cb, b_cb) = (a.clone(), b.clone());
        session
            .declare_subscriber(
                "a/b",
                Locality::Any,
                0,
                Box::new(move |_| {
                    a_cb.fetch_add(1, Ordering::SeqCst);
                }),
                None,
            )
            .unwrap();
        session
            .declare_subscriber(
                "a/*",
                Locality::Any,
                0,
                Box::new(move |_| {
                    b_cb.fetch_add(1, Ordering::SeqCst);
                }),
                None,
            )
            .unwrap();
        session.put("a/b", vec![1], None, Locality::Any).unwrap();
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn latest_consolidation_drops_duplicate_keys_across_two_queryables() {
        let session = Session::open_loopback_only(&cfg());
        for _ in 0..2 {
            session
                .declare_queryable(
                    "a/b",
                    true,
                    Locality::Any,
                    Box::new(|q: Query| {
                        q.reply("a/b", vec![1]).unwrap();
                        q.reply_final().unwrap();
                    }),
                    None,
                )
                .unwrap();
        }
        let replies: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
        let r = replies.clone();
        session
            .get(
                "a/b",
                vec![],
                QueryTarget::All,
                ConsolidationMode::Latest,
                1000,
                Locality::SessionLocal,
                Box::new(move |reply| {
                    if let QueryReply::Ok(s) = reply {
                        r.lock().unwrap().push(s.key);
                    }
                }),
                None,
            )
            .unwrap();
        // Latest consolidation keeps exactly one reply per key even though
        // two queryables answered the same key.
        assert_eq!(replies.lock().unwrap().as_slice(), ["a/b".to_string()]);
    }

    #[test]
    fn undeclaring_a_subscriber_stops_further_dispatch() {
        let session = Session::open_loopback_only(&cfg());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = session
            .declare_subscriber(
                "a/b",
                Locality::Any,
                0,
                Box::new(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
                None,
            )
            .unwrap();
        session.put("a/b", vec![1], None, Locality::Any).unwrap();
        session.undeclare_subscriber(id).unwrap();
        session.put("a/b", vec![2], None, Locality::Any).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scheduler_tick_fires_a_query_timeout_that_was_armed_through_get() {
        let session = Session::open_loopback_only(&cfg());
        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        // No queryable and a locality that still admits Remote: the query
        // must stay pending until its timeout, not resolve synchronously.
        session
            .get(
                "a/*",
                vec![],
                QueryTarget::BestMatching,
                ConsolidationMode::None,
                1,
                Locality::Any,
                Box::new(|_| {}),
                Some(Box::new(move || {
                    d.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 0);
        std::thread::sleep(std::time::Duration::from_millis(5));
        session.scheduler_tick();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
