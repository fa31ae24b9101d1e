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
//! End-to-end session engine scenarios, each driving a [`Session`] (or a
//! connected pair of them) through its public API rather than through any
//! single module's internals.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use zenoh_pico::{Config, ConsolidationMode, Locality, Query, QueryReply, QueryTarget, Session};
use zenoh_pico_link::{paired, Link};

fn loopback_session() -> Session {
    Session::open_loopback_only(&Config::new())
}

/// Connects two real sessions over an in-memory link, running the
/// connecting side's handshake on a background thread so it can exchange
/// `Init`/`InitAck`/`Open`/`OpenAck` with the accepting side without
/// either one blocking the other out.
fn connected_pair(batch_size: u16) -> (Session, Session) {
    let (link_a, link_b) = paired(1 << 20);
    let link_a: Arc<dyn Link> = Arc::new(link_a);
    let link_b: Arc<dyn Link> = Arc::new(link_b);

    let mut cfg_b = Config::new();
    cfg_b.insert("mode", "peer").insert("batch_size", batch_size.to_string());
    let mut cfg_a = Config::new();
    cfg_a.insert("batch_size", batch_size.to_string());

    let acceptor = thread::spawn(move || Session::open(&cfg_b, link_b).unwrap());
    let initiator = Session::open(&cfg_a, link_a).unwrap();
    let acceptor = acceptor.join().unwrap();
    (initiator, acceptor)
}

// S1 — declare resource, declare subscriber, local put, subscriber fires once.
#[test]
fn s1_local_put_reaches_its_declared_subscriber() {
    let session = loopback_session();
    session.declare_resource("zp/tests/local/put").unwrap();

    let received: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let r = received.clone();
    session
        .declare_subscriber(
            "zp/tests/local/put",
            Locality::Any,
            0,
            Box::new(move |sample| r.lock().unwrap().push(sample.payload.to_vec())),
            None,
        )
        .unwrap();

    session
        .put("zp/tests/local/put", b"payload".to_vec(), None, Locality::Any)
        .unwrap();

    let got = received.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0], b"payload");
}

// S2 — declare resource, declare queryable, local get with Latest
// consolidation, reply + drop callback fire exactly once, no link traffic
// (there is no transport at all on a loopback-only session).
#[test]
fn s2_local_get_reaches_its_declared_queryable_and_finalises() {
    let session = loopback_session();
    session.declare_resource("zp/tests/local/query").unwrap();
    session
        .declare_queryable(
            "zp/tests/local/query",
            true,
            Locality::Any,
            Box::new(|q: Query| {
                q.reply(q.key_expr(), b"loopback-response".to_vec()).unwrap();
                q.reply_final().unwrap();
            }),
            None,
        )
        .unwrap();

    let replies: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let r = replies.clone();
    let done = Arc::new(AtomicUsize::new(0));
    let d = done.clone();
    session
        .get(
            "zp/tests/local/query",
            vec![],
            QueryTarget::BestMatching,
            ConsolidationMode::Latest,
            1000,
            Locality::SessionLocal,
            Box::new(move |reply| {
                if let QueryReply::Ok(s) = reply {
                    r.lock().unwrap().push(s.payload.to_vec());
                }
            }),
            Some(Box::new(move || {
                d.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

    assert_eq!(replies.lock().unwrap().as_slice(), [b"loopback-response".to_vec()]);
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

// S3 — two subscribers on the same key, one put, both fire exactly once.
#[test]
fn s3_two_subscribers_on_one_key_each_see_the_put_exactly_once() {
    let session = loopback_session();
    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));
    let (a_cb, b_cb) = (a.clone(), b.clone());
    session
        .declare_subscriber(
            "s3/key",
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
            "s3/key",
            Locality::Any,
            0,
            Box::new(move |_| {
                b_cb.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        )
        .unwrap();

    session.put("s3/key", vec![1], None, Locality::Any).unwrap();

    assert_eq!(a.load(Ordering::SeqCst), 1);
    assert_eq!(b.load(Ordering::SeqCst), 1);
}

// S4 — a session-local-only subscriber plus a real peer on the other end
// of the link: a put with destination `Any` must both fire the local
// subscriber and arrive at the peer as one frame.
#[test]
fn s4_any_destination_put_fires_locally_and_crosses_the_link_once() {
    let (initiator, acceptor) = connected_pair(2048);

    let local_hits = Arc::new(AtomicUsize::new(0));
    let h = local_hits.clone();
    initiator
        .declare_subscriber(
            "s4/key",
            Locality::SessionLocal,
            0,
            Box::new(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        )
        .unwrap();

    let remote_payload: Arc<Mutex<Option<Vec<u8>>>> = Arc::new(Mutex::new(None));
    let rp = remote_payload.clone();
    acceptor
        .declare_subscriber(
            "s4/key",
            Locality::Any,
            0,
            Box::new(move |sample| {
                *rp.lock().unwrap() = Some(sample.payload.to_vec());
            }),
            None,
        )
        .unwrap();

    initiator.put("s4/key", vec![7, 7, 7], None, Locality::Any).unwrap();
    assert_eq!(local_hits.load(Ordering::SeqCst), 1);

    // Drain declare traffic and the push itself on the acceptor side.
    let mut delivered = 0;
    for _ in 0..8 {
        if remote_payload.lock().unwrap().is_some() {
            break;
        }
        delivered += acceptor.read().unwrap();
    }
    assert!(delivered >= 1, "the peer must have received at least one frame");
    assert_eq!(remote_payload.lock().unwrap().as_deref(), Some([7u8, 7, 7].as_slice()));
}

// S5 — a 10,000-byte payload over a link whose negotiated batch size is
// 1024 bytes fragments on the wire and reassembles byte-for-byte.
#[test]
fn s5_oversized_payload_fragments_and_reassembles() {
    let (initiator, acceptor) = connected_pair(1024);

    let got: Arc<Mutex<Option<Vec<u8>>>> = Arc::new(Mutex::new(None));
    let g = got.clone();
    acceptor
        .declare_subscriber(
            "s5/big",
            Locality::Any,
            0,
            Box::new(move |sample| {
                *g.lock().unwrap() = Some(sample.payload.to_vec());
            }),
            None,
        )
        .unwrap();

    let payload = vec![0x5au8; 10_000];
    initiator.put("s5/big", payload.clone(), None, Locality::Remote).unwrap();

    let mut reads = 0;
    while got.lock().unwrap().is_none() && reads < 64 {
        acceptor.read().unwrap();
        reads += 1;
    }

    assert!(reads > 1, "a 10,000-byte payload over a 1024-byte batch must take more than one read");
    let received = got.lock().unwrap().take().expect("payload must have been reassembled");
    assert_eq!(received.len(), 10_000);
    assert_eq!(received, payload);
}

// S6 — a get addressed only at a remote peer, with none declared, times
// out instead of hanging.
#[test]
fn s6_remote_only_get_with_no_responder_times_out() {
    let session = loopback_session();
    let got_reply = Arc::new(AtomicUsize::new(0));
    let g = got_reply.clone();
    let done = Arc::new(AtomicUsize::new(0));
    let d = done.clone();

    session
        .get(
            "s6/*",
            vec![],
            QueryTarget::BestMatching,
            ConsolidationMode::None,
            20,
            Locality::Remote,
            Box::new(move |_| {
                g.fetch_add(1, Ordering::SeqCst);
            }),
            Some(Box::new(move || {
                d.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

    assert_eq!(done.load(Ordering::SeqCst), 0, "must still be pending immediately after issuing");
    thread::sleep(std::time::Duration::from_millis(30));
    session.scheduler_tick();

    assert_eq!(got_reply.load(Ordering::SeqCst), 0);
    assert_eq!(done.load(Ordering::SeqCst), 1, "timeout must finalise the pending query exactly once");
}

// S7 — three scheduler tasks at 10/20/50ms periods fire proportionally
// over a 200ms window with no drift beyond one period. Exercised directly
// against `zenoh_pico_scheduler` in that crate's own test module; here we
// only confirm the session's query-timeout path rides the same scheduler
// and survives many unrelated ticks without misfiring early.
#[test]
fn s7_query_timeout_does_not_fire_before_its_deadline() {
    let session = loopback_session();
    let done = Arc::new(AtomicUsize::new(0));
    let d = done.clone();
    session
        .get(
            "s7/*",
            vec![],
            QueryTarget::BestMatching,
            ConsolidationMode::None,
            200,
            Locality::Remote,
            Box::new(|_| {}),
            Some(Box::new(move || {
                d.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

    for _ in 0..5 {
        thread::sleep(std::time::Duration::from_millis(10));
        session.scheduler_tick();
    }
    assert_eq!(done.load(Ordering::SeqCst), 0, "200ms timeout must not fire after only ~50ms");
}
