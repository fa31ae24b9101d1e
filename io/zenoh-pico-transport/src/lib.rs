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
//! The TX/RX framing, fragmentation, keep-alive and handshake engine.
//! Sits between `zenoh-pico-link` (the byte-stream contract) and the
//! session engine in the root crate, which owns the resource tables this
//! module knows nothing about.
//!
//! Lock discipline: the TX lock (`Transport::tx`) guards the wbuf and sn
//! counters and must never be held while waiting on the session lock one
//! layer up — this crate never takes any lock but its own, so that
//! invariant is the caller's to keep.

pub mod error;
pub mod framing;
pub mod handshake;
pub mod rx;
pub mod scout;
pub mod tx;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use zenoh_pico_link::Link;
use zenoh_pico_protocol::network::NetworkMessage;
use zenoh_pico_protocol::transport::{Close, CloseReason, Reliability, TransportMessage};
use zenoh_pico_scheduler::{Scheduler, TaskId};

pub use error::{TransportError, TransportResult};
pub use handshake::{LocalIdentity, PeerIdentity};
pub use rx::{Delivered, RxState};
pub use tx::TxState;

/// A single established session over one link. Owns the TX side (shared,
/// mutex-guarded, since any thread may call `send`); the RX side is
/// single-owner state driven by whichever task runs the read loop, so it
/// is handed back to the caller rather than stored here.
pub struct Transport {
    link: Arc<dyn Link>,
    tx: Mutex<TxState>,
    batch_size: u16,
    pub peer: PeerIdentity,
    last_rx_ms: AtomicU64,
    clock: Arc<dyn zenoh_pico_link::SystemClock>,
    closed: AtomicBool,
}

impl Transport {
    pub fn connect(
        link: Arc<dyn Link>,
        local: LocalIdentity,
        clock: Arc<dyn zenoh_pico_link::SystemClock>,
    ) -> TransportResult<(Arc<Transport>, RxState)> {
        let (peer, tx, rx) = handshake::connect(link.as_ref(), &local)?;
        Ok((Self::new(link, peer, tx, clock), rx))
    }

    pub fn accept(
        link: Arc<dyn Link>,
        local: LocalIdentity,
        clock: Arc<dyn zenoh_pico_link::SystemClock>,
    ) -> TransportResult<(Arc<Transport>, RxState)> {
        let (peer, tx, rx) = handshake::accept(link.as_ref(), &local)?;
        Ok((Self::new(link, peer, tx, clock), rx))
    }

    fn new(
        link: Arc<dyn Link>,
        peer: PeerIdentity,
        tx: TxState,
        clock: Arc<dyn zenoh_pico_link::SystemClock>,
    ) -> Arc<Transport> {
        let batch_size = peer.batch_size;
        let now = clock.now_ms();
        Arc::new(Transport {
            link,
            tx: Mutex::new(tx),
            batch_size,
            peer,
            last_rx_ms: AtomicU64::new(now),
            clock,
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn send(&self, msg: &NetworkMessage, reliability: Reliability) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::ClosedByPeer(CloseReason::Generic));
        }
        let mut tx = self.tx.lock().unwrap();
        tx.send(self.link.as_ref(), msg, reliability, self.batch_size)
    }

    pub fn send_keep_alive(&self) -> TransportResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        let tx = self.tx.lock().unwrap();
        tx.send_keep_alive(self.link.as_ref())
    }

    pub fn close(&self, reason: CloseReason) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let tx = self.tx.lock().unwrap();
        let result = tx.send_transport_message(self.link.as_ref(), &TransportMessage::Close(Close { reason }));
        let _ = self.link.close();
        result
    }

    /// Reads and decodes exactly one framed transport record from the
    /// link, dispatching it against `rx`. Returns the zero or more
    /// network messages it yielded (a `KeepAlive`, a still-incomplete
    /// fragment, or a dropped stale frame all yield none).
    pub fn recv_one(&self, rx: &mut RxState) -> TransportResult<Delivered> {
        let payload = framing::read_framed(self.link.as_ref(), zenoh_pico_codec::reader::DEFAULT_MAX_LEN)?;
        self.last_rx_ms.store(self.clock.now_ms(), Ordering::Release);
        let mut r = zenoh_pico_codec::reader::Reader::new(&payload);
        let msg = zenoh_pico_codec::transport_codec::read_transport_message(&mut r)?;
        match msg {
            TransportMessage::Frame(f) => rx.on_frame(f),
            TransportMessage::Fragment(f) => rx.on_fragment(f),
            TransportMessage::KeepAlive(_) => Ok(Delivered::default()),
            TransportMessage::Close(c) => {
                self.closed.store(true, Ordering::Release);
                Err(TransportError::ClosedByPeer(c.reason))
            }
            other => {
                warn!("unexpected transport message on an open session: {other:?}");
                Ok(Delivered::default())
            }
        }
    }

    /// True once `lease` has elapsed since the last message of any kind
    /// was received.
    pub fn lease_expired(&self, lease_millis: u64) -> bool {
        let last = self.last_rx_ms.load(Ordering::Acquire);
        self.clock.now_ms().saturating_sub(last) > lease_millis
    }

    /// Registers the keep-alive task on `scheduler`: every `lease/4` this
    /// sends `KeepAlive` on idle links.
    pub fn spawn_keep_alive_task(self: &Arc<Self>, scheduler: &Arc<Scheduler>, lease_millis: u64) -> Result<TaskId, zenoh_pico_scheduler::SchedulerError> {
        let period = (lease_millis / 4).max(1);
        let transport = self.clone();
        scheduler.add(period, move || {
            if transport.is_closed() {
                return;
            }
            if let Err(e) = transport.send_keep_alive() {
                warn!("keep-alive send failed: {e}");
            }
        })
    }

    /// Registers the lease-expiry watchdog: if no message is received
    /// within `lease`, closes the session with reason `Expired`. Checked
    /// every `lease/4` alongside the keep-alive.
    pub fn spawn_lease_task(self: &Arc<Self>, scheduler: &Arc<Scheduler>, lease_millis: u64) -> Result<TaskId, zenoh_pico_scheduler::SchedulerError> {
        let period = (lease_millis / 4).max(1);
        let transport = self.clone();
        scheduler.add(period, move || {
            if transport.is_closed() {
                return;
            }
            if transport.lease_expired(lease_millis) {
                debug!("lease expired for peer {:?}, closing", transport.peer.zid);
                let _ = transport.close(CloseReason::Expired);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenoh_pico_link::{paired, MonotonicSystemClock};
    use zenoh_pico_protocol::core::{WhatAmI, ZenohId};
    use zenoh_pico_protocol::network::{Mapping, Push, PushPayload, WireExpr};
    use zenoh_pico_protocol::transport::{Lease, SnResolution};
    use zenoh_pico_protocol::zenoh::Put;

    fn identity() -> LocalIdentity {
        LocalIdentity {
            whatami: WhatAmI::Client,
            zid: ZenohId::rand(),
            sn_resolution: SnResolution::default(),
            batch_size: 2048,
            qos_enabled: false,
            lease: Lease::from_secs(10),
        }
    }

    fn push(payload: Vec<u8>) -> NetworkMessage {
        NetworkMessage::Push(Push {
            key: WireExpr::from_suffix("a/b"),
            qos: Default::default(),
            timestamp: None,
            payload: PushPayload::Put(Put {
                encoding: None,
                timestamp: None,
                source_info: None,
                attachment: None,
                payload: zenoh_pico_collections::Bytes::from_buf(payload),
            }),
        })
    }

    #[test]
    fn send_then_recv_delivers_the_same_message() {
        let (client_link, server_link): (Arc<dyn Link>, Arc<dyn Link>) = {
            let (a, b) = paired(8192);
            (Arc::new(a), Arc::new(b))
        };
        let clock: Arc<dyn zenoh_pico_link::SystemClock> = Arc::new(MonotonicSystemClock::new());

        let server_id = identity();
        let server_clock = clock.clone();
        let server_link2 = server_link.clone();
        let server = std::thread::spawn(move || Transport::accept(server_link2, server_id, server_clock).unwrap());

        let (client, _client_rx) = Transport::connect(client_link, identity(), clock.clone()).unwrap();
        let (server_transport, mut server_rx) = server.join().unwrap();

        let msg = push(vec![1, 2, 3, 4]);
        client.send(&msg, Reliability::Reliable).unwrap();

        let delivered = server_transport.recv_one(&mut server_rx).unwrap();
        assert_eq!(delivered.messages, vec![msg]);
    }

    #[test]
    fn close_marks_the_transport_closed_and_further_sends_fail() {
        let (a, _b) = paired(4096);
        let a: Arc<dyn Link> = Arc::new(a);
        let clock: Arc<dyn zenoh_pico_link::SystemClock> = Arc::new(MonotonicSystemClock::new());
        let local = identity();
        let transport = Transport::new(a, PeerIdentity {
            whatami: local.whatami,
            zid: local.zid,
            sn_resolution: local.sn_resolution,
            batch_size: local.batch_size,
            lease: local.lease,
        }, TxState::new(local.sn_resolution), clock);

        transport.close(CloseReason::Generic).unwrap();
        assert!(transport.is_closed());
        assert!(matches!(
            transport.send(&push(vec![1]), Reliability::Reliable),
            Err(TransportError::ClosedByPeer(_))
        ));
    }
}
