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
//! The send path: a caller produces a fully encoded network message into
//! a TX buffer while holding the TX mutex. If the buffer fits within the
//! remaining batch size, it is wrapped in a `Frame` with the next sn for
//! its reliability stream and emitted. Otherwise it is split across
//! `Fragment` records.
//!
//! The wire [`Frame`]/[`Fragment`] records this crate inherited from
//! `zenoh-pico-protocol` carry a reliability flag but no priority field,
//! so priority here only orders which pending message is framed next; it
//! does not get its own sn stream (see DESIGN.md). Each reliability lane
//! still gets an independent, monotonically increasing sn, wrapping at
//! the negotiated [`SnResolution`].

use zenoh_pico_codec::writer::Writer;
use zenoh_pico_collections::Bytes;
use zenoh_pico_link::Link;
use zenoh_pico_protocol::network::NetworkMessage;
use zenoh_pico_protocol::transport::{Fragment, Frame, Reliability, SnResolution, TransportMessage};

use crate::error::TransportResult;
use crate::framing::write_framed;

/// Reserved room for a `Fragment` header (1 header byte + worst-case
/// varint `sn` + worst-case varint payload-length prefix) so a chunked
/// payload still fits in one link write.
const FRAGMENT_HEADER_BUDGET: usize = 1 + 10 + 10;

pub struct TxState {
    next_reliable_sn: u64,
    next_best_effort_sn: u64,
    sn_resolution: SnResolution,
}

impl TxState {
    pub fn new(sn_resolution: SnResolution) -> Self {
        TxState {
            next_reliable_sn: 0,
            next_best_effort_sn: 0,
            sn_resolution,
        }
    }

    pub fn initial_sn(sn_resolution: SnResolution, initial_sn: u64) -> Self {
        let mut s = Self::new(sn_resolution);
        s.next_reliable_sn = initial_sn & sn_resolution.mask();
        s.next_best_effort_sn = initial_sn & sn_resolution.mask();
        s
    }

    fn next_sn(&mut self, reliability: Reliability) -> u64 {
        let mask = self.sn_resolution.mask();
        let slot = match reliability {
            Reliability::Reliable => &mut self.next_reliable_sn,
            Reliability::BestEffort => &mut self.next_best_effort_sn,
        };
        let sn = *slot;
        *slot = (*slot + 1) & mask;
        sn
    }

    /// Encodes and writes `msg` to `link`, framing it as a single `Frame`
    /// when it fits within `batch_size`, or as a sequence of `Fragment`
    /// records otherwise.
    pub fn send(
        &mut self,
        link: &dyn Link,
        msg: &NetworkMessage,
        reliability: Reliability,
        batch_size: u16,
    ) -> TransportResult<()> {
        let mut body = Writer::new();
        zenoh_pico_codec::network_codec::write_network_message(&mut body, msg);
        let body = body.finish();

        let frame = TransportMessage::Frame(Frame {
            reliability,
            sn: self.peek_sn(reliability),
            messages: vec![msg.clone()],
        });
        let mut framed = Writer::new();
        zenoh_pico_codec::transport_codec::write_transport_message(&mut framed, &frame);
        if framed.len() <= batch_size as usize {
            self.next_sn(reliability);
            return self.write_one(link, &framed.finish());
        }

        self.send_fragmented(link, &body, reliability, batch_size)
    }

    /// Exposed for handshake tests asserting TX/RX sn agreement; not used
    /// on the hot path.
    pub fn peek_reliable_sn(&self) -> u64 {
        self.next_reliable_sn
    }

    fn peek_sn(&self, reliability: Reliability) -> u64 {
        match reliability {
            Reliability::Reliable => self.next_reliable_sn,
            Reliability::BestEffort => self.next_best_effort_sn,
        }
    }

    fn send_fragmented(
        &mut self,
        link: &dyn Link,
        body: &[u8],
        reliability: Reliability,
        batch_size: u16,
    ) -> TransportResult<()> {
        let chunk_size = (batch_size as usize).saturating_sub(FRAGMENT_HEADER_BUDGET).max(1);
        let chunks: Vec<&[u8]> = body.chunks(chunk_size).collect();
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let sn = self.next_sn(reliability);
            let fragment = TransportMessage::Fragment(Fragment {
                reliability,
                more: i != last,
                sn,
                payload: Bytes::from_buf(chunk.to_vec()),
            });
            let mut w = Writer::new();
            zenoh_pico_codec::transport_codec::write_transport_message(&mut w, &fragment);
            self.write_one(link, &w.finish())?;
        }
        Ok(())
    }

    pub fn send_keep_alive(&self, link: &dyn Link) -> TransportResult<()> {
        let mut w = Writer::new();
        zenoh_pico_codec::transport_codec::write_transport_message(
            &mut w,
            &TransportMessage::KeepAlive(zenoh_pico_protocol::transport::KeepAlive),
        );
        self.write_one(link, &w.finish())
    }

    pub fn send_transport_message(&self, link: &dyn Link, msg: &TransportMessage) -> TransportResult<()> {
        let mut w = Writer::new();
        zenoh_pico_codec::transport_codec::write_transport_message(&mut w, msg);
        self.write_one(link, &w.finish())
    }

    fn write_one(&self, link: &dyn Link, payload: &[u8]) -> TransportResult<()> {
        write_framed(link, payload)
    }
}
