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
//! The receive path: the read loop reads one transport message at a time.
//! For `Frame`, it iterates the contained network messages and dispatches
//! each. For `Fragment`, it appends to the per-peer reassembly buffer; on
//! `more=false`, the concatenation is decoded as one network message and
//! dispatched. Any decode failure inside a frame causes the remainder of
//! that frame to be discarded, but the transport stream continues.

use log::warn;

use zenoh_pico_codec::reader::Reader;
use zenoh_pico_protocol::network::NetworkMessage;
use zenoh_pico_protocol::transport::{Fragment, Frame, Reliability, SnResolution};

use crate::error::TransportResult;

struct ReassemblyState {
    sn: u64,
    buf: Vec<u8>,
}

pub struct RxState {
    next_reliable_sn: Option<u64>,
    next_best_effort_sn: Option<u64>,
    sn_resolution: SnResolution,
    reassembly: Option<ReassemblyState>,
}

/// Outcome of feeding one already length-delimited transport record into
/// the RX state: either nothing deliverable yet (a `KeepAlive`, a partial
/// fragment, a dropped stale frame), or the network messages it produced.
#[derive(Debug, Default)]
pub struct Delivered {
    pub messages: Vec<NetworkMessage>,
}

impl RxState {
    pub fn new(sn_resolution: SnResolution) -> Self {
        RxState {
            next_reliable_sn: None,
            next_best_effort_sn: None,
            sn_resolution,
            reassembly: None,
        }
    }

    pub fn initial_sn(sn_resolution: SnResolution, initial_sn: u64) -> Self {
        let mut s = Self::new(sn_resolution);
        s.next_reliable_sn = Some(initial_sn & sn_resolution.mask());
        s.next_best_effort_sn = Some(initial_sn & sn_resolution.mask());
        s
    }

    /// Exposed for handshake tests asserting TX/RX sn agreement; not used
    /// on the hot path.
    pub fn expected_reliable_sn(&self) -> Option<u64> {
        self.next_reliable_sn
    }

    fn check_and_advance(&mut self, reliability: Reliability, sn: u64) -> TransportResult<bool> {
        let mask = self.sn_resolution.mask();
        let slot = match reliability {
            Reliability::Reliable => &mut self.next_reliable_sn,
            Reliability::BestEffort => &mut self.next_best_effort_sn,
        };
        match *slot {
            None => {
                *slot = Some((sn + 1) & mask);
                Ok(true)
            }
            Some(expected) if expected == sn => {
                *slot = Some((sn + 1) & mask);
                Ok(true)
            }
            Some(_) if reliability == Reliability::BestEffort => {
                // Best-effort stream: accept any sn, just resynchronize.
                *slot = Some((sn + 1) & mask);
                Ok(true)
            }
            Some(_) => {
                // Reliable stream discontinuity: resynchronize to the
                // observed sn but report it so the caller can reset any
                // in-flight reassembly.
                *slot = Some((sn + 1) & mask);
                Ok(false)
            }
        }
    }

    pub fn on_frame(&mut self, frame: Frame) -> TransportResult<Delivered> {
        let in_order = self.check_and_advance(frame.reliability, frame.sn)?;
        if !in_order {
            warn!("sn discontinuity on reliable frame {}, discarding", frame.sn);
            return Ok(Delivered::default());
        }
        Ok(Delivered {
            messages: frame.messages,
        })
    }

    pub fn on_fragment(&mut self, fragment: Fragment) -> TransportResult<Delivered> {
        let in_order = self.check_and_advance(fragment.reliability, fragment.sn)?;
        if !in_order {
            warn!("sn discontinuity on reliable fragment {}, resetting reassembly", fragment.sn);
            self.reassembly = None;
        }

        let state = self.reassembly.get_or_insert_with(|| ReassemblyState {
            sn: fragment.sn,
            buf: Vec::new(),
        });
        state.buf.extend_from_slice(&fragment.payload.to_vec());

        if fragment.more {
            return Ok(Delivered::default());
        }

        let ReassemblyState { buf, .. } = self.reassembly.take().unwrap();
        let mut r = Reader::new(&buf);
        match zenoh_pico_codec::network_codec::read_network_message(&mut r) {
            Ok(msg) => Ok(Delivered { messages: vec![msg] }),
            Err(e) => {
                warn!("decode failure reassembling fragmented message: {e}");
                Ok(Delivered::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenoh_pico_collections::Bytes;

    #[test]
    fn in_order_frames_deliver_their_messages() {
        let mut rx = RxState::new(SnResolution::default());
        let frame = Frame {
            reliability: Reliability::Reliable,
            sn: 0,
            messages: vec![],
        };
        let d = rx.on_frame(frame).unwrap();
        assert!(d.messages.is_empty());
    }

    #[test]
    fn reliable_sn_gap_is_discarded_and_resynchronizes() {
        let mut rx = RxState::new(SnResolution::default());
        rx.on_frame(Frame {
            reliability: Reliability::Reliable,
            sn: 0,
            messages: vec![],
        })
        .unwrap();
        // sn 5 instead of the expected 1: a gap.
        let d = rx
            .on_frame(Frame {
                reliability: Reliability::Reliable,
                sn: 5,
                messages: vec![],
            })
            .unwrap();
        assert!(d.messages.is_empty());
        // subsequent sn 6 is now in order relative to the resynchronized state.
        let d2 = rx
            .on_frame(Frame {
                reliability: Reliability::Reliable,
                sn: 6,
                messages: vec![],
            })
            .unwrap();
        assert!(d2.messages.is_empty());
    }

    #[test]
    fn fragment_reassembly_decodes_once_more_is_false() {
        use zenoh_pico_codec::writer::Writer;
        use zenoh_pico_protocol::network::{Push, PushPayload, WireExpr, Mapping};
        use zenoh_pico_protocol::zenoh::Put;

        let msg = NetworkMessage::Push(Push {
            key: WireExpr::from_suffix("a"),
            qos: Default::default(),
            timestamp: None,
            payload: PushPayload::Put(Put {
                encoding: None,
                timestamp: None,
                source_info: None,
                attachment: None,
                payload: Bytes::from_buf(vec![9u8; 50]),
            }),
        });
        let mut w = Writer::new();
        zenoh_pico_codec::network_codec::write_network_message(&mut w, &msg);
        let encoded = w.finish();
        let (first, second) = encoded.split_at(encoded.len() / 2);

        let mut rx = RxState::new(SnResolution::default());
        let d1 = rx
            .on_fragment(Fragment {
                reliability: Reliability::Reliable,
                more: true,
                sn: 0,
                payload: Bytes::from_buf(first.to_vec()),
            })
            .unwrap();
        assert!(d1.messages.is_empty());

        let d2 = rx
            .on_fragment(Fragment {
                reliability: Reliability::Reliable,
                more: false,
                sn: 1,
                payload: Bytes::from_buf(second.to_vec()),
            })
            .unwrap();
        assert_eq!(d2.messages, vec![msg]);
    }
}
