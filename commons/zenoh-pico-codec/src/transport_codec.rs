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
//! Codec for the transport (session-framing) family: `Join`, `Init`,
//! `InitAck`, `Open`, `OpenAck`, `Close`, `KeepAlive`, `Frame`, `Fragment`.
//!
//! Each call to [`read_transport_message`]/[`write_transport_message`]
//! handles exactly one message; the caller (the transport engine) is
//! responsible for message boundaries (a length-prefixed record for
//! stream links, one datagram for packet links — spec §4.5's "read loop
//! reads one transport message at a time").

use zenoh_pico_protocol::core::WhatAmI;
use zenoh_pico_protocol::mid;
use zenoh_pico_protocol::transport::*;

use crate::error::{CodecError, CodecResult};
use crate::network_codec::{read_network_message, write_network_message};
use crate::reader::Reader;
use crate::writer::Writer;

fn write_sn_resolution_and_batch(w: &mut Writer, sn: SnResolution, batch: u16) {
    w.write_u8(sn.0);
    crate::varint::write_u16(w, batch);
}

fn read_sn_resolution_and_batch(r: &mut Reader) -> CodecResult<(SnResolution, u16)> {
    let bits = r.read_u8()?;
    let batch = crate::varint::read_u16(r)?;
    Ok((SnResolution(bits), batch))
}

fn write_lease(w: &mut Writer, lease: Lease) -> bool {
    let seconds = lease.is_whole_seconds();
    let value = if seconds { lease.millis / 1000 } else { lease.millis };
    crate::varint::write_u64(w, value);
    seconds
}

fn read_lease(r: &mut Reader, seconds: bool) -> CodecResult<Lease> {
    let v = crate::varint::read_u64(r)?;
    Ok(if seconds { Lease::from_secs(v) } else { Lease::from_millis(v) })
}

pub fn write_init(w: &mut Writer, msg: &Init) {
    let mut header = mid::ID_INIT;
    if msg.qos_enabled {
        header |= mid::FLAG_X1;
    }
    w.write_u8(header);
    w.write_u8(msg.whatami.wire_value());
    crate::core_codec::write_zid(w, &msg.zid);
    write_sn_resolution_and_batch(w, msg.sn_resolution, msg.batch_size);
}

pub fn read_init(r: &mut Reader, header: u8) -> CodecResult<Init> {
    let whatami = WhatAmI::from_wire_value(r.read_u8()?).ok_or(CodecError::Malformed)?;
    let zid = crate::core_codec::read_zid(r)?;
    let (sn_resolution, batch_size) = read_sn_resolution_and_batch(r)?;
    Ok(Init {
        whatami,
        zid,
        sn_resolution,
        batch_size,
        qos_enabled: header & mid::FLAG_X1 != 0,
    })
}

pub fn write_init_ack(w: &mut Writer, msg: &InitAck) {
    let mut header = mid::ID_INIT | mid::FLAG_X2;
    if msg.qos_enabled {
        header |= mid::FLAG_X1;
    }
    w.write_u8(header);
    w.write_u8(msg.whatami.wire_value());
    crate::core_codec::write_zid(w, &msg.zid);
    write_sn_resolution_and_batch(w, msg.sn_resolution, msg.batch_size);
    w.write_payload(&msg.cookie);
}

pub fn read_init_ack(r: &mut Reader, header: u8) -> CodecResult<InitAck> {
    let whatami = WhatAmI::from_wire_value(r.read_u8()?).ok_or(CodecError::Malformed)?;
    let zid = crate::core_codec::read_zid(r)?;
    let (sn_resolution, batch_size) = read_sn_resolution_and_batch(r)?;
    let cookie = r.read_payload()?;
    Ok(InitAck {
        whatami,
        zid,
        sn_resolution,
        batch_size,
        qos_enabled: header & mid::FLAG_X1 != 0,
        cookie,
    })
}

pub fn write_open(w: &mut Writer, msg: &Open) {
    let mut header = mid::ID_OPEN;
    if msg.lease.is_whole_seconds() {
        header |= mid::FLAG_X1;
    }
    w.write_u8(header);
    write_lease(w, msg.lease);
    crate::varint::write_u64(w, msg.initial_sn);
    w.write_payload(&msg.cookie);
}

pub fn read_open(r: &mut Reader, header: u8) -> CodecResult<Open> {
    let lease = read_lease(r, header & mid::FLAG_X1 != 0)?;
    let initial_sn = crate::varint::read_u64(r)?;
    let cookie = r.read_payload()?;
    Ok(Open {
        lease,
        initial_sn,
        cookie,
    })
}

pub fn write_open_ack(w: &mut Writer, msg: &OpenAck) {
    let mut header = mid::ID_OPEN | mid::FLAG_X2;
    if msg.lease.is_whole_seconds() {
        header |= mid::FLAG_X1;
    }
    w.write_u8(header);
    write_lease(w, msg.lease);
    crate::varint::write_u64(w, msg.initial_sn);
}

pub fn read_open_ack(r: &mut Reader, header: u8) -> CodecResult<OpenAck> {
    let lease = read_lease(r, header & mid::FLAG_X1 != 0)?;
    let initial_sn = crate::varint::read_u64(r)?;
    Ok(OpenAck { lease, initial_sn })
}

pub fn write_join(w: &mut Writer, msg: &Join) {
    let mut header = mid::ID_JOIN;
    if msg.lease.is_whole_seconds() {
        header |= mid::FLAG_X1;
    }
    w.write_u8(header);
    w.write_u8(msg.whatami.wire_value());
    crate::core_codec::write_zid(w, &msg.zid);
    w.write_u8(msg.sn_resolution.0);
    write_lease(w, msg.lease);
    crate::varint::write_u64(w, msg.next_sn);
}

pub fn read_join(r: &mut Reader, header: u8) -> CodecResult<Join> {
    let whatami = WhatAmI::from_wire_value(r.read_u8()?).ok_or(CodecError::Malformed)?;
    let zid = crate::core_codec::read_zid(r)?;
    let sn_resolution = SnResolution(r.read_u8()?);
    let lease = read_lease(r, header & mid::FLAG_X1 != 0)?;
    let next_sn = crate::varint::read_u64(r)?;
    Ok(Join {
        whatami,
        zid,
        sn_resolution,
        lease,
        next_sn,
    })
}

pub fn write_close(w: &mut Writer, msg: &Close) {
    w.write_u8(mid::ID_CLOSE);
    w.write_u8(msg.reason.wire_value());
}

pub fn read_close(r: &mut Reader, _header: u8) -> CodecResult<Close> {
    Ok(Close {
        reason: CloseReason::from_wire_value(r.read_u8()?),
    })
}

pub fn write_keep_alive(w: &mut Writer, _msg: &KeepAlive) {
    w.write_u8(mid::ID_KEEP_ALIVE);
}

pub fn read_keep_alive(_r: &mut Reader, _header: u8) -> CodecResult<KeepAlive> {
    Ok(KeepAlive)
}

pub fn write_frame(w: &mut Writer, msg: &Frame) {
    let mut header = mid::ID_FRAME;
    if msg.reliability == Reliability::Reliable {
        header |= mid::FLAG_X1;
    }
    w.write_u8(header);
    crate::varint::write_u64(w, msg.sn);
    for m in &msg.messages {
        write_network_message(w, m);
    }
}

pub fn read_frame(r: &mut Reader, header: u8) -> CodecResult<Frame> {
    let reliability = if header & mid::FLAG_X1 != 0 {
        Reliability::Reliable
    } else {
        Reliability::BestEffort
    };
    let sn = crate::varint::read_u64(r)?;
    let mut messages = Vec::new();
    while !r.is_empty() {
        messages.push(read_network_message(r)?);
    }
    Ok(Frame {
        reliability,
        sn,
        messages,
    })
}

pub fn write_fragment(w: &mut Writer, msg: &Fragment) {
    let mut header = mid::ID_FRAGMENT;
    if msg.reliability == Reliability::Reliable {
        header |= mid::FLAG_X1;
    }
    if msg.more {
        header |= mid::FLAG_X2;
    }
    w.write_u8(header);
    crate::varint::write_u64(w, msg.sn);
    w.write_payload(&msg.payload);
}

pub fn read_fragment(r: &mut Reader, header: u8) -> CodecResult<Fragment> {
    let reliability = if header & mid::FLAG_X1 != 0 {
        Reliability::Reliable
    } else {
        Reliability::BestEffort
    };
    let more = header & mid::FLAG_X2 != 0;
    let sn = crate::varint::read_u64(r)?;
    let payload = r.read_payload()?;
    Ok(Fragment {
        reliability,
        more,
        sn,
        payload,
    })
}

pub fn write_transport_message(w: &mut Writer, msg: &TransportMessage) {
    match msg {
        TransportMessage::Join(m) => write_join(w, m),
        TransportMessage::Init(m) => write_init(w, m),
        TransportMessage::InitAck(m) => write_init_ack(w, m),
        TransportMessage::Open(m) => write_open(w, m),
        TransportMessage::OpenAck(m) => write_open_ack(w, m),
        TransportMessage::Close(m) => write_close(w, m),
        TransportMessage::KeepAlive(m) => write_keep_alive(w, m),
        TransportMessage::Frame(m) => write_frame(w, m),
        TransportMessage::Fragment(m) => write_fragment(w, m),
    }
}

pub fn read_transport_message(r: &mut Reader) -> CodecResult<TransportMessage> {
    let header = r.read_u8()?;
    match mid::mid(header) {
        mid::ID_JOIN => Ok(TransportMessage::Join(read_join(r, header)?)),
        mid::ID_INIT if header & mid::FLAG_X2 == 0 => Ok(TransportMessage::Init(read_init(r, header)?)),
        mid::ID_INIT => Ok(TransportMessage::InitAck(read_init_ack(r, header)?)),
        mid::ID_OPEN if header & mid::FLAG_X2 == 0 => Ok(TransportMessage::Open(read_open(r, header)?)),
        mid::ID_OPEN => Ok(TransportMessage::OpenAck(read_open_ack(r, header)?)),
        mid::ID_CLOSE => Ok(TransportMessage::Close(read_close(r, header)?)),
        mid::ID_KEEP_ALIVE => Ok(TransportMessage::KeepAlive(read_keep_alive(r, header)?)),
        mid::ID_FRAME => Ok(TransportMessage::Frame(read_frame(r, header)?)),
        mid::ID_FRAGMENT => Ok(TransportMessage::Fragment(read_fragment(r, header)?)),
        other => Err(CodecError::UnknownMessageId(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenoh_pico_protocol::core::ZenohId;
    use zenoh_pico_collections::Bytes;

    #[test]
    fn init_roundtrip() {
        let msg = TransportMessage::Init(Init {
            whatami: WhatAmI::Client,
            zid: ZenohId::rand(),
            sn_resolution: SnResolution::default(),
            batch_size: 2048,
            qos_enabled: true,
        });
        let mut w = Writer::new();
        write_transport_message(&mut w, &msg);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_transport_message(&mut r).unwrap(), msg);
    }

    #[test]
    fn init_ack_distinguished_from_init() {
        let ack = TransportMessage::InitAck(InitAck {
            whatami: WhatAmI::Router,
            zid: ZenohId::rand(),
            sn_resolution: SnResolution::default(),
            batch_size: 1024,
            qos_enabled: false,
            cookie: Bytes::from_buf(vec![1, 2, 3]),
        });
        let mut w = Writer::new();
        write_transport_message(&mut w, &ack);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_transport_message(&mut r).unwrap(), ack);
    }

    #[test]
    fn frame_with_multiple_network_messages_roundtrips() {
        use zenoh_pico_protocol::network::*;
        let messages = vec![
            NetworkMessage::ResponseFinal(ResponseFinal { request_id: 1 }),
            NetworkMessage::ResponseFinal(ResponseFinal { request_id: 2 }),
        ];
        let frame = TransportMessage::Frame(Frame {
            reliability: Reliability::Reliable,
            sn: 42,
            messages,
        });
        let mut w = Writer::new();
        write_transport_message(&mut w, &frame);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_transport_message(&mut r).unwrap(), frame);
    }

    #[test]
    fn fragment_more_flag_roundtrips() {
        let frag = TransportMessage::Fragment(Fragment {
            reliability: Reliability::BestEffort,
            more: true,
            sn: 5,
            payload: Bytes::from_buf(vec![0; 100]),
        });
        let mut w = Writer::new();
        write_transport_message(&mut w, &frag);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_transport_message(&mut r).unwrap(), frag);
    }

    #[test]
    fn close_roundtrip() {
        let msg = TransportMessage::Close(Close {
            reason: CloseReason::Expired,
        });
        let mut w = Writer::new();
        write_transport_message(&mut w, &msg);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_transport_message(&mut r).unwrap(), msg);
    }
}
