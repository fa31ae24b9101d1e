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
//! Codec for the network message family: `Declare`, `Push`, `Request`,
//! `Response`, `ResponseFinal`, `Interest`.
//!
//! Every message starts with the common header byte (spec §4.2): low 5
//! bits the message id, bit 7 (`Z`) "extensions follow". Two more header
//! bits (`X1`, `X2`) carry the key-expression suffix-presence and
//! mapping-origin flags that `Push`/`Request`/`Response` name explicitly.
//! `Declare`'s seven possible bodies don't fit in the two spare header
//! bits, so it additionally carries one discriminant byte naming which of
//! the seven it is, plus a small per-declaration flags byte (suffix
//! presence, mapping origin, and — for `DeclareQueryable` only — the
//! completeness bit); the C wire format packs these into its own extended
//! header scheme, but spec §4.2 doesn't pin exact bit positions for it, so
//! this rewrite picks the self-describing layout above rather than
//! guessing at undocumented bit assignments.

use zenoh_pico_protocol::core::{QoS, QueryTarget, Timestamp};
use zenoh_pico_protocol::extension::{known_id, ExtBody, Extension};
use zenoh_pico_protocol::mid;
use zenoh_pico_protocol::network::*;

use crate::error::{CodecError, CodecResult};
use crate::extension_codec::{find_zbuf, find_zint, read_extensions, reject_unknown_mandatory, write_extensions};
use crate::reader::Reader;
use crate::writer::Writer;
use crate::{core_codec, zenoh_codec};

const KEY_FLAG_SUFFIX: u8 = 0b001;
const KEY_FLAG_MAPPING_SENDER: u8 = 0b010;
const KEY_FLAG_COMPLETE: u8 = 0b100;

fn write_wire_expr(w: &mut Writer, key: &WireExpr, extra_flags: u8) -> u8 {
    let mut flags = extra_flags;
    if key.suffix.is_some() {
        flags |= KEY_FLAG_SUFFIX;
    }
    if matches!(key.mapping, Mapping::Sender) {
        flags |= KEY_FLAG_MAPPING_SENDER;
    }
    w.write_u8(flags);
    crate::varint::write_u16(w, key.scope);
    if let Some(suffix) = &key.suffix {
        w.write_string(suffix);
    }
    flags
}

fn read_wire_expr(r: &mut Reader) -> CodecResult<(WireExpr, u8)> {
    let flags = r.read_u8()?;
    let scope = crate::varint::read_u16(r)?;
    let suffix = if flags & KEY_FLAG_SUFFIX != 0 {
        Some(r.read_string()?)
    } else {
        None
    };
    let mapping = if flags & KEY_FLAG_MAPPING_SENDER != 0 {
        Mapping::Sender
    } else {
        Mapping::Receiver
    };
    Ok((WireExpr { scope, suffix, mapping }, flags))
}

// ---- Declare ----

fn discriminant(body: &DeclareBody) -> u8 {
    match body {
        DeclareBody::Resource(_) => 0,
        DeclareBody::Subscriber(_) => 1,
        DeclareBody::UndeclSubscriber(_) => 2,
        DeclareBody::Queryable(_) => 3,
        DeclareBody::UndeclQueryable(_) => 4,
        DeclareBody::Token(_) => 5,
        DeclareBody::UndeclToken(_) => 6,
        DeclareBody::Keyexpr(_) => 7,
    }
}

pub fn write_declare(w: &mut Writer, msg: &Declare) {
    let mut exts = Vec::new();
    if let Some(ts) = &msg.timestamp {
        let mut tw = Writer::new();
        core_codec::write_timestamp(&mut tw, ts);
        exts.push(Extension {
            id: known_id::TIMESTAMP,
            mandatory: false,
            body: ExtBody::ZBuf(zenoh_pico_collections::Bytes::from_buf(tw.finish())),
        });
    }
    if let Some(iid) = msg.interest_id {
        exts.push(Extension {
            id: known_id::INTEREST_ID,
            mandatory: false,
            body: ExtBody::ZInt(iid as u64),
        });
    }

    let mut header = mid::ID_DECLARE;
    if !exts.is_empty() {
        header |= mid::FLAG_Z;
    }
    w.write_u8(header);
    w.write_u8(discriminant(&msg.body));

    match &msg.body {
        DeclareBody::Resource(d) | DeclareBody::Keyexpr(d) => {
            write_wire_expr(w, &d.key, 0);
            crate::varint::write_u16(w, d.id);
        }
        DeclareBody::Subscriber(d) => {
            write_wire_expr(w, &d.key, 0);
            crate::varint::write_u32(w, d.id);
        }
        DeclareBody::UndeclSubscriber(d) => {
            write_wire_expr(w, &d.key, 0);
            crate::varint::write_u32(w, d.id);
        }
        DeclareBody::Queryable(d) => {
            let extra = if d.complete { KEY_FLAG_COMPLETE } else { 0 };
            write_wire_expr(w, &d.key, extra);
            crate::varint::write_u32(w, d.id);
        }
        DeclareBody::UndeclQueryable(d) => {
            write_wire_expr(w, &d.key, 0);
            crate::varint::write_u32(w, d.id);
        }
        DeclareBody::Token(d) => {
            write_wire_expr(w, &d.key, 0);
            crate::varint::write_u32(w, d.id);
        }
        DeclareBody::UndeclToken(d) => {
            write_wire_expr(w, &d.key, 0);
            crate::varint::write_u32(w, d.id);
        }
    }
    write_extensions(w, &exts);
}

pub fn read_declare(r: &mut Reader, header: u8) -> CodecResult<Declare> {
    let disc = r.read_u8()?;
    let (key, flags) = read_wire_expr(r)?;
    let body = match disc {
        0 => DeclareBody::Resource(DeclareResource {
            id: crate::varint::read_u16(r)?,
            key,
        }),
        1 => DeclareBody::Subscriber(DeclareSubscriber {
            id: crate::varint::read_u32(r)?,
            key,
        }),
        2 => DeclareBody::UndeclSubscriber(UndeclareSubscriber {
            id: crate::varint::read_u32(r)?,
            key,
        }),
        3 => DeclareBody::Queryable(DeclareQueryable {
            id: crate::varint::read_u32(r)?,
            key,
            complete: flags & KEY_FLAG_COMPLETE != 0,
        }),
        4 => DeclareBody::UndeclQueryable(UndeclareQueryable {
            id: crate::varint::read_u32(r)?,
            key,
        }),
        5 => DeclareBody::Token(DeclareToken {
            id: crate::varint::read_u32(r)?,
            key,
        }),
        6 => DeclareBody::UndeclToken(UndeclareToken {
            id: crate::varint::read_u32(r)?,
            key,
        }),
        7 => DeclareBody::Keyexpr(DeclareResource {
            id: crate::varint::read_u16(r)?,
            key,
        }),
        _ => return Err(CodecError::Malformed),
    };

    let mut timestamp = None;
    let mut interest_id = None;
    let mut unrecognized = Vec::new();
    if header & mid::FLAG_Z != 0 {
        let exts = read_extensions(r)?;
        if let Some(buf) = find_zbuf(&exts, known_id::TIMESTAMP) {
            let flat = buf.to_vec();
            let mut tr = Reader::new(&flat);
            timestamp = Some(core_codec::read_timestamp(&mut tr)?);
        }
        interest_id = find_zint(&exts, known_id::INTEREST_ID).map(|v| v as u32);
        for e in &exts {
            if e.id != known_id::TIMESTAMP && e.id != known_id::INTEREST_ID {
                unrecognized.push(e);
            }
        }
        reject_unknown_mandatory(&unrecognized)?;
    }

    Ok(Declare {
        body,
        timestamp,
        interest_id,
    })
}

// ---- Push ----

pub fn write_push(w: &mut Writer, msg: &Push) {
    let mut exts = vec![Extension {
        id: known_id::QOS,
        mandatory: false,
        body: ExtBody::ZInt(msg.qos.to_byte() as u64),
    }];
    if let Some(ts) = &msg.timestamp {
        let mut tw = Writer::new();
        core_codec::write_timestamp(&mut tw, ts);
        exts.push(Extension {
            id: known_id::TIMESTAMP,
            mandatory: false,
            body: ExtBody::ZBuf(zenoh_pico_collections::Bytes::from_buf(tw.finish())),
        });
    }

    w.write_u8(mid::ID_PUSH | mid::FLAG_Z);
    write_wire_expr(w, &msg.key, 0);

    w.write_u8(match &msg.payload {
        PushPayload::Put(_) => 0,
        PushPayload::Delete(_) => 1,
    });
    match &msg.payload {
        PushPayload::Put(put) => zenoh_codec::write_put(w, put),
        PushPayload::Delete(del) => zenoh_codec::write_delete(w, del),
    }
    write_extensions(w, &exts);
}

pub fn read_push(r: &mut Reader, _header: u8) -> CodecResult<Push> {
    let (key, _flags) = read_wire_expr(r)?;
    let kind = r.read_u8()?;
    let payload = match kind {
        0 => PushPayload::Put(zenoh_codec::read_put(r)?),
        1 => PushPayload::Delete(zenoh_codec::read_delete(r)?),
        _ => return Err(CodecError::Malformed),
    };
    let exts = read_extensions(r)?;
    let qos = find_zint(&exts, known_id::QOS)
        .map(|v| QoS::from_byte(v as u8))
        .unwrap_or_default();
    let timestamp = match find_zbuf(&exts, known_id::TIMESTAMP) {
        Some(buf) => {
            let flat = buf.to_vec();
            let mut tr = Reader::new(&flat);
            Some(core_codec::read_timestamp(&mut tr)?)
        }
        None => None,
    };
    let unrecognized: Vec<_> = exts
        .iter()
        .filter(|e| e.id != known_id::QOS && e.id != known_id::TIMESTAMP)
        .collect();
    reject_unknown_mandatory(&unrecognized)?;
    Ok(Push {
        key,
        qos,
        timestamp,
        payload,
    })
}

// ---- Request ----

pub fn write_request(w: &mut Writer, msg: &Request) {
    let header = mid::ID_REQUEST;
    w.write_u8(header);
    write_wire_expr(w, &msg.key, 0);
    crate::varint::write_u32(w, msg.id);
    w.write_u8(msg.target.wire_value());
    w.write_u8(match &msg.payload {
        RequestPayload::Query(_) => 0,
        RequestPayload::Put(_) => 1,
        RequestPayload::Delete(_) => 2,
    });
    match &msg.payload {
        RequestPayload::Query(q) => zenoh_codec::write_query(w, q),
        RequestPayload::Put(p) => zenoh_codec::write_put(w, p),
        RequestPayload::Delete(d) => zenoh_codec::write_delete(w, d),
    }
}

pub fn read_request(r: &mut Reader, _header: u8) -> CodecResult<Request> {
    let (key, _flags) = read_wire_expr(r)?;
    let id = crate::varint::read_u32(r)?;
    let target = QueryTarget::from_wire_value(r.read_u8()?).ok_or(CodecError::Malformed)?;
    let kind = r.read_u8()?;
    let payload = match kind {
        0 => RequestPayload::Query(zenoh_codec::read_query(r)?),
        1 => RequestPayload::Put(zenoh_codec::read_put(r)?),
        2 => RequestPayload::Delete(zenoh_codec::read_delete(r)?),
        _ => return Err(CodecError::Malformed),
    };
    Ok(Request { id, key, target, payload })
}

// ---- Response / ResponseFinal ----

pub fn write_response(w: &mut Writer, msg: &Response) {
    w.write_u8(mid::ID_RESPONSE);
    write_wire_expr(w, &msg.key, 0);
    crate::varint::write_u32(w, msg.request_id);
    w.write_u8(match &msg.payload {
        ResponsePayload::Reply(_) => 0,
        ResponsePayload::Err(_) => 1,
    });
    match &msg.payload {
        ResponsePayload::Reply(reply) => zenoh_codec::write_reply(w, reply),
        ResponsePayload::Err(err) => zenoh_codec::write_err(w, err),
    }
}

pub fn read_response(r: &mut Reader, _header: u8) -> CodecResult<Response> {
    let (key, _flags) = read_wire_expr(r)?;
    let request_id = crate::varint::read_u32(r)?;
    let kind = r.read_u8()?;
    let payload = match kind {
        0 => ResponsePayload::Reply(zenoh_codec::read_reply(r)?),
        1 => ResponsePayload::Err(zenoh_codec::read_err(r)?),
        _ => return Err(CodecError::Malformed),
    };
    Ok(Response {
        request_id,
        key,
        payload,
    })
}

pub fn write_response_final(w: &mut Writer, msg: &ResponseFinal) {
    w.write_u8(mid::ID_RESPONSE_FINAL);
    crate::varint::write_u32(w, msg.request_id);
}

pub fn read_response_final(r: &mut Reader, _header: u8) -> CodecResult<ResponseFinal> {
    Ok(ResponseFinal {
        request_id: crate::varint::read_u32(r)?,
    })
}

// ---- Interest ----

const INTEREST_FLAG_HAS_KEY: u8 = 0b0000_0001;
const INTEREST_FLAG_RESTRICTED: u8 = 0b0000_0010;
const INTEREST_FLAG_CURRENT: u8 = 0b0000_0100;
const INTEREST_FLAG_FUTURE: u8 = 0b0000_1000;
const INTEREST_FLAG_AGGREGATE: u8 = 0b0001_0000;

pub fn write_interest(w: &mut Writer, msg: &Interest) {
    w.write_u8(mid::ID_INTEREST);
    crate::varint::write_u32(w, msg.id);
    w.write_u8(msg.mask.bits());
    let mut flags = 0u8;
    if msg.key.is_some() {
        flags |= INTEREST_FLAG_HAS_KEY;
    }
    if msg.restricted {
        flags |= INTEREST_FLAG_RESTRICTED;
    }
    if msg.current {
        flags |= INTEREST_FLAG_CURRENT;
    }
    if msg.future {
        flags |= INTEREST_FLAG_FUTURE;
    }
    if msg.aggregate {
        flags |= INTEREST_FLAG_AGGREGATE;
    }
    w.write_u8(flags);
    if let Some(key) = &msg.key {
        write_wire_expr(w, key, 0);
    }
}

pub fn read_interest(r: &mut Reader, _header: u8) -> CodecResult<Interest> {
    let id = crate::varint::read_u32(r)?;
    let mask = InterestMask::from_bits_truncate(r.read_u8()?);
    let flags = r.read_u8()?;
    let key = if flags & INTEREST_FLAG_HAS_KEY != 0 {
        Some(read_wire_expr(r)?.0)
    } else {
        None
    };
    Ok(Interest {
        id,
        key,
        mask,
        restricted: flags & INTEREST_FLAG_RESTRICTED != 0,
        current: flags & INTEREST_FLAG_CURRENT != 0,
        future: flags & INTEREST_FLAG_FUTURE != 0,
        aggregate: flags & INTEREST_FLAG_AGGREGATE != 0,
    })
}

// ---- Dispatch ----

pub fn write_network_message(w: &mut Writer, msg: &NetworkMessage) {
    match msg {
        NetworkMessage::Declare(m) => write_declare(w, m),
        NetworkMessage::Push(m) => write_push(w, m),
        NetworkMessage::Request(m) => write_request(w, m),
        NetworkMessage::Response(m) => write_response(w, m),
        NetworkMessage::ResponseFinal(m) => write_response_final(w, m),
        NetworkMessage::Interest(m) => write_interest(w, m),
    }
}

pub fn read_network_message(r: &mut Reader) -> CodecResult<NetworkMessage> {
    let header = r.read_u8()?;
    match mid::mid(header) {
        mid::ID_DECLARE => Ok(NetworkMessage::Declare(read_declare(r, header)?)),
        mid::ID_PUSH => Ok(NetworkMessage::Push(read_push(r, header)?)),
        mid::ID_REQUEST => Ok(NetworkMessage::Request(read_request(r, header)?)),
        mid::ID_RESPONSE => Ok(NetworkMessage::Response(read_response(r, header)?)),
        mid::ID_RESPONSE_FINAL => Ok(NetworkMessage::ResponseFinal(read_response_final(r, header)?)),
        mid::ID_INTEREST => Ok(NetworkMessage::Interest(read_interest(r, header)?)),
        other => Err(CodecError::UnknownMessageId(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenoh_pico_collections::Bytes;
    use zenoh_pico_protocol::core::SampleKind;
    use zenoh_pico_protocol::zenoh::Put;

    fn sample_key() -> WireExpr {
        WireExpr {
            scope: 0,
            suffix: Some("a/b/c".to_string()),
            mapping: Mapping::Sender,
        }
    }

    #[test]
    fn push_roundtrip() {
        let msg = NetworkMessage::Push(Push {
            key: sample_key(),
            qos: QoS::default(),
            timestamp: None,
            payload: PushPayload::Put(Put {
                encoding: None,
                timestamp: None,
                source_info: None,
                attachment: None,
                payload: Bytes::from_buf(vec![1, 2, 3]),
            }),
        });
        let mut w = Writer::new();
        write_network_message(&mut w, &msg);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        let decoded = read_network_message(&mut r).unwrap();
        assert_eq!(decoded, msg);
        let _ = SampleKind::Put;
    }

    #[test]
    fn declare_subscriber_roundtrip() {
        let msg = NetworkMessage::Declare(Declare {
            body: DeclareBody::Subscriber(DeclareSubscriber {
                id: 7,
                key: sample_key(),
            }),
            timestamp: None,
            interest_id: None,
        });
        let mut w = Writer::new();
        write_network_message(&mut w, &msg);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_network_message(&mut r).unwrap(), msg);
    }

    #[test]
    fn response_final_roundtrip() {
        let msg = NetworkMessage::ResponseFinal(ResponseFinal { request_id: 99 });
        let mut w = Writer::new();
        write_network_message(&mut w, &msg);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_network_message(&mut r).unwrap(), msg);
    }

    #[test]
    fn interest_roundtrip() {
        let msg = NetworkMessage::Interest(Interest {
            id: 3,
            key: Some(sample_key()),
            mask: InterestMask::SUBSCRIBER | InterestMask::QUERYABLE,
            restricted: true,
            current: true,
            future: false,
            aggregate: false,
        });
        let mut w = Writer::new();
        write_network_message(&mut w, &msg);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_network_message(&mut r).unwrap(), msg);
    }
}
