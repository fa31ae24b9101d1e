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
//! Codec for the zenoh body family: `Put`, `Delete`, `Query`, `Reply`,
//! `Err`. Each body opens with a presence-flags byte (spec §4.2: "Flags
//! signal presence") naming which of its optional fields follow.

use zenoh_pico_protocol::core::ConsolidationMode;
use zenoh_pico_protocol::zenoh::{Delete, Err, Put, Query, Reply, ReplyBody};

use crate::core_codec;
use crate::error::{CodecError, CodecResult};
use crate::reader::Reader;
use crate::writer::Writer;

const F_ENCODING: u8 = 0b0000_0001;
const F_TIMESTAMP: u8 = 0b0000_0010;
const F_SOURCE_INFO: u8 = 0b0000_0100;
const F_ATTACHMENT: u8 = 0b0000_1000;

pub fn write_put(w: &mut Writer, p: &Put) {
    let mut flags = 0u8;
    if p.encoding.is_some() {
        flags |= F_ENCODING;
    }
    if p.timestamp.is_some() {
        flags |= F_TIMESTAMP;
    }
    if p.source_info.is_some() {
        flags |= F_SOURCE_INFO;
    }
    if p.attachment.is_some() {
        flags |= F_ATTACHMENT;
    }
    w.write_u8(flags);
    if let Some(enc) = &p.encoding {
        core_codec::write_encoding(w, enc);
    }
    if let Some(ts) = &p.timestamp {
        core_codec::write_timestamp(w, ts);
    }
    if let Some(si) = &p.source_info {
        core_codec::write_source_info(w, si);
    }
    if let Some(att) = &p.attachment {
        w.write_payload(att);
    }
    w.write_payload(&p.payload);
}

pub fn read_put(r: &mut Reader) -> CodecResult<Put> {
    let flags = r.read_u8()?;
    let encoding = (flags & F_ENCODING != 0).then(|| core_codec::read_encoding(r)).transpose()?;
    let timestamp = (flags & F_TIMESTAMP != 0).then(|| core_codec::read_timestamp(r)).transpose()?;
    let source_info = (flags & F_SOURCE_INFO != 0)
        .then(|| core_codec::read_source_info(r))
        .transpose()?;
    let attachment = if flags & F_ATTACHMENT != 0 {
        Some(r.read_payload()?)
    } else {
        None
    };
    let payload = r.read_payload()?;
    Ok(Put {
        encoding,
        timestamp,
        source_info,
        attachment,
        payload,
    })
}

pub fn write_delete(w: &mut Writer, d: &Delete) {
    let mut flags = 0u8;
    if d.timestamp.is_some() {
        flags |= F_TIMESTAMP;
    }
    if d.source_info.is_some() {
        flags |= F_SOURCE_INFO;
    }
    if d.attachment.is_some() {
        flags |= F_ATTACHMENT;
    }
    w.write_u8(flags);
    if let Some(ts) = &d.timestamp {
        core_codec::write_timestamp(w, ts);
    }
    if let Some(si) = &d.source_info {
        core_codec::write_source_info(w, si);
    }
    if let Some(att) = &d.attachment {
        w.write_payload(att);
    }
}

pub fn read_delete(r: &mut Reader) -> CodecResult<Delete> {
    let flags = r.read_u8()?;
    let timestamp = (flags & F_TIMESTAMP != 0).then(|| core_codec::read_timestamp(r)).transpose()?;
    let source_info = (flags & F_SOURCE_INFO != 0)
        .then(|| core_codec::read_source_info(r))
        .transpose()?;
    let attachment = if flags & F_ATTACHMENT != 0 {
        Some(r.read_payload()?)
    } else {
        None
    };
    Ok(Delete {
        timestamp,
        source_info,
        attachment,
    })
}

const QF_CONSOLIDATION: u8 = 0b0000_0001;
const QF_PARAMETERS: u8 = 0b0000_0010;
const QF_SOURCE_INFO: u8 = 0b0000_0100;
const QF_VALUE: u8 = 0b0000_1000;
const QF_ATTACHMENT: u8 = 0b0001_0000;

pub fn write_query(w: &mut Writer, q: &Query) {
    let mut flags = 0u8;
    if q.consolidation.is_some() {
        flags |= QF_CONSOLIDATION;
    }
    if q.parameters.is_some() {
        flags |= QF_PARAMETERS;
    }
    if q.source_info.is_some() {
        flags |= QF_SOURCE_INFO;
    }
    if q.value.is_some() {
        flags |= QF_VALUE;
    }
    if q.attachment.is_some() {
        flags |= QF_ATTACHMENT;
    }
    w.write_u8(flags);
    if let Some(c) = q.consolidation {
        w.write_u8(c.wire_value());
    }
    if let Some(p) = &q.parameters {
        w.write_payload(p);
    }
    if let Some(si) = &q.source_info {
        core_codec::write_source_info(w, si);
    }
    if let Some(v) = &q.value {
        write_put(w, v);
    }
    if let Some(att) = &q.attachment {
        w.write_payload(att);
    }
}

pub fn read_query(r: &mut Reader) -> CodecResult<Query> {
    let flags = r.read_u8()?;
    let consolidation = if flags & QF_CONSOLIDATION != 0 {
        Some(ConsolidationMode::from_wire_value(r.read_u8()?).ok_or(CodecError::Malformed)?)
    } else {
        None
    };
    let parameters = if flags & QF_PARAMETERS != 0 {
        Some(r.read_payload()?)
    } else {
        None
    };
    let source_info = (flags & QF_SOURCE_INFO != 0)
        .then(|| core_codec::read_source_info(r))
        .transpose()?;
    let value = if flags & QF_VALUE != 0 { Some(read_put(r)?) } else { None };
    let attachment = if flags & QF_ATTACHMENT != 0 {
        Some(r.read_payload()?)
    } else {
        None
    };
    Ok(Query {
        consolidation,
        parameters,
        source_info,
        value,
        attachment,
    })
}

const RF_CONSOLIDATION: u8 = 0b0000_0001;
const RF_IS_DELETE: u8 = 0b0000_0010;

pub fn write_reply(w: &mut Writer, reply: &Reply) {
    let mut flags = 0u8;
    if reply.consolidation.is_some() {
        flags |= RF_CONSOLIDATION;
    }
    if matches!(reply.body, ReplyBody::Delete(_)) {
        flags |= RF_IS_DELETE;
    }
    w.write_u8(flags);
    if let Some(c) = reply.consolidation {
        w.write_u8(c.wire_value());
    }
    match &reply.body {
        ReplyBody::Put(p) => write_put(w, p),
        ReplyBody::Delete(d) => write_delete(w, d),
    }
}

pub fn read_reply(r: &mut Reader) -> CodecResult<Reply> {
    let flags = r.read_u8()?;
    let consolidation = if flags & RF_CONSOLIDATION != 0 {
        Some(ConsolidationMode::from_wire_value(r.read_u8()?).ok_or(CodecError::Malformed)?)
    } else {
        None
    };
    let body = if flags & RF_IS_DELETE != 0 {
        ReplyBody::Delete(read_delete(r)?)
    } else {
        ReplyBody::Put(read_put(r)?)
    };
    Ok(Reply { consolidation, body })
}

const EF_ENCODING: u8 = 0b0000_0001;
const EF_SOURCE_INFO: u8 = 0b0000_0010;

pub fn write_err(w: &mut Writer, e: &Err) {
    let mut flags = 0u8;
    if e.encoding.is_some() {
        flags |= EF_ENCODING;
    }
    if e.source_info.is_some() {
        flags |= EF_SOURCE_INFO;
    }
    w.write_u8(flags);
    if let Some(enc) = &e.encoding {
        core_codec::write_encoding(w, enc);
    }
    if let Some(si) = &e.source_info {
        core_codec::write_source_info(w, si);
    }
    w.write_payload(&e.payload);
}

pub fn read_err(r: &mut Reader) -> CodecResult<Err> {
    let flags = r.read_u8()?;
    let encoding = (flags & EF_ENCODING != 0).then(|| core_codec::read_encoding(r)).transpose()?;
    let source_info = (flags & EF_SOURCE_INFO != 0)
        .then(|| core_codec::read_source_info(r))
        .transpose()?;
    let payload = r.read_payload()?;
    Ok(Err {
        encoding,
        source_info,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenoh_pico_collections::Bytes;

    #[test]
    fn put_roundtrip_with_all_optionals() {
        let p = Put {
            encoding: Some(zenoh_pico_protocol::core::Encoding::with_schema(1, "text")),
            timestamp: None,
            source_info: None,
            attachment: Some(Bytes::from_buf(vec![9, 9])),
            payload: Bytes::from_buf(vec![1, 2, 3, 4]),
        };
        let mut w = Writer::new();
        write_put(&mut w, &p);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_put(&mut r).unwrap(), p);
    }

    #[test]
    fn query_roundtrip_minimal() {
        let q = Query {
            consolidation: Some(ConsolidationMode::Latest),
            parameters: None,
            source_info: None,
            value: None,
            attachment: None,
        };
        let mut w = Writer::new();
        write_query(&mut w, &q);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_query(&mut r).unwrap(), q);
    }

    #[test]
    fn reply_delete_roundtrip() {
        let reply = Reply {
            consolidation: None,
            body: ReplyBody::Delete(Delete {
                timestamp: None,
                source_info: None,
                attachment: None,
            }),
        };
        let mut w = Writer::new();
        write_reply(&mut w, &reply);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_reply(&mut r).unwrap(), reply);
    }

    #[test]
    fn err_roundtrip() {
        let e = Err {
            encoding: None,
            source_info: None,
            payload: Bytes::from_buf(vec![7]),
        };
        let mut w = Writer::new();
        write_err(&mut w, &e);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_err(&mut r).unwrap(), e);
    }
}
