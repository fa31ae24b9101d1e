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
//! Codec for the scalar types in `zenoh_pico_protocol::core`: `ZenohId`,
//! `Timestamp`, `Encoding`, `SourceInfo`, `QoS`.

use std::convert::TryFrom;

use zenoh_pico_protocol::core::{Encoding, QoS, SourceInfo, Timestamp, ZenohId};

use crate::error::{CodecError, CodecResult};
use crate::reader::Reader;
use crate::writer::Writer;

/// The id is sent as one header byte `(len-1)<<4` (length in the high
/// nibble, as spec §6 specifies) followed by `len` raw bytes.
pub fn write_zid(w: &mut Writer, id: &ZenohId) {
    let bytes = id.as_slice();
    let header = ((bytes.len() as u8 - 1) & 0x0f) << 4;
    w.write_u8(header);
    w.write_bytes(bytes);
}

pub fn read_zid(r: &mut Reader) -> CodecResult<ZenohId> {
    let header = r.read_u8()?;
    let len = ((header >> 4) & 0x0f) as usize + 1;
    let bytes = r.read_borrowed(len)?;
    ZenohId::try_from(bytes).map_err(|_| CodecError::BadZenohId)
}

pub fn write_timestamp(w: &mut Writer, ts: &Timestamp) {
    crate::varint::write_u64(w, ts.get_time().as_u64());
    write_zid(w, &ZenohId::from(*ts.get_id()));
}

pub fn read_timestamp(r: &mut Reader) -> CodecResult<Timestamp> {
    let time = crate::varint::read_u64(r)?;
    let id = read_zid(r)?;
    Ok(Timestamp::new(uhlc::NTP64(time), id.into_uhlc()))
}

pub fn write_encoding(w: &mut Writer, enc: &Encoding) {
    crate::varint::write_u16(w, enc.id);
    match &enc.schema {
        Some(s) => {
            w.write_u8(1);
            w.write_string(s);
        }
        None => w.write_u8(0),
    }
}

pub fn read_encoding(r: &mut Reader) -> CodecResult<Encoding> {
    let id = crate::varint::read_u16(r)?;
    let has_schema = r.read_u8()? != 0;
    let schema = if has_schema { Some(r.read_string()?) } else { None };
    Ok(Encoding { id, schema })
}

pub fn write_source_info(w: &mut Writer, si: &SourceInfo) {
    write_zid(w, &si.zid);
    crate::varint::write_u32(w, si.entity_id);
    crate::varint::write_u32(w, si.source_sn);
}

pub fn read_source_info(r: &mut Reader) -> CodecResult<SourceInfo> {
    let zid = read_zid(r)?;
    let entity_id = crate::varint::read_u32(r)?;
    let source_sn = crate::varint::read_u32(r)?;
    Ok(SourceInfo {
        zid,
        entity_id,
        source_sn,
    })
}

pub fn write_qos(w: &mut Writer, qos: QoS) {
    w.write_u8(qos.to_byte());
}

pub fn read_qos(r: &mut Reader) -> CodecResult<QoS> {
    Ok(QoS::from_byte(r.read_u8()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_zid(rng: &mut impl Rng) -> ZenohId {
        let len = rng.gen_range(1..=16);
        let mut bytes = vec![0u8; len];
        loop {
            rng.fill(&mut bytes[..]);
            if bytes.iter().any(|b| *b != 0) {
                break;
            }
        }
        ZenohId::try_from(&bytes[..]).unwrap()
    }

    #[test]
    fn zid_roundtrip_random() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let id = random_zid(&mut rng);
            let mut w = Writer::new();
            write_zid(&mut w, &id);
            let bytes = w.finish();
            assert_eq!(bytes.len(), id.size() + 1);
            let mut r = Reader::new(&bytes);
            assert_eq!(read_zid(&mut r).unwrap(), id);
        }
    }

    #[test]
    fn encoding_roundtrip_with_and_without_schema() {
        for enc in [Encoding::new(5), Encoding::with_schema(5, "text/plain")] {
            let mut w = Writer::new();
            write_encoding(&mut w, &enc);
            let bytes = w.finish();
            let mut r = Reader::new(&bytes);
            assert_eq!(read_encoding(&mut r).unwrap(), enc);
        }
    }

    #[test]
    fn qos_roundtrip_preserves_priority_and_flags() {
        let qos = QoS::new(3, true, false);
        let mut w = Writer::new();
        write_qos(&mut w, qos);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_qos(&mut r).unwrap(), qos);
    }
}
