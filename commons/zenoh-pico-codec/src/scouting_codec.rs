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
//! Codec for the scouting family: `Scout`, `Hello`. Used outside an open
//! session; the procedural discovery loop that sends/listens for these is
//! out of scope here (spec §1), this module only (de)serializes the two
//! messages.

use zenoh_pico_protocol::core::WhatAmI;
use zenoh_pico_protocol::mid;
use zenoh_pico_protocol::scouting::{Hello, Scout};

use crate::error::{CodecError, CodecResult};
use crate::reader::Reader;
use crate::writer::Writer;

const SCOUT_FLAG_HAS_ZID: u8 = mid::FLAG_X1;

fn whatami_mask(what: &[WhatAmI]) -> u8 {
    what.iter().fold(0u8, |acc, w| acc | (1 << w.wire_value()))
}

fn whatami_from_mask(mask: u8) -> Vec<WhatAmI> {
    [WhatAmI::Router, WhatAmI::Peer, WhatAmI::Client]
        .into_iter()
        .filter(|w| mask & (1 << w.wire_value()) != 0)
        .collect()
}

pub fn write_scout(w: &mut Writer, msg: &Scout) {
    let mut header = mid::ID_SCOUT;
    if msg.zid.is_some() {
        header |= SCOUT_FLAG_HAS_ZID;
    }
    w.write_u8(header);
    w.write_u8(whatami_mask(&msg.what));
    if let Some(zid) = &msg.zid {
        crate::core_codec::write_zid(w, zid);
    }
}

pub fn read_scout(r: &mut Reader, header: u8) -> CodecResult<Scout> {
    let what = whatami_from_mask(r.read_u8()?);
    let zid = if header & SCOUT_FLAG_HAS_ZID != 0 {
        Some(crate::core_codec::read_zid(r)?)
    } else {
        None
    };
    Ok(Scout { what, zid })
}

pub fn write_hello(w: &mut Writer, msg: &Hello) {
    w.write_u8(mid::ID_HELLO);
    crate::core_codec::write_zid(w, &msg.zid);
    w.write_u8(msg.whatami.wire_value());
    crate::varint::write_u16(w, msg.locators.len() as u16);
    for loc in &msg.locators {
        w.write_string(loc);
    }
}

pub fn read_hello(r: &mut Reader, _header: u8) -> CodecResult<Hello> {
    let zid = crate::core_codec::read_zid(r)?;
    let whatami = WhatAmI::from_wire_value(r.read_u8()?).ok_or(CodecError::Malformed)?;
    let n = crate::varint::read_u16(r)? as usize;
    let mut locators = Vec::with_capacity(n.min(64));
    for _ in 0..n {
        locators.push(r.read_string()?);
    }
    Ok(Hello {
        zid,
        whatami,
        locators,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenoh_pico_protocol::core::ZenohId;

    #[test]
    fn scout_roundtrip_with_zid() {
        let msg = Scout {
            what: vec![WhatAmI::Router, WhatAmI::Peer],
            zid: Some(ZenohId::rand()),
        };
        let mut w = Writer::new();
        write_scout(&mut w, &msg);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        let header = r.read_u8().unwrap();
        let decoded = read_scout(&mut r, header).unwrap();
        assert_eq!(decoded.zid, msg.zid);
        assert_eq!(decoded.what, msg.what);
    }

    #[test]
    fn hello_roundtrip() {
        let msg = Hello {
            zid: ZenohId::rand(),
            whatami: WhatAmI::Peer,
            locators: vec!["tcp/127.0.0.1:7447".to_string()],
        };
        let mut w = Writer::new();
        write_hello(&mut w, &msg);
        let bytes = w.finish();
        let mut r = Reader::new(&bytes);
        let header = r.read_u8().unwrap();
        assert_eq!(read_hello(&mut r, header).unwrap(), msg);
    }
}
