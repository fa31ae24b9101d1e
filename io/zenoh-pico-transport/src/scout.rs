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
//! A bare `Scout`/`Hello` send/recv pair, usable outside any [`crate::Transport`]
//! or handshake. Spec §1 excludes the procedural discovery loop (deciding
//! when to scout, over which locators, multicast group membership, etc.)
//! as a non-goal; a host-provided loop drives these two functions over
//! whatever [`Link`] it already has open to reach a scouting peer.

use zenoh_pico_codec::reader::Reader;
use zenoh_pico_codec::writer::Writer;
use zenoh_pico_link::Link;
use zenoh_pico_protocol::scouting::{Hello, Scout};

use crate::error::TransportResult;
use crate::framing::{read_framed, write_framed};

/// Encodes and writes a `Scout` message to `link`.
pub fn send_scout(link: &dyn Link, scout: &Scout) -> TransportResult<()> {
    let mut w = Writer::new();
    zenoh_pico_codec::scouting_codec::write_scout(&mut w, scout);
    write_framed(link, &w.finish())
}

/// Reads and decodes one `Hello` message from `link`.
pub fn recv_hello(link: &dyn Link, max_len: usize) -> TransportResult<Hello> {
    let payload = read_framed(link, max_len)?;
    let mut r = Reader::new(&payload);
    let header = r.read_u8()?;
    Ok(zenoh_pico_codec::scouting_codec::read_hello(&mut r, header)?)
}

/// Encodes and writes a `Hello` message to `link`, the responder's half of
/// a scout/hello exchange.
pub fn send_hello(link: &dyn Link, hello: &Hello) -> TransportResult<()> {
    let mut w = Writer::new();
    zenoh_pico_codec::scouting_codec::write_hello(&mut w, hello);
    write_framed(link, &w.finish())
}

/// Reads and decodes one `Scout` message from `link`.
pub fn recv_scout(link: &dyn Link, max_len: usize) -> TransportResult<Scout> {
    let payload = read_framed(link, max_len)?;
    let mut r = Reader::new(&payload);
    let header = r.read_u8()?;
    Ok(zenoh_pico_codec::scouting_codec::read_scout(&mut r, header)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenoh_pico_link::paired;
    use zenoh_pico_protocol::core::{WhatAmI, ZenohId};

    #[test]
    fn scout_then_hello_over_a_paired_link() {
        let (a, b) = paired(4096);

        let scout = Scout {
            what: vec![WhatAmI::Router, WhatAmI::Peer],
            zid: Some(ZenohId::rand()),
        };
        send_scout(&a, &scout).unwrap();
        let received_scout = recv_scout(&b, zenoh_pico_codec::reader::DEFAULT_MAX_LEN).unwrap();
        assert_eq!(received_scout, scout);

        let hello = Hello {
            zid: ZenohId::rand(),
            whatami: WhatAmI::Peer,
            locators: vec!["tcp/127.0.0.1:7447".to_string()],
        };
        send_hello(&b, &hello).unwrap();
        let received_hello = recv_hello(&a, zenoh_pico_codec::reader::DEFAULT_MAX_LEN).unwrap();
        assert_eq!(received_hello, hello);
    }
}
