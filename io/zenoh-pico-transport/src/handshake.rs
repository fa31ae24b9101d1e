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
//! Spec §4.5 "Handshake": client `Init` → peer `InitAck(cookie)` → client
//! `Open(cookie)` → peer `OpenAck`. The cookie is opaque bytes the client
//! echoes verbatim; this engine fills it with random bytes and otherwise
//! never inspects its contents (the accepting side is the only one that
//! needs to recognize its own cookie).

use log::debug;
use rand::RngCore;

use zenoh_pico_codec::reader::Reader;
use zenoh_pico_collections::Bytes;
use zenoh_pico_link::Link;
use zenoh_pico_protocol::core::{WhatAmI, ZenohId};
use zenoh_pico_protocol::transport::{
    Init, InitAck, Lease, Open, OpenAck, SnResolution, TransportMessage,
};

use crate::error::{TransportError, TransportResult};
use crate::framing::{read_framed, write_framed};
use crate::rx::RxState;
use crate::tx::TxState;

const COOKIE_LEN: usize = 16;

#[derive(Clone, Debug)]
pub struct LocalIdentity {
    pub whatami: WhatAmI,
    pub zid: ZenohId,
    pub sn_resolution: SnResolution,
    pub batch_size: u16,
    pub qos_enabled: bool,
    pub lease: Lease,
}

/// What the handshake learns about the far end, returned alongside the
/// seeded TX/RX state so the caller can build a `Transport`.
#[derive(Clone, Debug)]
pub struct PeerIdentity {
    pub whatami: WhatAmI,
    pub zid: ZenohId,
    pub sn_resolution: SnResolution,
    pub batch_size: u16,
    pub lease: Lease,
}

fn random_cookie() -> Bytes {
    let mut buf = vec![0u8; COOKIE_LEN];
    rand::thread_rng().fill_bytes(&mut buf);
    Bytes::from_buf(buf)
}

fn random_initial_sn(mask: u64) -> u64 {
    rand::thread_rng().next_u64() & mask
}

fn write_message(link: &dyn Link, msg: &TransportMessage) -> TransportResult<()> {
    let mut w = zenoh_pico_codec::writer::Writer::new();
    zenoh_pico_codec::transport_codec::write_transport_message(&mut w, msg);
    write_framed(link, &w.finish())
}

fn read_message(link: &dyn Link, max_len: usize) -> TransportResult<TransportMessage> {
    let payload = read_framed(link, max_len)?;
    let mut r = Reader::new(&payload);
    Ok(zenoh_pico_codec::transport_codec::read_transport_message(&mut r)?)
}

/// Runs the client half of the handshake over an already-open link.
pub fn connect(link: &dyn Link, local: &LocalIdentity) -> TransportResult<(PeerIdentity, TxState, RxState)> {
    write_message(
        link,
        &TransportMessage::Init(Init {
            whatami: local.whatami,
            zid: local.zid,
            sn_resolution: local.sn_resolution,
            batch_size: local.batch_size,
            qos_enabled: local.qos_enabled,
        }),
    )?;

    let init_ack = match read_message(link, zenoh_pico_codec::reader::DEFAULT_MAX_LEN)? {
        TransportMessage::InitAck(ack) => ack,
        _ => return Err(TransportError::HandshakeFailed("expected InitAck")),
    };

    let initial_sn = random_initial_sn(init_ack.sn_resolution.mask());
    write_message(
        link,
        &TransportMessage::Open(Open {
            lease: local.lease,
            initial_sn,
            cookie: init_ack.cookie.clone(),
        }),
    )?;

    let open_ack = match read_message(link, zenoh_pico_codec::reader::DEFAULT_MAX_LEN)? {
        TransportMessage::OpenAck(ack) => ack,
        _ => return Err(TransportError::HandshakeFailed("expected OpenAck")),
    };

    debug!("handshake complete with peer {:?}", init_ack.zid);

    let peer = PeerIdentity {
        whatami: init_ack.whatami,
        zid: init_ack.zid,
        sn_resolution: init_ack.sn_resolution,
        batch_size: init_ack.batch_size,
        lease: open_ack.lease,
    };
    let tx = TxState::initial_sn(local.sn_resolution, initial_sn);
    let rx = RxState::initial_sn(init_ack.sn_resolution, open_ack.initial_sn);
    Ok((peer, tx, rx))
}

/// Runs the responder half of the handshake over an already-open link.
pub fn accept(link: &dyn Link, local: &LocalIdentity) -> TransportResult<(PeerIdentity, TxState, RxState)> {
    let init = match read_message(link, zenoh_pico_codec::reader::DEFAULT_MAX_LEN)? {
        TransportMessage::Init(init) => init,
        _ => return Err(TransportError::HandshakeFailed("expected Init")),
    };

    let cookie = random_cookie();
    write_message(
        link,
        &TransportMessage::InitAck(InitAck {
            whatami: local.whatami,
            zid: local.zid,
            sn_resolution: local.sn_resolution,
            batch_size: local.batch_size,
            qos_enabled: local.qos_enabled,
            cookie: cookie.clone(),
        }),
    )?;

    let open = match read_message(link, zenoh_pico_codec::reader::DEFAULT_MAX_LEN)? {
        TransportMessage::Open(open) => open,
        _ => return Err(TransportError::HandshakeFailed("expected Open")),
    };
    if open.cookie != cookie {
        return Err(TransportError::HandshakeFailed("cookie mismatch"));
    }

    let initial_sn = random_initial_sn(local.sn_resolution.mask());
    write_message(
        link,
        &TransportMessage::OpenAck(OpenAck {
            lease: local.lease,
            initial_sn,
        }),
    )?;

    debug!("accepted handshake from peer {:?}", init.zid);

    let peer = PeerIdentity {
        whatami: init.whatami,
        zid: init.zid,
        sn_resolution: init.sn_resolution,
        batch_size: init.batch_size,
        lease: open.lease,
    };
    let tx = TxState::initial_sn(local.sn_resolution, initial_sn);
    let rx = RxState::initial_sn(init.sn_resolution, open.initial_sn);
    Ok((peer, tx, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenoh_pico_link::paired;

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

    #[test]
    fn client_and_responder_agree_on_a_session() {
        let (client_link, server_link) = paired(8192);
        let client_id = identity();
        let server_id = identity();
        let (client_zid, server_zid) = (client_id.zid, server_id.zid);

        let server = std::thread::spawn(move || accept(&server_link, &server_id).unwrap());
        let (client_view_of_peer, _tx, rx) = connect(&client_link, &client_id).unwrap();
        let (server_view_of_peer, tx, _srx) = server.join().unwrap();

        assert_eq!(client_view_of_peer.zid, server_zid);
        assert_eq!(server_view_of_peer.zid, client_zid);
        // the client's initial sn (seeded into its TxState) is the same
        // value the server's RxState was primed to expect next.
        assert_eq!(rx.expected_reliable_sn(), Some(tx.peek_reliable_sn()));
    }
}
