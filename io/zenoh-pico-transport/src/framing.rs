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
//! Spec §4.5's receive path assumes "the read loop reads one transport
//! message at a time", which a packet link (UDP, BLE) gives for free but
//! a stream link (TCP, serial) does not. To make every [`crate::Link`]
//! behave like a packet link from the codec's point of view, every
//! transport message this engine writes is preceded by a 4-byte
//! little-endian length prefix; the read side always reads the prefix
//! first, then exactly that many bytes, before handing the record to the
//! codec. This mirrors `zenoh-pico`'s own batching: a `Frame`/`Fragment`
//! on the wire is already a self-delimited TLV-ish record once the
//! session layer is done with it, so the extra 4 bytes just generalize
//! that property to the stream-link case.

use zenoh_pico_link::Link;

use crate::error::{TransportError, TransportResult};

pub const LENGTH_PREFIX_BYTES: usize = 4;

pub fn write_framed(link: &dyn Link, payload: &[u8]) -> TransportResult<()> {
    let len = payload.len() as u32;
    let mut header = [0u8; LENGTH_PREFIX_BYTES];
    header.copy_from_slice(&len.to_le_bytes());
    zenoh_pico_link::write_all(link, &header)?;
    zenoh_pico_link::write_all(link, payload)?;
    Ok(())
}

pub fn read_framed(link: &dyn Link, max_len: usize) -> TransportResult<Vec<u8>> {
    let mut header = [0u8; LENGTH_PREFIX_BYTES];
    zenoh_pico_link::read_exact(link, &mut header)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > max_len {
        return Err(TransportError::OversizedMessage);
    }
    let mut payload = vec![0u8; len];
    zenoh_pico_link::read_exact(link, &mut payload)?;
    Ok(payload)
}
