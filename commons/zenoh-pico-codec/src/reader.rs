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
//! The decode-side cursor. Zero-allocation on the hot path: every read
//! either copies a handful of scalar bytes or hands back a borrowed slice
//! (`read_borrowed`) that the caller arc-slices into a `ZSlice` without a
//! second copy, per spec §4.2.

use zenoh_pico_collections::Bytes;

use crate::error::{CodecError, CodecResult};

pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// An implementation-chosen ceiling on any single length field this
    /// reader will accept, guarding against a corrupt/hostile length that
    /// would otherwise force an enormous allocation (spec §4.2 "a length
    /// that exceeds an implementation-chosen MTU bound is an error").
    max_len: usize,
}

pub const DEFAULT_MAX_LEN: usize = 16 * 1024 * 1024;

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader {
            buf,
            pos: 0,
            max_len: DEFAULT_MAX_LEN,
        }
    }

    pub fn with_max_len(buf: &'a [u8], max_len: usize) -> Self {
        Reader { buf, pos: 0, max_len }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_u8(&self) -> CodecResult<u8> {
        self.buf.get(self.pos).copied().ok_or(CodecError::UnexpectedEof)
    }

    pub fn read_u8(&mut self) -> CodecResult<u8> {
        let b = self.peek_u8()?;
        self.pos += 1;
        Ok(b)
    }

    /// Borrows `n` bytes from the input without copying.
    pub fn read_borrowed(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn read_sized_bytes(&mut self) -> CodecResult<&'a [u8]> {
        let len = crate::varint::read_u64(self)? as usize;
        if len > self.max_len {
            return Err(CodecError::LengthExceedsMtu);
        }
        self.read_borrowed(len)
    }

    pub fn read_string(&mut self) -> CodecResult<String> {
        let bytes = self.read_sized_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::Malformed)
    }

    /// Decodes a length-prefixed payload into an owned [`Bytes`] value,
    /// aliasing the input via a single arc-slice over a copy of the
    /// region (the reader only ever sees a borrowed `&[u8]`, so "alias"
    /// here means "one contiguous copy", not a zero-copy reference into
    /// caller-owned storage — true zero-copy aliasing happens one layer
    /// up, where the transport hands the codec an owned receive buffer it
    /// can wrap in an `Arc` once and slice many times).
    pub fn read_payload(&mut self) -> CodecResult<Bytes> {
        let bytes = self.read_sized_bytes()?;
        Ok(Bytes::from_buf(bytes.to_vec()))
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}
