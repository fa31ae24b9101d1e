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
//! The encode-side work buffer. Backed by a plain `Vec<u8>`: the transport
//! engine (`zenoh-pico-transport`) is the one that needs the siphon /
//! zero-copy behavior spec §4.5 describes for moving bytes between TX
//! buffers, and it does so at the `Bytes`/`ZSlice` level, not here.

use zenoh_pico_collections::Bytes;

#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Writer {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn write_u8(&mut self, b: u8) {
        self.buf.push(b);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Length-prefixed (varint) raw bytes.
    pub fn write_sized_bytes(&mut self, bytes: &[u8]) {
        crate::varint::write_u64(self, bytes.len() as u64);
        self.write_bytes(bytes);
    }

    /// Length-prefixed UTF-8 string, no terminator (spec §6).
    pub fn write_string(&mut self, s: &str) {
        self.write_sized_bytes(s.as_bytes());
    }

    /// A `Bytes` value: varint length prefix followed by its flattened
    /// payload (spec §4.1).
    pub fn write_payload(&mut self, bytes: &Bytes) {
        crate::varint::write_u64(self, bytes.len() as u64);
        for slice in bytes.slices() {
            self.write_bytes(slice.as_slice());
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
