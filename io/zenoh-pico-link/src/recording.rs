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
//! A write-only [`Link`] test double: it never yields a byte to `read`,
//! so it catches any loopback path that mistakenly serializes onto the
//! wire instead of taking the session-local shortcut (spec scenarios
//! S1, S2, S6 assert zero bytes reach the link).

use std::sync::Mutex;

use crate::{Link, LinkError, LinkResult};

pub struct RecordingLink {
    written: Mutex<Vec<u8>>,
    mtu: usize,
}

impl RecordingLink {
    pub fn new(mtu: usize) -> Self {
        RecordingLink {
            written: Mutex::new(Vec::new()),
            mtu,
        }
    }

    /// Total bytes ever submitted via `write`.
    pub fn bytes_written(&self) -> usize {
        self.written.lock().unwrap().len()
    }

    /// A copy of everything written so far, in order.
    pub fn recorded(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }
}

impl Default for RecordingLink {
    fn default() -> Self {
        Self::new(2048)
    }
}

impl Link for RecordingLink {
    fn write(&self, buf: &[u8]) -> LinkResult<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn read(&self, _buf: &mut [u8]) -> LinkResult<usize> {
        Err(LinkError::Closed)
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn close(&self) -> LinkResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_accumulates_and_read_never_yields() {
        let link = RecordingLink::new(1024);
        link.write(b"abc").unwrap();
        link.write(b"de").unwrap();
        assert_eq!(link.bytes_written(), 5);
        assert_eq!(link.recorded(), b"abcde");
        let mut buf = [0u8; 4];
        assert_eq!(link.read(&mut buf), Err(LinkError::Closed));
    }
}
