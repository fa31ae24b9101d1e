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
//! An in-memory byte-pipe pair standing in for a real link in tests: two
//! [`PairedLink`] endpoints sharing two byte queues, one per direction,
//! each gated by its own condvar so `read` really does block until a byte
//! is available, matching the real `Link::read` contract.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::{Link, LinkError, LinkResult};

struct Pipe {
    queue: Mutex<VecDeque<u8>>,
    ready: Condvar,
}

impl Pipe {
    fn new() -> Arc<Self> {
        Arc::new(Pipe {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        })
    }
}

pub struct PairedLink {
    outbound: Arc<Pipe>,
    inbound: Arc<Pipe>,
    mtu: usize,
    closed: Arc<AtomicBool>,
}

/// Creates two linked endpoints: writes on one are reads on the other.
pub fn paired(mtu: usize) -> (PairedLink, PairedLink) {
    let a_to_b = Pipe::new();
    let b_to_a = Pipe::new();
    let closed = Arc::new(AtomicBool::new(false));
    let a = PairedLink {
        outbound: a_to_b.clone(),
        inbound: b_to_a.clone(),
        mtu,
        closed: closed.clone(),
    };
    let b = PairedLink {
        outbound: b_to_a,
        inbound: a_to_b,
        mtu,
        closed,
    };
    (a, b)
}

impl Link for PairedLink {
    fn write(&self, buf: &[u8]) -> LinkResult<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }
        let mut q = self.outbound.queue.lock().unwrap();
        q.extend(buf.iter().copied());
        self.outbound.ready.notify_all();
        Ok(buf.len())
    }

    fn read(&self, buf: &mut [u8]) -> LinkResult<usize> {
        let mut q = self.inbound.queue.lock().unwrap();
        while q.is_empty() {
            if self.closed.load(Ordering::SeqCst) {
                return Err(LinkError::Closed);
            }
            q = self.inbound.ready.wait(q).unwrap();
        }
        let n = buf.len().min(q.len());
        for slot in buf.iter_mut().take(n) {
            *slot = q.pop_front().unwrap();
        }
        Ok(n)
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn close(&self) -> LinkResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.outbound.ready.notify_all();
        self.inbound.ready.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_on_one_end_is_readable_on_the_other() {
        let (a, b) = paired(1024);
        a.write(b"hello").unwrap();
        let mut buf = [0u8; 5];
        b.read(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn close_unblocks_a_waiting_reader() {
        let (a, b) = paired(1024);
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            b.read(&mut buf)
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        a.close().unwrap();
        assert_eq!(handle.join().unwrap(), Err(LinkError::Closed));
    }
}
