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
//! Arc-sliced byte buffers.
//!
//! A [`ZSlice`] is a reference-counted, immutable view onto some backing
//! storage (a `Vec<u8>`, a `&'static [u8]`, a shared-memory segment, ...).
//! Cloning a `ZSlice` bumps a refcount instead of copying bytes; the backing
//! storage's own `Drop` impl is the "custom deleter" the C implementation
//! reifies explicitly. A [`Bytes`] value is a sequence of zero or more
//! `ZSlice`s, so payloads assembled from several non-contiguous sources (a
//! decode that aliases the input buffer, a header prepended without
//! recopying the body, ...) never need to be flattened until something
//! actually reads them linearly.

use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;

/// Anything that can back a [`ZSlice`]: owned bytes, a static slice, shared
/// memory, etc. Implementors' `Drop` is the deleter.
pub trait ZSliceBuffer: AsRef<[u8]> + Send + Sync {}
impl<T: AsRef<[u8]> + Send + Sync> ZSliceBuffer for T {}

/// A reference-counted slice `buf[start..end]`.
#[derive(Clone)]
pub struct ZSlice {
    buf: Arc<dyn ZSliceBuffer>,
    start: usize,
    end: usize,
}

impl ZSlice {
    pub fn new(buf: Arc<dyn ZSliceBuffer>, start: usize, end: usize) -> Self {
        let len = buf.as_ref().as_ref().len();
        debug_assert!(start <= end && end <= len);
        ZSlice { buf, start, end }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf.as_ref().as_ref()[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// A sub-slice of this slice, sharing the same backing storage.
    pub fn subslice(&self, start: usize, end: usize) -> Option<ZSlice> {
        if start > end || self.start + end > self.end {
            return None;
        }
        Some(ZSlice {
            buf: self.buf.clone(),
            start: self.start + start,
            end: self.start + end,
        })
    }
}

impl From<Vec<u8>> for ZSlice {
    fn from(v: Vec<u8>) -> Self {
        let len = v.len();
        ZSlice::new(Arc::new(v), 0, len)
    }
}

impl From<&'static [u8]> for ZSlice {
    fn from(v: &'static [u8]) -> Self {
        ZSlice::new(Arc::new(v), 0, v.len())
    }
}

impl PartialEq for ZSlice {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}
impl Eq for ZSlice {}

impl fmt::Debug for ZSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZSlice({} bytes)", self.len())
    }
}

/// A sequence of arc-sliced byte buffers, logically one contiguous payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bytes {
    slices: Vec<ZSlice>,
}

impl Bytes {
    pub fn empty() -> Self {
        Bytes { slices: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.slices.iter().map(ZSlice::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty() || self.len() == 0
    }

    /// Appends `other`'s slices onto `self`, taking ownership of `other`.
    pub fn append(&mut self, mut other: Bytes) {
        self.slices.append(&mut other.slices);
    }

    pub fn push_zslice(&mut self, slice: ZSlice) {
        if !slice.is_empty() {
            self.slices.push(slice);
        }
    }

    /// Copies `buf` into a single owned slice.
    pub fn from_buf(buf: impl Into<Vec<u8>>) -> Self {
        let v: Vec<u8> = buf.into();
        if v.is_empty() {
            return Bytes::empty();
        }
        Bytes {
            slices: vec![ZSlice::from(v)],
        }
    }

    pub fn from_zslice(slice: ZSlice) -> Self {
        let mut b = Bytes::empty();
        b.push_zslice(slice);
        b
    }

    pub fn slices(&self) -> &[ZSlice] {
        &self.slices
    }

    /// Flattens the whole value into a single owned `Vec<u8>`.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for s in &self.slices {
            out.extend_from_slice(s.as_slice());
        }
        out
    }

    /// Copies up to `buf.len()` bytes starting at `offset` into `buf`,
    /// flattening across slice boundaries. Returns the number of bytes
    /// copied.
    pub fn to_slice(&self, offset: usize, buf: &mut [u8]) -> usize {
        let mut reader = self.reader();
        reader.seek(SeekFrom::Start(offset as u64)).ok();
        reader.read(buf)
    }

    pub fn reader(&self) -> BytesReader<'_> {
        BytesReader {
            bytes: self,
            slice_idx: 0,
            in_slice_offset: 0,
        }
    }

    pub fn writer(cache_size: usize) -> BytesWriter {
        BytesWriter::new(cache_size)
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Bytes::from_buf(v)
    }
}

/// Traverses a [`Bytes`] value transparently across slice boundaries,
/// caching `(slice_idx, in_slice_offset)` so sequential reads never rescan
/// from the start.
pub struct BytesReader<'a> {
    bytes: &'a Bytes,
    slice_idx: usize,
    in_slice_offset: usize,
}

impl<'a> BytesReader<'a> {
    /// Total number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        let mut total = 0usize;
        for (i, s) in self.bytes.slices.iter().enumerate().skip(self.slice_idx) {
            total += if i == self.slice_idx {
                s.len().saturating_sub(self.in_slice_offset)
            } else {
                s.len()
            };
        }
        total
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let mut b = [0u8; 1];
        if self.read(&mut b) == 1 {
            Some(b[0])
        } else {
            None
        }
    }

    /// Copies bytes into `buf`, returning the number of bytes actually read
    /// (less than `buf.len()` only at end-of-value).
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut written = 0;
        while written < buf.len() {
            let slice = match self.bytes.slices.get(self.slice_idx) {
                Some(s) => s,
                None => break,
            };
            let avail = slice.len() - self.in_slice_offset;
            if avail == 0 {
                self.slice_idx += 1;
                self.in_slice_offset = 0;
                continue;
            }
            let to_copy = avail.min(buf.len() - written);
            let src = &slice.as_slice()[self.in_slice_offset..self.in_slice_offset + to_copy];
            buf[written..written + to_copy].copy_from_slice(src);
            written += to_copy;
            self.in_slice_offset += to_copy;
        }
        written
    }

    fn absolute_position(&self) -> usize {
        self.bytes.slices[..self.slice_idx]
            .iter()
            .map(ZSlice::len)
            .sum::<usize>()
            + self.in_slice_offset
    }

    fn seek_absolute(&mut self, target: usize) {
        let mut remaining = target;
        self.slice_idx = 0;
        self.in_slice_offset = 0;
        for (i, s) in self.bytes.slices.iter().enumerate() {
            if remaining < s.len() {
                self.slice_idx = i;
                self.in_slice_offset = remaining;
                return;
            }
            remaining -= s.len();
        }
        self.slice_idx = self.bytes.slices.len();
        self.in_slice_offset = 0;
    }

    pub fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let total = self.bytes.len() as i64;
        let target = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(n) => total + n,
            SeekFrom::Current(n) => self.absolute_position() as i64 + n,
        };
        if target < 0 || target > total {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek out of bounds",
            ));
        }
        self.seek_absolute(target as usize);
        Ok(target as u64)
    }
}

/// Coalesces small writes into cache-sized [`ZSlice`]s instead of allocating
/// one slice per write.
pub struct BytesWriter {
    slices: Vec<ZSlice>,
    cache: Vec<u8>,
    cache_size: usize,
}

impl BytesWriter {
    pub fn new(cache_size: usize) -> Self {
        BytesWriter {
            slices: Vec::new(),
            cache: Vec::with_capacity(cache_size.max(1)),
            cache_size: cache_size.max(1),
        }
    }

    pub fn write(&mut self, mut buf: &[u8]) {
        while !buf.is_empty() {
            let space = self.cache_size - self.cache.len();
            let take = space.min(buf.len());
            self.cache.extend_from_slice(&buf[..take]);
            buf = &buf[take..];
            if self.cache.len() == self.cache_size {
                self.flush_cache();
            }
        }
    }

    fn flush_cache(&mut self) {
        if !self.cache.is_empty() {
            let chunk = std::mem::replace(&mut self.cache, Vec::with_capacity(self.cache_size));
            self.slices.push(ZSlice::from(chunk));
        }
    }

    /// Appends an externally-owned slice without copying into the cache.
    pub fn write_zslice(&mut self, slice: ZSlice) {
        self.flush_cache();
        if !slice.is_empty() {
            self.slices.push(slice);
        }
    }

    pub fn finish(mut self) -> Bytes {
        self.flush_cache();
        Bytes {
            slices: self.slices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bytes_is_empty() {
        let b = Bytes::empty();
        assert_eq!(b.len(), 0);
        assert!(b.is_empty());
    }

    #[test]
    fn append_preserves_total_length() {
        let mut a = Bytes::from_buf(vec![1, 2, 3]);
        let b = Bytes::from_buf(vec![4, 5]);
        a.append(b);
        assert_eq!(a.len(), 5);
        assert_eq!(a.to_vec(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn seek_set_then_read_returns_byte_at_offset() {
        let b = Bytes::from_buf((0u8..10).collect::<Vec<_>>());
        let mut r = b.reader();
        r.seek(SeekFrom::Start(4)).unwrap();
        let mut one = [0u8; 1];
        r.read(&mut one);
        assert_eq!(one[0], 4);
    }

    #[test]
    fn seek_end_positions_k_before_end() {
        let b = Bytes::from_buf((0u8..10).collect::<Vec<_>>());
        let mut r = b.reader();
        r.seek(SeekFrom::End(-3)).unwrap();
        let mut rest = [0u8; 3];
        let n = r.read(&mut rest);
        assert_eq!(n, 3);
        assert_eq!(rest, [7, 8, 9]);
    }

    #[test]
    fn writer_coalesces_small_writes() {
        let mut w = BytesWriter::new(4);
        w.write(&[1]);
        w.write(&[2]);
        w.write(&[3]);
        w.write(&[4, 5, 6]);
        let b = w.finish();
        assert_eq!(b.to_vec(), vec![1, 2, 3, 4, 5, 6]);
        // first cache-sized chunk became its own slice, not one slice per write
        assert!(b.slices.len() < 6);
    }

    #[test]
    fn reads_across_slice_boundaries() {
        let mut a = Bytes::from_buf(vec![1, 2]);
        a.append(Bytes::from_buf(vec![3, 4, 5]));
        a.append(Bytes::from_buf(vec![6]));
        let mut r = a.reader();
        let mut out = [0u8; 6];
        assert_eq!(r.read(&mut out), 6);
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
    }
}
