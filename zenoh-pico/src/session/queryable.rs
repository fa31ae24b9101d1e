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
//! Queryables, with their responder operations `reply`/`reply_del`/
//! `reply_err`/`reply_final`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use zenoh_pico_collections::Bytes;
use zenoh_pico_protocol::core::{Encoding, Locality, MessageOrigin, SourceInfo, Timestamp};

use crate::error::{ZError, ZResult};
use crate::Session;

pub type QueryCallback = Box<dyn Fn(Query) + Send + Sync>;
pub type DropCallback = Box<dyn FnOnce() + Send>;

pub struct QueryableEntry {
    pub id: u32,
    pub declared_key: String,
    pub key: String,
    pub complete: bool,
    pub allowed_origin: Locality,
    callback: QueryCallback,
    drop_callback: Mutex<Option<DropCallback>>,
}

impl QueryableEntry {
    pub fn new(
        id: u32,
        declared_key: String,
        key: String,
        complete: bool,
        allowed_origin: Locality,
        callback: QueryCallback,
        drop_callback: Option<DropCallback>,
    ) -> Self {
        QueryableEntry {
            id,
            declared_key,
            key,
            complete,
            allowed_origin,
            callback,
            drop_callback: Mutex::new(drop_callback),
        }
    }

    pub fn dispatch(&self, query: Query) {
        (self.callback)(query);
    }
}

impl Drop for QueryableEntry {
    fn drop(&mut self) {
        if let Some(cb) = self.drop_callback.lock().unwrap().take() {
            cb();
        }
    }
}

/// The request a queryable callback receives. Replying routes back
/// through the session's loopback path (if the request arrived locally)
/// or through the transport (if it arrived over the link) — the
/// callback never needs to know which.
pub struct Query {
    pub(crate) request_id: u32,
    pub(crate) key: String,
    pub(crate) parameters: Bytes,
    pub(crate) origin: MessageOrigin,
    pub(crate) session: Session,
    pub(crate) finalized: AtomicBool,
}

impl Query {
    pub fn key_expr(&self) -> &str {
        &self.key
    }

    pub fn parameters(&self) -> &Bytes {
        &self.parameters
    }

    pub fn reply(&self, key: &str, payload: impl Into<Vec<u8>>) -> ZResult<()> {
        self.session
            .send_reply_put(self.request_id, self.origin, key, payload.into(), None, None)
    }

    pub fn reply_with_options(
        &self,
        key: &str,
        payload: impl Into<Vec<u8>>,
        encoding: Option<Encoding>,
        timestamp: Option<Timestamp>,
    ) -> ZResult<()> {
        self.session
            .send_reply_put(self.request_id, self.origin, key, payload.into(), encoding, timestamp)
    }

    pub fn reply_del(&self, key: &str) -> ZResult<()> {
        self.session.send_reply_delete(self.request_id, self.origin, key)
    }

    pub fn reply_err(&self, payload: impl Into<Vec<u8>>) -> ZResult<()> {
        self.session.send_reply_err(self.request_id, self.origin, payload.into())
    }

    /// Marks this request as fully answered: the querier's
    /// `remaining_finals` is decremented and, once it reaches zero, the
    /// pending query finalises.
    pub fn reply_final(&self) -> ZResult<()> {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.session.send_response_final(self.request_id, self.origin)
    }

    pub(crate) fn source_info(&self) -> Option<SourceInfo> {
        None
    }
}

impl Drop for Query {
    /// A queryable callback that forgets to call `reply_final` would
    /// otherwise hang its querier until timeout; finalising on drop keeps
    /// the "exactly once" contract (the `finalized` flag makes an
    /// explicit call a no-op here) while still surfacing bugs as early
    /// termination rather than a stuck pending query.
    fn drop(&mut self) {
        if !self.finalized.swap(true, Ordering::AcqRel) {
            let _ = self.session.send_response_final(self.request_id, self.origin);
        }
    }
}

pub(crate) fn encoding_or_empty(e: Option<Encoding>) -> Encoding {
    e.unwrap_or_default()
}

pub(crate) fn not_found(msg: impl Into<String>) -> ZError {
    ZError::Entity(msg.into())
}
