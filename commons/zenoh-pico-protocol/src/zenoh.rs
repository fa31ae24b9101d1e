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
//! Zenoh body messages: `Put`, `Delete`, `Query`, `Reply`, `Err`. These are
//! carried inside a `Push` (Put/Delete), a `Request` (Query), or a
//! `Response` (Reply/Err) network message.

use zenoh_pico_collections::Bytes;

use crate::core::{ConsolidationMode, Encoding, SourceInfo, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Put {
    pub encoding: Option<Encoding>,
    pub timestamp: Option<Timestamp>,
    pub source_info: Option<SourceInfo>,
    pub attachment: Option<Bytes>,
    pub payload: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delete {
    pub timestamp: Option<Timestamp>,
    pub source_info: Option<SourceInfo>,
    pub attachment: Option<Bytes>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub consolidation: Option<ConsolidationMode>,
    pub parameters: Option<Bytes>,
    pub source_info: Option<SourceInfo>,
    /// Optional inline value (put-like payload attached to the query, e.g.
    /// for a "request with body" pattern).
    pub value: Option<Put>,
    pub attachment: Option<Bytes>,
}

/// `Reply` is a Put or Delete body, with an optional consolidation-mode
/// override carried alongside.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyBody {
    Put(Put),
    Delete(Delete),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub consolidation: Option<ConsolidationMode>,
    pub body: ReplyBody,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Err {
    pub encoding: Option<Encoding>,
    pub source_info: Option<SourceInfo>,
    pub payload: Bytes,
}

/// The fully assembled, application-facing unit a subscription callback
/// receives: (key, payload, encoding, kind, timestamp, QoS, attachment,
/// source-info) per spec §3.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub key: String,
    pub payload: Bytes,
    pub encoding: Encoding,
    pub kind: crate::core::SampleKind,
    pub timestamp: Option<Timestamp>,
    pub qos: crate::core::QoS,
    pub attachment: Option<Bytes>,
    pub source_info: Option<SourceInfo>,
}
