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
//! Network messages: `Declare`, `Push`, `Request`, `Response`,
//! `ResponseFinal`, `Interest`. Carried inside a `Frame`.

use crate::core::{Locality, Timestamp};
use crate::zenoh::{Err, Put, Delete, Query, Reply};

/// A minimal bitflags-style macro: the workspace doesn't carry the
/// `bitflags` crate, and this is the only flag set in the whole protocol,
/// so a tiny local macro is clearer than adding a dependency for four bits.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name($ty);

        impl $name {
            $(pub const $flag: $name = $name($value);)*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub const fn bits(self) -> $ty {
                self.0
            }

            pub const fn from_bits_truncate(bits: $ty) -> Self {
                $name(bits)
            }

            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                $name(self.0 | rhs.0)
            }
        }
    };
}

/// A wire key: either a numeric scope alias, a string suffix, or both (the
/// mapping flag says whether the scope id was minted by the sender or the
/// receiver, i.e. which side's resource table to resolve it against).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireExpr {
    pub scope: u16,
    pub suffix: Option<String>,
    pub mapping: Mapping,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mapping {
    /// The scope id was assigned by the sender of this message.
    Sender,
    /// The scope id was assigned by the receiver of this message (i.e. it
    /// indexes the receiver's own local resource table).
    Receiver,
}

impl WireExpr {
    pub fn from_suffix(suffix: impl Into<String>) -> Self {
        WireExpr {
            scope: 0,
            suffix: Some(suffix.into()),
            mapping: Mapping::Sender,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclareResource {
    pub id: u16,
    pub key: WireExpr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclareSubscriber {
    pub id: u32,
    pub key: WireExpr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndeclareSubscriber {
    pub id: u32,
    pub key: WireExpr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclareQueryable {
    pub id: u32,
    pub key: WireExpr,
    pub complete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndeclareQueryable {
    pub id: u32,
    pub key: WireExpr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclareToken {
    pub id: u32,
    pub key: WireExpr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndeclareToken {
    pub id: u32,
    pub key: WireExpr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclareBody {
    Resource(DeclareResource),
    Subscriber(DeclareSubscriber),
    UndeclSubscriber(UndeclareSubscriber),
    Queryable(DeclareQueryable),
    UndeclQueryable(UndeclareQueryable),
    Token(DeclareToken),
    UndeclToken(UndeclareToken),
    Keyexpr(DeclareResource),
}

/// `Declare` carries exactly one declaration body, an optional timestamp,
/// and — when it answers an `Interest` query — the interest id it answers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declare {
    pub body: DeclareBody,
    pub timestamp: Option<Timestamp>,
    pub interest_id: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushPayload {
    Put(Put),
    Delete(Delete),
}

/// Fire-and-forget: carries a `Put` or `Delete` body toward matching
/// subscriptions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Push {
    pub key: WireExpr,
    pub qos: crate::core::QoS,
    pub timestamp: Option<Timestamp>,
    pub payload: PushPayload,
}

/// A query, or a reliability-acking put/delete, addressed to matching
/// queryables (or, for acking puts, the transport's reliability layer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub id: u32,
    pub key: WireExpr,
    pub target: crate::core::QueryTarget,
    pub payload: RequestPayload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestPayload {
    Query(Query),
    Put(Put),
    Delete(Delete),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponsePayload {
    Reply(Reply),
    Err(Err),
}

/// One answer to a `Request`; a given request may receive zero or more of
/// these before its `ResponseFinal`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub request_id: u32,
    pub key: WireExpr,
    pub payload: ResponsePayload,
}

/// Marks that a responder has no further `Response`s for this request id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseFinal {
    pub request_id: u32,
}

bitflags_like! {
    /// What an `Interest` asks to be notified about.
    pub struct InterestMask: u8 {
        const KEYEXPR   = 0b0000_0001;
        const SUBSCRIBER = 0b0000_0010;
        const QUERYABLE = 0b0000_0100;
        const TOKEN     = 0b0000_1000;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interest {
    pub id: u32,
    pub key: Option<WireExpr>,
    pub mask: InterestMask,
    pub restricted: bool,
    pub current: bool,
    pub future: bool,
    pub aggregate: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkMessage {
    Declare(Declare),
    Push(Push),
    Request(Request),
    Response(Response),
    ResponseFinal(ResponseFinal),
    Interest(Interest),
}

impl NetworkMessage {
    /// The (origin-agnostic) locality a handler must admit for this
    /// message to be eligible for loopback dispatch; see spec §4.4.
    pub fn default_locality(&self) -> Locality {
        Locality::Any
    }
}
