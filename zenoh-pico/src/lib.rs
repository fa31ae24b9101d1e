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
//! A constrained-device client implementation of the zenoh session
//! protocol: the wire codec and transport live in their own crates
//! ([`zenoh_pico_codec`], [`zenoh_pico_transport`]); this crate is the
//! session engine built on top of them — resources, subscriptions,
//! queryables, pending queries, interests and liveliness tokens, wired to
//! an explicit scheduler rather than an async runtime, matching
//! `zenoh-pico`'s single-threaded-by-default build.
//!
//! Entry points: [`Session::open`] (or [`Session::open_loopback_only`] for
//! tests and embedded uses with no link) to get a [`Session`], then either
//! [`Session::spawn_io_threads`] for the multi-threaded build or
//! [`Session::read`]/[`Session::send_keep_alive`]/[`Session::scheduler_tick`]
//! driven from an application's own loop for the single-threaded one.

pub mod config;
pub mod error;
pub mod session;

pub use config::Config;
pub use error::{ZError, ZResult};
pub use session::interest::InterestRecord;
pub use session::liveliness::LivelinessTable;
pub use session::query::{DoneCallback, PendingQuery, QueryReply, ReplyCallback};
pub use session::queryable::{DropCallback as QueryableDropCallback, Query, QueryCallback};
pub use session::subscription::{DataCallback, DropCallback as SubscriberDropCallback};
pub use session::Session;

pub use zenoh_pico_protocol::core::{
    ConsolidationMode, Encoding, Locality, MessageOrigin, QueryTarget, SampleKind, WhatAmI,
    ZenohId,
};
pub use zenoh_pico_protocol::network::InterestMask;
pub use zenoh_pico_protocol::zenoh::Sample;
