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
//! Message types for the wire-level message family: scouting, transport
//! (session framing), network (declarations, push/request/response), and
//! zenoh bodies (put/delete/query/reply/err). Pure data types only — the
//! byte-level encode/decode logic lives in `zenoh-pico-codec`, which
//! depends on this crate.

pub mod core;
pub mod extension;
pub mod mid;
pub mod network;
pub mod scouting;
pub mod transport;
pub mod zenoh;
