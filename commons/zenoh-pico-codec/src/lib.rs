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
//! The wire codec for every message family in `zenoh_pico_protocol`:
//! scouting, transport (session framing), network (declarations,
//! push/request/response), and zenoh bodies (put/delete/query/reply/err).
//!
//! Decoding is zero-allocation on the hot path wherever possible: the
//! [`reader::Reader`] either borrows straight out of the input buffer or
//! copies once into an arc-sliced [`zenoh_pico_collections::Bytes`], never
//! both.

pub mod core_codec;
pub mod error;
pub mod extension_codec;
pub mod network_codec;
pub mod reader;
pub mod scouting_codec;
pub mod transport_codec;
pub mod varint;
pub mod writer;
pub mod zenoh_codec;

pub use error::{CodecError, CodecResult};
pub use reader::Reader;
pub use writer::Writer;
