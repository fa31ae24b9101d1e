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
//! Small, dependency-free collections shared by the rest of the `zenoh-pico`
//! workspace: an arc-sliced byte buffer (`bytes`), a singly linked list with
//! cheap arbitrary removal (`slist`), a dense small-integer map for resource
//! tables (`intmap`), and a deadline-ordered map used by reply consolidation
//! and the periodic scheduler (`sortedmap`).
//!
//! `HashMap` and refcounting are deliberately *not* reimplemented here:
//! `std::collections::HashMap` and `std::sync::{Arc, Weak}` already are the
//! idiomatic-Rust answer to what the C implementation hand-rolls; see
//! `refcount` for the thin aliases that document the mapping.

pub mod bytes;
pub mod intmap;
pub mod refcount;
pub mod slist;
pub mod sortedmap;

pub use bytes::{Bytes, ZSlice};
pub use intmap::IntMap;
pub use slist::Slist;
pub use sortedmap::SortedMap;
