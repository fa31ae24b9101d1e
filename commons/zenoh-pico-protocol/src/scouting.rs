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
//! Scouting messages (`Scout`, `Hello`), used outside an open session.
//! Per spec §1, the procedural scouting loop (multicast send/listen) is
//! out of scope here; only the wire codec and a session-less send/recv
//! pair are provided, callable by a host-provided discovery loop.

use crate::core::{WhatAmI, ZenohId};

/// Asks any reachable peer matching `what` to identify itself with a
/// `Hello`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scout {
    pub what: Vec<WhatAmI>,
    pub zid: Option<ZenohId>,
}

/// A peer's self-identification, answering a `Scout` (or sent
/// unsolicited/periodically by some transports).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hello {
    pub zid: ZenohId,
    pub whatami: WhatAmI,
    pub locators: Vec<String>,
}
