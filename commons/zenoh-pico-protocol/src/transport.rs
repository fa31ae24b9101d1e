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
//! Transport (session-framing) messages: `Join`, `Init`, `Open`, `Close`,
//! `KeepAlive`, `Frame`, `Fragment`.

use zenoh_pico_collections::Bytes;

use crate::core::{WhatAmI, ZenohId};
use crate::network::NetworkMessage;

/// Sequence-number resolution: how many bits of `sn` are significant before
/// it wraps. Negotiated in `Init`/`Join`; default is 28 bits (spec §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnResolution(pub u8);

impl SnResolution {
    pub const DEFAULT_BITS: u8 = 28;

    pub fn mask(self) -> u64 {
        (1u64 << self.0) - 1
    }
}

impl Default for SnResolution {
    fn default() -> Self {
        SnResolution(Self::DEFAULT_BITS)
    }
}

/// Lease duration, carried as milliseconds or seconds*1000 depending on
/// the wire `T` flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lease {
    pub millis: u64,
}

impl Lease {
    pub fn from_millis(millis: u64) -> Self {
        Lease { millis }
    }

    pub fn from_secs(secs: u64) -> Self {
        Lease { millis: secs * 1000 }
    }

    /// Whether the wire form should set the `T` (seconds-unit) flag: true
    /// when the duration is an exact multiple of 1000ms, matching what the
    /// C source picks at encode time to save a byte or two on common
    /// lease values.
    pub fn is_whole_seconds(self) -> bool {
        self.millis % 1000 == 0
    }
}

/// Client `Init` (first handshake message).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Init {
    pub whatami: WhatAmI,
    pub zid: ZenohId,
    pub sn_resolution: SnResolution,
    pub batch_size: u16,
    pub qos_enabled: bool,
}

/// Peer `InitAck` reply, echoing a cookie the client must present in `Open`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitAck {
    pub whatami: WhatAmI,
    pub zid: ZenohId,
    pub sn_resolution: SnResolution,
    pub batch_size: u16,
    pub qos_enabled: bool,
    pub cookie: Bytes,
}

/// Client `Open`, completing the handshake by echoing the cookie verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Open {
    pub lease: Lease,
    pub initial_sn: u64,
    pub cookie: Bytes,
}

/// Peer `OpenAck`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenAck {
    pub lease: Lease,
    pub initial_sn: u64,
}

/// Multicast join message: combines `Init`'s negotiation fields with
/// `Open`'s lease, since multicast has no per-peer handshake round trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    pub whatami: WhatAmI,
    pub zid: ZenohId,
    pub sn_resolution: SnResolution,
    pub lease: Lease,
    pub next_sn: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    Generic,
    Expired,
    IoError,
}

impl CloseReason {
    pub fn wire_value(self) -> u8 {
        match self {
            CloseReason::Generic => 0,
            CloseReason::Expired => 1,
            CloseReason::IoError => 2,
        }
    }

    pub fn from_wire_value(v: u8) -> Self {
        match v {
            1 => CloseReason::Expired,
            2 => CloseReason::IoError,
            _ => CloseReason::Generic,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Close {
    pub reason: CloseReason,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeepAlive;

/// Reliability lane a `Frame`/`Fragment` travels on. Best-effort frames
/// with a stale `sn` are dropped silently; reliable frames with an
/// unexpected `sn` trigger a reassembly reset (spec §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reliability {
    Reliable,
    BestEffort,
}

/// One or more network messages batched under a single sequence number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub reliability: Reliability,
    pub sn: u64,
    pub messages: Vec<NetworkMessage>,
}

/// One piece of a network message too large to fit in one `Frame`. `more`
/// is false only on the last fragment of a given message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub reliability: Reliability,
    pub more: bool,
    pub sn: u64,
    pub payload: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportMessage {
    Join(Join),
    Init(Init),
    InitAck(InitAck),
    Open(Open),
    OpenAck(OpenAck),
    Close(Close),
    KeepAlive(KeepAlive),
    Frame(Frame),
    Fragment(Fragment),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_seconds_roundtrip_flag() {
        assert!(Lease::from_secs(10).is_whole_seconds());
        assert!(!Lease::from_millis(1500).is_whole_seconds());
    }

    #[test]
    fn sn_resolution_default_is_28_bits() {
        assert_eq!(SnResolution::default().0, 28);
        assert_eq!(SnResolution::default().mask(), (1u64 << 28) - 1);
    }
}
