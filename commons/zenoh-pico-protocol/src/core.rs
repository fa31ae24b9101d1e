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
//! Scalar types shared by every message family: the Zenoh identifier, the
//! hybrid-logical-clock timestamp built on top of it, encodings, QoS, and
//! the small enums (locality, consolidation, query target) that several
//! message bodies carry.

use std::convert::TryFrom;
use std::fmt;

use rand::RngCore;

/// A 1..16-byte little-endian unsigned node identifier. Zero is reserved
/// and never assigned to a live session.
///
/// Backed by `uhlc::ID` (the hybrid-logical-clock crate's own "1..16 byte
/// id" type, already a workspace dependency) rather than hand-rolling a
/// second identifier type: a `ZenohId` *is* the id half of a [`Timestamp`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZenohId(uhlc::ID);

impl ZenohId {
    pub const MAX_SIZE: usize = 16;

    /// Generates a random 16-byte id, as `zenoh-pico`'s `_z_id_t` does at
    /// session open time when the config doesn't pin one.
    pub fn rand() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        ZenohId(uhlc::ID::try_from(&bytes[..]).expect("16 bytes is always a valid uhlc::ID"))
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn size(&self) -> usize {
        self.0.size()
    }

    pub fn into_uhlc(self) -> uhlc::ID {
        self.0
    }
}

impl TryFrom<&[u8]> for ZenohId {
    type Error = ();
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.is_empty() || bytes.len() > Self::MAX_SIZE || bytes.iter().all(|b| *b == 0) {
            return Err(());
        }
        uhlc::ID::try_from(bytes).map(ZenohId).map_err(|_| ())
    }
}

impl From<uhlc::ID> for ZenohId {
    fn from(id: uhlc::ID) -> Self {
        ZenohId(id)
    }
}

impl fmt::Debug for ZenohId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZenohId(")?;
        for b in self.0.as_slice() {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for ZenohId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A hybrid-logical-clock timestamp: a 64-bit time value plus the [`ZenohId`]
/// that minted it. Equality is by `(time, id)`, exactly as `uhlc::Timestamp`
/// already implements.
pub type Timestamp = uhlc::Timestamp;

/// A 16-bit numeric encoding id plus an optional UTF-8 schema suffix
/// (e.g. a MIME type or content-schema string qualifying `id`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Encoding {
    pub id: u16,
    pub schema: Option<String>,
}

impl Encoding {
    pub const EMPTY: u16 = 0;

    pub fn new(id: u16) -> Self {
        Encoding { id, schema: None }
    }

    pub fn with_schema(id: u16, schema: impl Into<String>) -> Self {
        Encoding {
            id,
            schema: Some(schema.into()),
        }
    }
}

/// (source ZID, entity-id, source-sn). The all-zero value is the "absent"
/// sentinel: `entity_id == 0 && source_sn == 0` with a zeroed `zid`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub zid: ZenohId,
    pub entity_id: u32,
    pub source_sn: u32,
}

/// Bits: bit4 = express, bit3 = nodrop (reliable routing), bits0..2 =
/// priority (0..7, 0 = highest). Default is (express=false, nodrop=false,
/// priority=5), matching `zenoh-pico`'s `Z_QOS_DEFAULT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QoS(u8);

impl QoS {
    pub const PRIORITY_MASK: u8 = 0b0000_0111;
    pub const NODROP_BIT: u8 = 0b0000_1000;
    pub const EXPRESS_BIT: u8 = 0b0001_0000;
    pub const DEFAULT_PRIORITY: u8 = 5;

    pub fn new(priority: u8, nodrop: bool, express: bool) -> Self {
        let mut byte = priority.min(7) & Self::PRIORITY_MASK;
        if nodrop {
            byte |= Self::NODROP_BIT;
        }
        if express {
            byte |= Self::EXPRESS_BIT;
        }
        QoS(byte)
    }

    pub fn from_byte(byte: u8) -> Self {
        QoS(byte & (Self::PRIORITY_MASK | Self::NODROP_BIT | Self::EXPRESS_BIT))
    }

    pub fn to_byte(self) -> u8 {
        self.0
    }

    pub fn priority(self) -> u8 {
        self.0 & Self::PRIORITY_MASK
    }

    pub fn is_reliable(self) -> bool {
        self.0 & Self::NODROP_BIT != 0
    }

    pub fn is_express(self) -> bool {
        self.0 & Self::EXPRESS_BIT != 0
    }
}

impl Default for QoS {
    fn default() -> Self {
        QoS::new(Self::DEFAULT_PRIORITY, false, false)
    }
}

/// Number of independent priority lanes (0..=7), each with its own
/// reliable/best-effort sequence-number counters when QoS is negotiated.
pub const NUM_PRIORITIES: usize = 8;

/// Whether a handler may be triggered by messages produced locally
/// (within this same session) as well as messages arriving over the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locality {
    Any,
    SessionLocal,
    Remote,
}

impl Locality {
    pub fn admits(self, origin: MessageOrigin) -> bool {
        match (self, origin) {
            (Locality::Any, _) => true,
            (Locality::SessionLocal, MessageOrigin::Local) => true,
            (Locality::Remote, MessageOrigin::Remote) => true,
            _ => false,
        }
    }
}

/// Tags whether a message being dispatched originated from this session's
/// own loopback path or arrived over the link from a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOrigin {
    Local,
    Remote,
}

/// Reply deduplication policy applied at the querier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsolidationMode {
    None,
    Monotonic,
    Latest,
    /// Wire sentinel meaning "let the router/querier pick"; collapsed to
    /// [`ConsolidationMode::Latest`] for client-side buffering (spec §9).
    Default,
}

impl ConsolidationMode {
    /// The mode actually applied by the local consolidation buffer.
    pub fn effective(self) -> EffectiveConsolidation {
        match self {
            ConsolidationMode::None => EffectiveConsolidation::None,
            ConsolidationMode::Monotonic => EffectiveConsolidation::Monotonic,
            ConsolidationMode::Latest | ConsolidationMode::Default => {
                EffectiveConsolidation::Latest
            }
        }
    }

    pub fn wire_value(self) -> u8 {
        match self {
            ConsolidationMode::Default => 0,
            ConsolidationMode::None => 1,
            ConsolidationMode::Monotonic => 2,
            ConsolidationMode::Latest => 3,
        }
    }

    pub fn from_wire_value(v: u8) -> Option<Self> {
        match v {
            0 => Some(ConsolidationMode::Default),
            1 => Some(ConsolidationMode::None),
            2 => Some(ConsolidationMode::Monotonic),
            3 => Some(ConsolidationMode::Latest),
            _ => None,
        }
    }
}

/// The non-sentinel consolidation behaviors the client-side buffer
/// actually implements (§9: `Default` is never a distinct buffering
/// strategy, only a wire-level marker).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectiveConsolidation {
    None,
    Monotonic,
    Latest,
}

/// Which queryables a `get()` addresses. The core only encodes this field;
/// selection among matching queryables is a routing-node concern (spec
/// §4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryTarget {
    BestMatching,
    All,
    AllComplete,
}

impl QueryTarget {
    pub fn wire_value(self) -> u8 {
        match self {
            QueryTarget::BestMatching => 0,
            QueryTarget::All => 1,
            QueryTarget::AllComplete => 2,
        }
    }

    pub fn from_wire_value(v: u8) -> Option<Self> {
        match v {
            0 => Some(QueryTarget::BestMatching),
            1 => Some(QueryTarget::All),
            2 => Some(QueryTarget::AllComplete),
            _ => None,
        }
    }
}

/// Node role advertised at handshake time (carried for wire compatibility;
/// the core itself doesn't branch on it beyond tagging `Init`/`Join`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WhatAmI {
    Router,
    Peer,
    Client,
}

impl WhatAmI {
    pub fn wire_value(self) -> u8 {
        match self {
            WhatAmI::Router => 0,
            WhatAmI::Peer => 1,
            WhatAmI::Client => 2,
        }
    }

    pub fn from_wire_value(v: u8) -> Option<Self> {
        match v {
            0 => Some(WhatAmI::Router),
            1 => Some(WhatAmI::Peer),
            2 => Some(WhatAmI::Client),
            _ => None,
        }
    }
}

/// PUT or DELETE, carried by [`crate::zenoh::Put`]/[`crate::zenoh::Delete`]
/// bodies and by the resulting [`crate::zenoh::Sample`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    Put,
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zid_roundtrips_through_bytes() {
        let id = ZenohId::rand();
        let bytes = id.as_slice().to_vec();
        let back = ZenohId::try_from(&bytes[..]).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn zid_rejects_all_zero() {
        assert!(ZenohId::try_from(&[0u8; 4][..]).is_err());
    }

    #[test]
    fn qos_default_matches_spec() {
        let q = QoS::default();
        assert_eq!(q.priority(), QoS::DEFAULT_PRIORITY);
        assert!(!q.is_reliable());
        assert!(!q.is_express());
    }

    #[test]
    fn consolidation_default_collapses_to_latest() {
        assert_eq!(
            ConsolidationMode::Default.effective(),
            EffectiveConsolidation::Latest
        );
        assert_ne!(ConsolidationMode::Default, ConsolidationMode::Latest);
    }
}
