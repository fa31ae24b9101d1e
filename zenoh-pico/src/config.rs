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
//! A thin `HashMap<String, String>`-backed configuration: a string-to-string
//! mapping consumed by `open()`. Typed accessors cover the handful of keys
//! the core actually reads; key names and defaults mirror zenoh-pico's own
//! `Z_CONFIG_*` constants.

use std::collections::HashMap;
use std::convert::TryFrom;

use zenoh_pico_protocol::core::{WhatAmI, ZenohId};
use zenoh_pico_protocol::transport::{Lease, SnResolution};

pub const KEY_MODE: &str = "mode";
pub const KEY_ZID: &str = "id";
pub const KEY_LEASE_MS: &str = "lease_ms";
pub const KEY_SN_RESOLUTION_BITS: &str = "sn_resolution_bits";
pub const KEY_BATCH_SIZE: &str = "batch_size";
pub const KEY_CONNECT_ENDPOINT: &str = "connect/endpoint";

/// Default lease, matching `Z_CONFIG_SESSION_LEASE_DEFAULT` (10s).
pub const DEFAULT_LEASE_MS: u64 = 10_000;
/// Default batch size, matching `Z_CONFIG_BATCH_SIZE_DEFAULT`.
pub const DEFAULT_BATCH_SIZE: u16 = 2048;
pub const DEFAULT_MAX_TASKS: usize = zenoh_pico_scheduler::DEFAULT_MAX_TASKS;

#[derive(Clone, Debug, Default)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Config { values: HashMap::new() }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The local ZID: parsed from `id` if present (hex string), otherwise
    /// a fresh random id is generated.
    pub fn zid(&self) -> ZenohId {
        match self.get(KEY_ZID).and_then(|s| hex_decode(s)) {
            Some(bytes) => ZenohId::try_from(bytes.as_slice()).unwrap_or_else(|_| ZenohId::rand()),
            None => ZenohId::rand(),
        }
    }

    pub fn whatami(&self) -> WhatAmI {
        match self.get(KEY_MODE) {
            Some("peer") => WhatAmI::Peer,
            Some("router") => WhatAmI::Router,
            _ => WhatAmI::Client,
        }
    }

    pub fn lease(&self) -> Lease {
        let millis = self
            .get(KEY_LEASE_MS)
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LEASE_MS);
        Lease::from_millis(millis)
    }

    pub fn sn_resolution(&self) -> SnResolution {
        let bits = self
            .get(KEY_SN_RESOLUTION_BITS)
            .and_then(|s| s.parse().ok())
            .unwrap_or(SnResolution::DEFAULT_BITS);
        SnResolution(bits)
    }

    pub fn batch_size(&self) -> u16 {
        self.get(KEY_BATCH_SIZE)
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn connect_endpoint(&self) -> Option<&str> {
        self.get(KEY_CONNECT_ENDPOINT)
    }
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_zenoh_pico_constants() {
        let cfg = Config::new();
        assert_eq!(cfg.lease().millis, DEFAULT_LEASE_MS);
        assert_eq!(cfg.batch_size(), DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.whatami(), WhatAmI::Client);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let mut cfg = Config::new();
        cfg.insert(KEY_MODE, "peer").insert(KEY_LEASE_MS, "5000");
        assert_eq!(cfg.whatami(), WhatAmI::Peer);
        assert_eq!(cfg.lease().millis, 5000);
    }
}
