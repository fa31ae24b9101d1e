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
//! Subscriptions and their dispatch.
//!
//! A [`SubscriptionEntry`] is kept behind an `Arc` in the session's
//! subscription table; dispatching a sample clones that `Arc` under the
//! session lock, drops the lock, then invokes the callback — so a
//! concurrent `undeclare` can remove the table's own reference without
//! racing the in-flight callback. The drop-callback runs exactly once,
//! when the last `Arc` (table's or an in-flight callback's) is released,
//! via `Drop`.

use std::collections::VecDeque;
use std::sync::Mutex;

use zenoh_pico_protocol::core::Locality;
use zenoh_pico_protocol::zenoh::Sample;

pub type DataCallback = Box<dyn Fn(Sample) + Send + Sync>;
pub type DropCallback = Box<dyn FnOnce() + Send>;

pub struct SubscriptionEntry {
    pub id: u32,
    pub declared_key: String,
    pub key: String,
    pub allowed_origin: Locality,
    callback: DataCallback,
    drop_callback: Mutex<Option<DropCallback>>,
    /// Bounded ring-buffer of the last N delivered samples (spec B:
    /// "advanced subscriber cache hook" — the local-only piece of
    /// `original_source/include/zenoh-pico/api/advanced_subscriber.h`
    /// that doesn't require querying other peers for history).
    cache: Mutex<VecDeque<Sample>>,
    cache_capacity: usize,
}

impl SubscriptionEntry {
    pub fn new(
        id: u32,
        declared_key: String,
        key: String,
        allowed_origin: Locality,
        callback: DataCallback,
        drop_callback: Option<DropCallback>,
        cache_capacity: usize,
    ) -> Self {
        SubscriptionEntry {
            id,
            declared_key,
            key,
            allowed_origin,
            callback,
            drop_callback: Mutex::new(drop_callback),
            cache: Mutex::new(VecDeque::with_capacity(cache_capacity)),
            cache_capacity,
        }
    }

    /// Invokes the callback and, if a cache is configured, records the
    /// sample. Must be called without the session lock held.
    pub fn dispatch(&self, sample: Sample) {
        if self.cache_capacity > 0 {
            let mut cache = self.cache.lock().unwrap();
            if cache.len() == self.cache_capacity {
                cache.pop_front();
            }
            cache.push_back(sample.clone());
        }
        (self.callback)(sample);
    }

    pub fn cached_samples(&self) -> Vec<Sample> {
        self.cache.lock().unwrap().iter().cloned().collect()
    }
}

impl Drop for SubscriptionEntry {
    fn drop(&mut self) {
        if let Some(cb) = self.drop_callback.lock().unwrap().take() {
            cb();
        }
    }
}
