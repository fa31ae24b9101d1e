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
//! Refcounting aliases.
//!
//! A constrained-device engine would hand-roll strong/weak counts with an
//! explicit upgrade-or-null path; in Rust that's exactly
//! `std::sync::{Arc, Weak}`: `Weak::upgrade` already returns `None` once
//! the strong count has reached zero. `Shared`/`WeakShared` exist only to
//! give the session tables a name for "the handle callbacks clone out
//! from under the lock" (see `zenoh-pico`'s session module): clone an
//! owning handle into a to-invoke vector under the lock, then drop the
//! lock and invoke.

use std::sync::{Arc, Weak};

pub type Shared<T> = Arc<T>;
pub type WeakShared<T> = Weak<T>;

/// Upgrades a weak handle, returning `None` if the referent has already
/// been dropped.
pub fn upgrade<T>(weak: &WeakShared<T>) -> Option<Shared<T>> {
    weak.upgrade()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_fails_after_drop() {
        let strong = Shared::new(42);
        let weak: WeakShared<i32> = Arc::downgrade(&strong);
        assert!(upgrade(&weak).is_some());
        drop(strong);
        assert!(upgrade(&weak).is_none());
    }
}
