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
//! Expanding a wire key (scope id + optional suffix) into a full key
//! expression string. Generic over a resource-table lookup so this crate
//! doesn't need to depend on the session engine that owns the tables.

/// Looks a resource scope id up to its canonical key expression string. The
/// session engine implements this against its local/remote resource tables.
pub trait ResourceResolver {
    fn resolve_scope(&self, id: u16) -> Option<String>;
}

/// Expands `(scope, suffix)` into the full key expression string.
///
/// `scope == 0` means "no scope, `suffix` is the whole key". Any other
/// value is looked up in `resolver`; `None` means the scope id is unknown
/// to this resource table.
pub fn resolve(scope: u16, suffix: Option<&str>, resolver: &impl ResourceResolver) -> Option<String> {
    if scope == 0 {
        return suffix.map(str::to_string);
    }
    let base = resolver.resolve_scope(scope)?;
    match suffix {
        Some(s) if !s.is_empty() => Some(base + s),
        _ => Some(base),
    }
}

/// Fast path for comparing two wire keys that share the same scope id:
/// since the scope resolves to the same string on both sides, only the
/// suffixes need to be intersected.
pub fn suffix_intersects(scope_a: u16, suffix_a: &str, scope_b: u16, suffix_b: &str) -> Option<bool> {
    if scope_a != scope_b {
        return None;
    }
    crate::intersects(suffix_a, suffix_b).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Table(HashMap<u16, String>);
    impl ResourceResolver for Table {
        fn resolve_scope(&self, id: u16) -> Option<String> {
            self.0.get(&id).cloned()
        }
    }

    #[test]
    fn resolves_scope_plus_suffix() {
        let mut m = HashMap::new();
        m.insert(7u16, "a/b/".to_string());
        let t = Table(m);
        assert_eq!(resolve(7, Some("c"), &t).as_deref(), Some("a/b/c"));
        assert_eq!(resolve(0, Some("x/y"), &t).as_deref(), Some("x/y"));
        assert_eq!(resolve(99, Some("c"), &t), None);
    }

    #[test]
    fn suffix_fast_path_requires_same_scope() {
        assert_eq!(suffix_intersects(1, "a/*", 2, "a/b"), None);
        assert_eq!(suffix_intersects(1, "a/*", 1, "a/b"), Some(true));
    }
}
