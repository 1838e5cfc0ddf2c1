// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Path-keyed TTL caches
//!
//! One cache type serves three roles: the per-resolver folder cache (short
//! TTL, bounded), the static children-map cache (bounded, day-scale TTL),
//! and the static file cache (unbounded, day-scale TTL). Entries expire on
//! access; structural-change listeners call `remove`/`remove_prefix`/`clear`
//! so that positive and negative cached results are evicted together.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::path::DavPath;

struct Entry<V> {
    value: V,
    expires: Instant,
}

pub struct TtlCache<V> {
    entries: Mutex<HashMap<DavPath, Entry<V>>>,
    ttl: Duration,
    capacity: Option<usize>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, capacity: Option<usize>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl, capacity }
    }

    pub fn get(&self, key: &DavPath) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(e) if e.expires > Instant::now() => Some(e.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: DavPath, value: V) {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        if let Some(capacity) = self.capacity {
            if entries.len() >= capacity && !entries.contains_key(&key) {
                // drop expired entries first, then the soonest-to-expire
                entries.retain(|_, e| e.expires > now);
                while entries.len() >= capacity {
                    let victim = entries
                        .iter()
                        .min_by_key(|(_, e)| e.expires)
                        .map(|(k, _)| k.clone());
                    match victim {
                        Some(k) => entries.remove(&k),
                        None => break,
                    };
                }
            }
        }
        entries.insert(key, Entry { value, expires: now + self.ttl });
    }

    pub fn remove(&self, key: &DavPath) -> Option<V> {
        self.entries.lock().unwrap().remove(key).map(|e| e.value)
    }

    /// Remove every entry at or below `prefix`. Used after subtree moves so
    /// stale descendants cannot be served.
    pub fn remove_prefix(&self, prefix: &DavPath) {
        self.entries.lock().unwrap().retain(|k, _| !k.starts_with(prefix));
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> DavPath {
        DavPath::parse(s).unwrap()
    }

    #[test]
    fn test_get_put_remove() {
        let cache = TtlCache::new(Duration::from_secs(60), Some(10));
        assert!(cache.get(&p("/a")).is_none());
        cache.put(p("/a"), 1);
        assert_eq!(cache.get(&p("/a")), Some(1));
        assert_eq!(cache.remove(&p("/a")), Some(1));
        assert!(cache.get(&p("/a")).is_none());
    }

    #[test]
    fn test_expiry() {
        let cache = TtlCache::new(Duration::ZERO, None);
        cache.put(p("/a"), 1);
        assert!(cache.get(&p("/a")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_prefix() {
        let cache = TtlCache::new(Duration::from_secs(60), None);
        cache.put(p("/proj"), 1);
        cache.put(p("/proj/sub"), 2);
        cache.put(p("/proj/sub/deep"), 3);
        cache.put(p("/other"), 4);
        cache.remove_prefix(&p("/proj/sub"));
        assert_eq!(cache.get(&p("/proj")), Some(1));
        assert!(cache.get(&p("/proj/sub")).is_none());
        assert!(cache.get(&p("/proj/sub/deep")).is_none());
        assert_eq!(cache.get(&p("/other")), Some(4));
    }

    #[test]
    fn test_capacity_eviction() {
        let cache = TtlCache::new(Duration::from_secs(60), Some(2));
        cache.put(p("/a"), 1);
        cache.put(p("/b"), 2);
        cache.put(p("/c"), 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&p("/c")), Some(3));
    }
}
