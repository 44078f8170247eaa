//! Resolved-ACL cache
//!
//! Memoizes the fully-resolved chain (own entries plus ancestors) per
//! object identity id. Entries live until explicitly invalidated; there
//! is no eviction by capacity or timing, so a cached value is always the
//! last committed state of its chain.
//!
//! Coherency contract: a mutation commits to the store first, then calls
//! [`AclCache::invalidate`]. A rebuild that sampled the store before the
//! commit is refused by [`AclCache::insert_if_current`], because the
//! invalidation bumped the generation it captured. Readers therefore
//! never see a cache entry for a key whose underlying write is not yet
//! durable.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::model::AclEntry;

/// Frozen snapshot of one object's ACL plus its ancestor chain
///
/// Built at resolution time and never mutated; invalidation replaces the
/// whole snapshot, never patches it.
#[derive(Debug)]
pub struct CachedAcl {
    /// Identity id this snapshot belongs to
    pub id: i64,
    /// Whether this object consults its parent during evaluation
    pub inherits_parent: bool,
    /// Own entries, ascending order
    pub entries: Vec<AclEntry>,
    /// Resolved parent chain; `None` at the root or when inheritance is off
    pub parent: Option<Arc<CachedAcl>>,
}

impl CachedAcl {
    /// Number of objects on this chain, the snapshot itself included
    pub fn chain_len(&self) -> usize {
        let mut len = 1;
        let mut node = self.parent.as_deref();
        while let Some(acl) = node {
            len += 1;
            node = acl.parent.as_deref();
        }
        len
    }
}

/// Process-local cache of resolved ACL chains, keyed by identity id
pub struct AclCache {
    map: RwLock<AHashMap<i64, Arc<CachedAcl>>>,
    generation: AtomicU64,
}

impl AclCache {
    /// Create an empty cache
    pub fn new() -> Self {
        AclCache {
            map: RwLock::new(AHashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Generation to sample before reading the store for a rebuild
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cached chain for `id`, if present
    pub fn get(&self, id: i64) -> Option<Arc<CachedAcl>> {
        self.map.read().get(&id).cloned()
    }

    /// Store a freshly built chain, unless an invalidation happened since
    /// the builder sampled `generation`; returns whether it was stored
    pub fn insert_if_current(&self, id: i64, acl: Arc<CachedAcl>, generation: u64) -> bool {
        let mut map = self.map.write();
        // Generation is checked under the write lock so an invalidation
        // cannot interleave between the check and the insert.
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        map.insert(id, acl);
        true
    }

    /// Drop the given keys and retire any in-flight rebuilds
    pub fn invalidate(&self, ids: &[i64]) {
        let mut map = self.map.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        for id in ids {
            map.remove(id);
        }
    }

    /// Number of cached chains
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Drop everything
    pub fn clear(&self) {
        let mut map = self.map.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        map.clear();
    }
}

impl Default for AclCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: i64) -> Arc<CachedAcl> {
        Arc::new(CachedAcl {
            id,
            inherits_parent: true,
            entries: Vec::new(),
            parent: None,
        })
    }

    #[test]
    fn test_insert_and_get() {
        let cache = AclCache::new();
        assert!(cache.get(1).is_none());

        let generation = cache.generation();
        assert!(cache.insert_if_current(1, snapshot(1), generation));
        assert_eq!(cache.get(1).unwrap().id, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stale_insert_refused() {
        let cache = AclCache::new();

        let generation = cache.generation();
        cache.invalidate(&[1]);

        // Build sampled the pre-invalidation store; must not land
        assert!(!cache.insert_if_current(1, snapshot(1), generation));
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn test_invalidate_removes_keys() {
        let cache = AclCache::new();
        let generation = cache.generation();
        cache.insert_if_current(1, snapshot(1), generation);
        cache.insert_if_current(2, snapshot(2), generation);

        cache.invalidate(&[1]);
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn test_chain_len() {
        let root = snapshot(1);
        let child = Arc::new(CachedAcl {
            id: 2,
            inherits_parent: true,
            entries: Vec::new(),
            parent: Some(root),
        });
        assert_eq!(child.chain_len(), 2);
    }
}
