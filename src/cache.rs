//! Inline caches
//!
//! Two parallel cache tables, each a flat `Vec` indexed by a compile-time-
//! assigned 16-bit callsite id (the code generator's job, external to this
//! crate — see spec §6's `cid` parameter threaded through `ctx_get`/
//! `prp_get`/`prp_put`). Monomorphic by design (one entry per callsite, not
//! the polymorphic/megamorphic ladder a general bytecode VM needs), since
//! each callsite in AOT-generated code sees a fixed lexical shape of
//! accesses far more often than a generic interpreter's shared bytecode
//! would.
//!
//! Grounded on `examples/pro-grammer-SD-axiom/axm/src/inline_cache.rs` for
//! the overall shape (a `Vec` of per-callsite entries, `lookup`/`update`
//! pairs, shape-id comparison as the hit test) simplified down to the
//! monomorphic case spec §4.P actually calls for, and on `shape.rs`'s
//! `Shape::id` for what a "map id" is in this codebase.

use crate::propkey::PropKey;
use crate::propmap::SlotRef;

/// Depth limit for the property cache's prototype-chain id vector (spec
/// §4.P: "Depth is capped (eight chain levels); deeper lookups are
/// uncached").
pub const MAX_CHAIN_DEPTH: usize = 8;

/// `Shape::id` returns a live `Rc` pointer value, which is never zero;
/// used as the "this callsite has never cached a cachable access" /
/// "this callsite caches a non-slot-shaped property, never hit" sentinel
/// (spec §4.P: "A non-cachable property ... records a sentinel map-id
/// that never hits").
const NO_MAP: usize = 0;

/// One context-cache slot: `(map-id, key, property-reference)`. Only the
/// global object is ever cached here (spec §4.P), so `map_id` alone
/// (without a receiver pointer) is enough to validate a hit — the receiver
/// is always the same object.
#[derive(Clone, Copy)]
struct ContextCacheEntry {
    map_id: usize,
    key: PropKey,
    slot: SlotRef,
}

/// Context (lexical-environment, global-object-only) inline cache.
pub struct ContextCache {
    entries: Vec<Option<ContextCacheEntry>>,
}

impl ContextCache {
    pub fn new(callsite_count: usize) -> ContextCache {
        ContextCache {
            entries: vec![None; callsite_count],
        }
    }

    /// Hit iff the callsite has a cached entry whose map id matches
    /// `current_map_id` and whose key matches `key`. On hit, returns the
    /// slot reference, already "rebased" to the current property map
    /// (valid as-is: matching map id means matching shape, which means
    /// the slot layout is identical).
    pub fn lookup(&self, cid: u16, current_map_id: usize, key: PropKey) -> Option<SlotRef> {
        let entry = self.entries.get(cid as usize)?.as_ref()?;
        if entry.map_id == current_map_id && entry.key == key {
            Some(entry.slot)
        } else {
            None
        }
    }

    pub fn update(&mut self, cid: u16, map_id: usize, key: PropKey, slot: SlotRef) {
        if let Some(e) = self.entries.get_mut(cid as usize) {
            *e = Some(ContextCacheEntry { map_id, key, slot });
        }
    }

    /// Records a non-cachable access at this callsite (the resolved
    /// binding wasn't slot-shaped, e.g. an object-environment record
    /// wrapping something other than the global object): install the
    /// sentinel so `lookup` can never again report a hit here.
    pub fn mark_uncachable(&mut self, cid: u16) {
        if let Some(e) = self.entries.get_mut(cid as usize) {
            *e = Some(ContextCacheEntry {
                map_id: NO_MAP,
                key: PropKey::from_u32(0),
                slot: SlotRef(0),
            });
        }
    }
}

/// One property-cache slot: the ordered chain of map ids from the receiver
/// up to (and including) the object that owns the property, the key, and
/// the resolved slot on the owning object's map.
#[derive(Clone)]
struct PropertyCacheEntry {
    chain: Vec<usize>,
    key: PropKey,
    slot: SlotRef,
}

/// Property (prototype-chain) inline cache.
pub struct PropertyCache {
    entries: Vec<Option<PropertyCacheEntry>>,
}

impl PropertyCache {
    pub fn new(callsite_count: usize) -> PropertyCache {
        PropertyCache {
            entries: vec![None; callsite_count],
        }
    }

    /// Hit requires every map id along `current_chain` to match the cached
    /// chain in order, element for element (spec §4.P). `current_chain` is
    /// the receiver's own map id followed by each prototype's map id up to
    /// (and including) the owner, gathered by the caller.
    pub fn lookup(&self, cid: u16, current_chain: &[usize], key: PropKey) -> Option<SlotRef> {
        let entry = self.entries.get(cid as usize)?.as_ref()?;
        if entry.key == key && entry.chain.as_slice() == current_chain {
            Some(entry.slot)
        } else {
            None
        }
    }

    /// Caches a chain of at most `MAX_CHAIN_DEPTH` map ids; longer chains
    /// are silently left uncached (a miss forever, never a wrong hit).
    pub fn update(&mut self, cid: u16, chain: Vec<usize>, key: PropKey, slot: SlotRef) {
        if chain.len() > MAX_CHAIN_DEPTH {
            return;
        }
        if let Some(e) = self.entries.get_mut(cid as usize) {
            *e = Some(PropertyCacheEntry { chain, key, slot });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(i: u32) -> PropKey {
        PropKey::from_u32(i)
    }

    #[test]
    fn context_cache_misses_until_updated() {
        let cache = ContextCache::new(4);
        assert!(cache.lookup(0, 11, k(1)).is_none());
    }

    #[test]
    fn context_cache_hits_on_matching_map_and_key() {
        let mut cache = ContextCache::new(4);
        cache.update(2, 11, k(1), SlotRef(5));
        assert_eq!(cache.lookup(2, 11, k(1)), Some(SlotRef(5)));
    }

    #[test]
    fn context_cache_misses_on_map_change() {
        let mut cache = ContextCache::new(4);
        cache.update(2, 11, k(1), SlotRef(5));
        assert!(cache.lookup(2, 12, k(1)).is_none());
    }

    #[test]
    fn context_cache_misses_on_key_change() {
        let mut cache = ContextCache::new(4);
        cache.update(2, 11, k(1), SlotRef(5));
        assert!(cache.lookup(2, 11, k(2)).is_none());
    }

    #[test]
    fn context_cache_sentinel_never_hits() {
        let mut cache = ContextCache::new(4);
        cache.mark_uncachable(0);
        assert!(cache.lookup(0, 0, PropKey::from_u32(0)).is_none());
    }

    #[test]
    fn property_cache_requires_exact_chain_match() {
        let mut cache = PropertyCache::new(4);
        cache.update(1, vec![10, 20, 30], k(7), SlotRef(2));
        assert_eq!(cache.lookup(1, &[10, 20, 30], k(7)), Some(SlotRef(2)));
        assert!(cache.lookup(1, &[10, 20], k(7)).is_none());
        assert!(cache.lookup(1, &[10, 20, 31], k(7)).is_none());
    }

    #[test]
    fn property_cache_refuses_to_cache_deep_chains() {
        let mut cache = PropertyCache::new(4);
        let deep: Vec<usize> = (0..(MAX_CHAIN_DEPTH + 1)).collect();
        cache.update(0, deep.clone(), k(1), SlotRef(0));
        assert!(cache.lookup(0, &deep, k(1)).is_none());
    }

    #[test]
    fn out_of_range_callsite_id_is_a_miss_not_a_panic() {
        let cache = ContextCache::new(1);
        assert!(cache.lookup(99, 0, k(1)).is_none());
        let mut cache2 = ContextCache::new(1);
        cache2.update(99, 1, k(1), SlotRef(0));
    }
}
