//! Property map
//!
//! A per-object layout handle: uses the shape tree for low property counts,
//! promotes to a hash table past `MAX_NON_MAPPED` properties; tracks free
//! slots on deletion so deleted slots are reused before the slot vector
//! grows, keeping existing `Reference`s into *other* slots stable.
//!
//! Ported from `original_source/runtime/map.cc` (`EsMap`): `add`/`remove`/
//! `lookup`, the `MAX_NUM_NON_MAPPED = 10` promotion threshold, and `id()`
//! as the address (here, `Shape` pointer-identity) of the last-added shape.

use std::collections::HashMap;

use crate::propkey::PropKey;
use crate::shape::{Shape, INVALID_SLOT};

/// Number of properties to maintain via shape-chain walks before
/// materializing a hash side table for O(1) lookup (spec §3 "Property
/// map": "materialized once property count exceeds 10").
const MAX_NON_MAPPED: usize = 10;

/// A resolved reference to a slot in some map's slot vector. Stable across
/// insertion/deletion of *other* keys (spec §4.E): the slot index itself
/// never changes once assigned; the map only ever appends or reuses freed
/// indices.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SlotRef(pub usize);

pub struct PropertyMap<P> {
    free_slots: Vec<usize>,
    last_shape: Shape,
    slots: Vec<Option<P>>,
    table: Option<HashMap<PropKey, usize>>,
}

impl<P> PropertyMap<P> {
    pub fn new(root: Shape) -> PropertyMap<P> {
        PropertyMap {
            free_slots: Vec::new(),
            last_shape: root,
            slots: Vec::new(),
            table: None,
        }
    }

    /// The map's identity: two maps compare equal iff they currently
    /// identify the same shape, which (by the shape tree's structural
    /// sharing) implies identical insertion/deletion history.
    pub fn id(&self) -> Shape {
        self.last_shape.clone()
    }

    pub fn len(&self) -> usize {
        self.last_shape.depth()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Property keys in insertion order (oldest first), reconstructed by
    /// walking the shape chain from the last shape to the root.
    pub fn keys(&self) -> Vec<PropKey> {
        let count = self.last_shape.depth();
        let mut keys = vec![PropKey::from_u32(0); count];
        let mut shape = self.last_shape.clone();
        let mut i = count;
        while !shape.is_root() {
            i -= 1;
            keys[i] = shape.key();
            shape = shape.parent().unwrap();
        }
        keys
    }

    /// Allocates a slot (reusing from the free list if non-empty, else
    /// appending), advances the shape via `Shape::add`, and inserts into
    /// the hash side table once the property count crosses
    /// `MAX_NON_MAPPED` (materializing it by walking the shape chain the
    /// first time).
    ///
    /// # Precondition
    /// No property with key `key` already exists in the map.
    pub fn add(&mut self, key: PropKey, prop: P) -> SlotRef {
        let slot = if let Some(slot) = self.free_slots.pop() {
            self.slots[slot] = Some(prop);
            slot
        } else {
            let slot = self.slots.len();
            self.slots.push(Some(prop));
            slot
        };

        self.last_shape = self.last_shape.add(key, slot);

        if self.table.is_none() && self.last_shape.depth() > MAX_NON_MAPPED {
            let mut table = HashMap::new();
            let mut shape = self.last_shape.parent().unwrap();
            while !shape.is_root() {
                table.insert(shape.key(), shape.slot());
                shape = shape.parent().unwrap();
            }
            self.table = Some(table);
        }
        if let Some(table) = &mut self.table {
            table.insert(key, slot);
        }

        SlotRef(slot)
    }

    /// Removes `key` if present: advances the shape via `Shape::remove`,
    /// pushes the freed slot onto the free list, and erases the hash
    /// side-table entry if one exists.
    pub fn remove(&mut self, key: PropKey) {
        let Some(to_remove) = self.last_shape.lookup(key) else {
            return;
        };
        self.last_shape = self.last_shape.remove(key);
        self.slots[to_remove.slot()] = None;
        self.free_slots.push(to_remove.slot());
        if let Some(table) = &mut self.table {
            table.remove(&key);
        }
    }

    /// Resolves `key` to a slot, preferring the hash table when present.
    pub fn lookup(&self, key: PropKey) -> Option<SlotRef> {
        if let Some(table) = &self.table {
            return table.get(&key).copied().map(SlotRef);
        }
        self.last_shape.lookup(key).map(|s| SlotRef(s.slot()))
    }

    pub fn get(&self, slot: SlotRef) -> Option<&P> {
        self.slots.get(slot.0).and_then(|p| p.as_ref())
    }

    pub fn get_mut(&mut self, slot: SlotRef) -> Option<&mut P> {
        self.slots.get_mut(slot.0).and_then(|p| p.as_mut())
    }

    #[cfg(debug_assertions)]
    pub fn slot_for_debug(&self, key: PropKey) -> usize {
        self.lookup(key).map(|s| s.0).unwrap_or(INVALID_SLOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(i: u32) -> PropKey {
        PropKey::from_u32(i)
    }

    #[test]
    fn add_then_lookup_round_trips() {
        let mut map: PropertyMap<i32> = PropertyMap::new(Shape::root());
        let slot = map.add(k(1), 10);
        assert_eq!(map.lookup(k(1)), Some(slot));
        assert_eq!(map.get(slot), Some(&10));
    }

    #[test]
    fn slots_are_stable_across_unrelated_inserts() {
        let mut map: PropertyMap<i32> = PropertyMap::new(Shape::root());
        let slot1 = map.add(k(1), 10);
        map.add(k(2), 20);
        map.add(k(3), 30);
        assert_eq!(map.lookup(k(1)), Some(slot1));
        assert_eq!(map.get(slot1), Some(&10));
    }

    #[test]
    fn removed_slots_are_reused() {
        let mut map: PropertyMap<i32> = PropertyMap::new(Shape::root());
        let slot1 = map.add(k(1), 10);
        map.remove(k(1));
        let slot2 = map.add(k(2), 20);
        assert_eq!(slot1, slot2);
        assert_eq!(map.lookup(k(1)), None);
        assert_eq!(map.lookup(k(2)), Some(slot2));
    }

    #[test]
    fn promotes_to_hash_table_past_threshold() {
        let mut map: PropertyMap<i32> = PropertyMap::new(Shape::root());
        for i in 0..20u32 {
            map.add(k(i), i as i32);
        }
        assert!(map.table.is_some());
        for i in 0..20u32 {
            let slot = map.lookup(k(i)).unwrap();
            assert_eq!(map.get(slot), Some(&(i as i32)));
        }
    }

    #[test]
    fn id_reflects_shared_structure() {
        let mut a: PropertyMap<i32> = PropertyMap::new(Shape::root());
        let mut b: PropertyMap<i32> = PropertyMap::new(Shape::root());
        a.add(k(1), 1);
        b.add(k(1), 1);
        assert_eq!(a.id(), b.id());
        a.add(k(2), 2);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn keys_preserve_insertion_order() {
        let mut map: PropertyMap<i32> = PropertyMap::new(Shape::root());
        map.add(k(5), 0);
        map.add(k(3), 0);
        map.add(k(9), 0);
        assert_eq!(map.keys(), vec![k(5), k(3), k(9)]);
    }
}
