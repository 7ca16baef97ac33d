//! Indexed-property array
//!
//! Dual-mode storage for integer-keyed properties: a compact vector (pads
//! holes with `None`) until the hole ratio exceeds policy, then an ordered
//! sparse map. Iteration order is always ascending index (spec §4.F).
//!
//! Grounded on spec §3/§4.F's policy constants and on the teacher's general
//! "two representations, promote under a threshold" idiom (the same shape
//! as `propmap.rs`'s hash-table promotion, itself grounded on
//! `original_source/runtime/map.cc`).

use std::collections::BTreeMap;

/// Promote from compact to sparse once the hole count exceeds this...
const HOLE_COUNT_THRESHOLD: usize = 16;
/// ...*and* the hole-to-filled ratio exceeds this (both conditions must
/// hold, per spec §3: "hole ratio exceeds policy").
const HOLE_RATIO_THRESHOLD: f64 = 0.1;

enum Storage<P> {
    Compact { slots: Vec<Option<P>>, holes: usize },
    Sparse(BTreeMap<u32, P>),
}

pub struct IndexedArray<P> {
    storage: Storage<P>,
}

impl<P> IndexedArray<P> {
    pub fn new() -> IndexedArray<P> {
        IndexedArray {
            storage: Storage::Compact {
                slots: Vec::new(),
                holes: 0,
            },
        }
    }

    pub fn get(&self, i: u32) -> Option<&P> {
        match &self.storage {
            Storage::Compact { slots, .. } => slots.get(i as usize).and_then(|p| p.as_ref()),
            Storage::Sparse(map) => map.get(&i),
        }
    }

    pub fn get_mut(&mut self, i: u32) -> Option<&mut P> {
        match &mut self.storage {
            Storage::Compact { slots, .. } => slots.get_mut(i as usize).and_then(|p| p.as_mut()),
            Storage::Sparse(map) => map.get_mut(&i),
        }
    }

    pub fn contains(&self, i: u32) -> bool {
        self.get(i).is_some()
    }

    /// Places `prop` at index `i`. In compact mode: if `i` lies within the
    /// vector, places it directly (decrementing the hole count if the slot
    /// was previously empty); otherwise extends with holes up to `i-1`
    /// then places. After placing, if the projected hole count exceeds
    /// `HOLE_COUNT_THRESHOLD` *and* holes/filled exceeds
    /// `HOLE_RATIO_THRESHOLD`, switches to sparse mode by re-inserting
    /// every present element.
    pub fn set(&mut self, i: u32, prop: P) {
        match &mut self.storage {
            Storage::Compact { slots, holes } => {
                let idx = i as usize;
                if idx < slots.len() {
                    if slots[idx].is_none() {
                        *holes -= 1;
                    }
                    slots[idx] = Some(prop);
                } else {
                    let new_holes = idx - slots.len();
                    slots.resize_with(idx, || None);
                    *holes += new_holes;
                    slots.push(Some(prop));
                }
                self.maybe_promote();
            }
            Storage::Sparse(map) => {
                map.insert(i, prop);
            }
        }
    }

    pub fn remove(&mut self, i: u32) -> Option<P> {
        match &mut self.storage {
            Storage::Compact { slots, holes } => {
                let idx = i as usize;
                if idx >= slots.len() {
                    return None;
                }
                let removed = slots[idx].take();
                if removed.is_some() {
                    *holes += 1;
                }
                removed
            }
            Storage::Sparse(map) => map.remove(&i),
        }
    }

    fn maybe_promote(&mut self) {
        let should_promote = match &self.storage {
            Storage::Compact { slots, holes } => {
                let filled = slots.len() - holes;
                *holes > HOLE_COUNT_THRESHOLD
                    && filled > 0
                    && (*holes as f64 / filled as f64) > HOLE_RATIO_THRESHOLD
            }
            Storage::Sparse(_) => false,
        };
        if !should_promote {
            return;
        }
        if let Storage::Compact { slots, .. } = &mut self.storage {
            let mut map = BTreeMap::new();
            for (idx, slot) in std::mem::take(slots).into_iter().enumerate() {
                if let Some(p) = slot {
                    map.insert(idx as u32, p);
                }
            }
            self.storage = Storage::Sparse(map);
        }
    }

    /// Forward iteration in strictly ascending index order, exactly once
    /// per live index (spec §8 invariant).
    pub fn iter(&self) -> Box<dyn Iterator<Item = (u32, &P)> + '_> {
        match &self.storage {
            Storage::Compact { slots, .. } => Box::new(
                slots
                    .iter()
                    .enumerate()
                    .filter_map(|(i, p)| p.as_ref().map(|p| (i as u32, p))),
            ),
            Storage::Sparse(map) => Box::new(map.iter().map(|(k, v)| (*k, v))),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn is_sparse(&self) -> bool {
        matches!(self.storage, Storage::Sparse(_))
    }
}

impl<P> Default for IndexedArray<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let mut a: IndexedArray<i32> = IndexedArray::new();
        a.set(0, 10);
        a.set(5, 50);
        assert_eq!(a.get(0), Some(&10));
        assert_eq!(a.get(5), Some(&50));
        assert_eq!(a.get(1), None);
    }

    #[test]
    fn iteration_is_ascending_and_skips_holes() {
        let mut a: IndexedArray<i32> = IndexedArray::new();
        a.set(5, 5);
        a.set(1, 1);
        a.set(3, 3);
        let collected: Vec<_> = a.iter().map(|(i, v)| (i, *v)).collect();
        assert_eq!(collected, vec![(1, 1), (3, 3), (5, 5)]);
    }

    #[test]
    fn promotes_to_sparse_past_hole_policy() {
        let mut a: IndexedArray<i32> = IndexedArray::new();
        a.set(0, 0);
        // One filled element, then a huge gap: holes >> filled triggers
        // both threshold conditions.
        a.set(200, 200);
        assert!(a.is_sparse());
        assert_eq!(a.get(0), Some(&0));
        assert_eq!(a.get(200), Some(&200));
    }

    #[test]
    fn dense_arrays_stay_compact() {
        let mut a: IndexedArray<i32> = IndexedArray::new();
        for i in 0..100u32 {
            a.set(i, i as i32);
        }
        assert!(!a.is_sparse());
    }

    #[test]
    fn remove_then_iterate_is_exactly_once_per_live_index() {
        let mut a: IndexedArray<i32> = IndexedArray::new();
        for i in 0..5u32 {
            a.set(i, i as i32);
        }
        a.remove(2);
        let collected: Vec<_> = a.iter().map(|(i, _)| i).collect();
        assert_eq!(collected, vec![0, 1, 3, 4]);
    }
}
